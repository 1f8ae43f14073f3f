//! Packet Ledger
//!
//! A packet contributes its remaining weight to its book lot and total lot.
//! Anything that changes remaining weight removes the old contribution and
//! re-adds the new one.

use super::context::LedgerContext;
use super::error::{LedgerError, LedgerResult};
use super::lots::{self, LotPair};
use super::storage::Sequence;
use rust_decimal::Decimal;
use shared::models::{LotDelta, Packet, PacketBookFlag, PacketStatus};

/// Fields of a packet about to enter the ledger
#[derive(Debug, Clone)]
pub struct NewPacket {
    pub grade_id: i64,
    pub location_id: i64,
    pub sieve_size_id: i64,
    pub on_book_weight: Decimal,
    pub off_book_weight: Decimal,
    pub book_flag: PacketBookFlag,
    pub actor_id: i64,
}

/// Create an available packet filed under `lots` and add its contribution
pub fn create_packet(
    ctx: &LedgerContext<'_>,
    new: NewPacket,
    lots: &LotPair,
) -> LedgerResult<Packet> {
    let id = ctx.next_id(Sequence::Packet)?;
    let weight = new.on_book_weight + new.off_book_weight;
    let packet = Packet {
        id,
        qr_code: Packet::qr_code_for(id, ctx.now),
        lot_id: lots.book.id,
        total_lot_id: lots.total.id,
        grade_id: new.grade_id,
        location_id: new.location_id,
        sieve_size_id: new.sieve_size_id,
        weight,
        on_book_weight: new.on_book_weight,
        off_book_weight: new.off_book_weight,
        book_flag: new.book_flag,
        remaining_weight: weight,
        remaining_on_book: new.on_book_weight,
        remaining_off_book: new.off_book_weight,
        is_unpacked: false,
        is_available_for_store: true,
        current_status: PacketStatus::Available,
        available_since: Some(ctx.now),
        available_by: Some(new.actor_id),
        created_at: ctx.now,
        updated_at: ctx.now,
    };

    let delta = LotDelta::add_packet(packet.remaining_bucket(ctx.tolerance), packet.remaining_weight);
    lots::apply_delta(ctx, packet.lot_id, packet.total_lot_id, &delta)?;

    ctx.storage.store_packet(ctx.txn, &packet)?;
    ctx.storage.index_packet(ctx.txn, &packet)?;
    Ok(packet)
}

/// Load a packet through the write transaction
pub fn load_packet(ctx: &LedgerContext<'_>, packet_id: i64) -> LedgerResult<Packet> {
    ctx.storage
        .get_packet_txn(ctx.txn, packet_id)?
        .ok_or(LedgerError::PacketNotFound(packet_id))
}

pub fn store_packet(ctx: &LedgerContext<'_>, packet: &Packet) -> LedgerResult<()> {
    Ok(ctx.storage.store_packet(ctx.txn, packet)?)
}

/// Consume carats from a source packet and refile its lot contribution
///
/// Returns `true` when the source is fully drained and now terminal.
pub fn consume(
    ctx: &LedgerContext<'_>,
    packet: &mut Packet,
    on_book: Decimal,
    off_book: Decimal,
) -> LedgerResult<bool> {
    let tol = ctx.tolerance;
    let old = LotDelta::remove_packet(packet.remaining_bucket(tol), packet.remaining_weight);

    packet.draw(on_book, off_book);
    if tol.is_negative(packet.remaining_on_book) || tol.is_negative(packet.remaining_off_book) {
        return Err(LedgerError::consistency(format!(
            "packet {} drawn below zero: on-book {}, off-book {}",
            packet.id, packet.remaining_on_book, packet.remaining_off_book
        )));
    }

    lots::apply_delta(ctx, packet.lot_id, packet.total_lot_id, &old)?;

    let drained = tol.is_zero(packet.remaining_weight);
    if drained {
        packet.mark_unpacked(ctx.now);
    } else {
        refile(ctx, packet)?;
        let residual = LotDelta::add_packet(packet.remaining_bucket(tol), packet.remaining_weight);
        lots::apply_delta(ctx, packet.lot_id, packet.total_lot_id, &residual)?;
        packet.updated_at = ctx.now;
    }

    store_packet(ctx, packet)?;
    Ok(drained)
}

/// Re-derive the book flag from the remaining split and move the packet to
/// the matching book lot when it changes
fn refile(ctx: &LedgerContext<'_>, packet: &mut Packet) -> LedgerResult<()> {
    let book_flag = PacketBookFlag::from_split(
        packet.remaining_on_book,
        packet.remaining_off_book,
        ctx.tolerance,
    );
    if book_flag.lot_flag() != packet.book_flag.lot_flag() {
        let pair = lots::resolve_lot_pair(
            ctx,
            packet.location_id,
            packet.grade_id,
            packet.sieve_size_id,
            book_flag.lot_flag(),
        )?;
        if pair.total.id != packet.total_lot_id {
            return Err(LedgerError::consistency(format!(
                "packet {} total lot {} does not match key total lot {}",
                packet.id, packet.total_lot_id, pair.total.id
            )));
        }
        ctx.storage
            .refile_packet(ctx.txn, packet.id, packet.lot_id, pair.book.id)?;
        tracing::debug!(
            packet_id = packet.id,
            from_lot_id = packet.lot_id,
            to_lot_id = pair.book.id,
            "Residual packet refiled"
        );
        packet.lot_id = pair.book.id;
    }
    packet.book_flag = book_flag;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::storage::LedgerStorage;
    use shared::models::LotBookFlag;
    use shared::{SizeClass, Tolerance};

    fn new_on_book(weight: Decimal) -> NewPacket {
        NewPacket {
            grade_id: 1,
            location_id: 1,
            sieve_size_id: 1,
            on_book_weight: weight,
            off_book_weight: Decimal::ZERO,
            book_flag: PacketBookFlag::OnBook,
            actor_id: 5,
        }
    }

    #[test]
    fn test_create_packet_adds_contribution() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        let ctx = LedgerContext::new(&storage, &txn, Tolerance::default(), 10);

        let pair = lots::resolve_lot_pair(&ctx, 1, 1, 1, LotBookFlag::OnBook).unwrap();
        let packet = create_packet(&ctx, new_on_book(Decimal::new(5, 1)), &pair).unwrap();

        assert_eq!(packet.available_by, Some(5));
        assert_eq!(packet.available_since, Some(10));
        let book = lots::load_lot(&ctx, pair.book.id).unwrap();
        assert_eq!(book.counter(SizeClass::Half).quantity, 1);
        assert_eq!(load_packet(&ctx, packet.id).unwrap(), packet);
    }

    #[test]
    fn test_consume_refiles_residual() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        let ctx = LedgerContext::new(&storage, &txn, Tolerance::default(), 10);

        let pair = lots::resolve_lot_pair(&ctx, 1, 1, 1, LotBookFlag::OnBook).unwrap();
        let mut packet = create_packet(&ctx, new_on_book(Decimal::new(1, 0)), &pair).unwrap();

        let drained = consume(&ctx, &mut packet, Decimal::new(75, 2), Decimal::ZERO).unwrap();
        assert!(!drained);

        let book = lots::load_lot(&ctx, pair.book.id).unwrap();
        assert_eq!(book.carat.quantity, 0);
        assert_eq!(book.quarter.quantity, 1);
        assert_eq!(book.total_weight, Decimal::new(25, 2));

        let drained = consume(&ctx, &mut packet, Decimal::new(25, 2), Decimal::ZERO).unwrap();
        assert!(drained);
        assert!(packet.is_unpacked);
        let book = lots::load_lot(&ctx, pair.book.id).unwrap();
        assert!(book.is_empty(Tolerance::default()));
    }

    #[test]
    fn test_consume_refiles_by_remaining_split() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        let ctx = LedgerContext::new(&storage, &txn, Tolerance::default(), 10);

        let pair = lots::resolve_lot_pair(&ctx, 1, 1, 1, LotBookFlag::OnBook).unwrap();
        let mixed = NewPacket {
            off_book_weight: Decimal::new(70, 2),
            book_flag: PacketBookFlag::Mix,
            ..new_on_book(Decimal::new(30, 2))
        };
        let mut packet = create_packet(&ctx, mixed, &pair).unwrap();

        let drained = consume(&ctx, &mut packet, Decimal::new(30, 2), Decimal::ZERO).unwrap();
        assert!(!drained);
        assert_eq!(packet.book_flag, PacketBookFlag::OffBook);

        let off_pair = lots::resolve_lot_pair(&ctx, 1, 1, 1, LotBookFlag::OffBook).unwrap();
        assert_eq!(packet.lot_id, off_pair.book.id);
        assert_eq!(packet.total_lot_id, pair.total.id);
        assert_eq!(load_packet(&ctx, packet.id).unwrap(), packet);

        assert!(storage.packets_in_lot_txn(&txn, pair.book.id).unwrap().is_empty());
        let filed = storage.packets_in_lot_txn(&txn, off_pair.book.id).unwrap();
        assert_eq!(filed, vec![packet.clone()]);
        assert_eq!(storage.packets_in_lot_txn(&txn, pair.total.id).unwrap().len(), 1);

        let on_lot = lots::load_lot(&ctx, pair.book.id).unwrap();
        assert!(on_lot.is_empty(Tolerance::default()));
        let off_lot = lots::load_lot(&ctx, off_pair.book.id).unwrap();
        assert_eq!(off_lot.unpacked_weight, Decimal::new(70, 2));
    }

    #[test]
    fn test_overdraw_is_consistency_error() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        let ctx = LedgerContext::new(&storage, &txn, Tolerance::default(), 10);

        let pair = lots::resolve_lot_pair(&ctx, 1, 1, 1, LotBookFlag::OnBook).unwrap();
        let mut packet = create_packet(&ctx, new_on_book(Decimal::new(25, 2)), &pair).unwrap();
        let err = consume(&ctx, &mut packet, Decimal::new(30, 2), Decimal::ZERO).unwrap_err();
        assert!(matches!(err, LedgerError::Consistency(_)));
    }
}
