//! Purchase intake: seeds new stock into the ledger

use super::context::LedgerContext;
use super::error::{LedgerError, LedgerResult};
use super::grades;
use super::lots;
use super::packets::{self, NewPacket};
use rust_decimal::Decimal;
use shared::models::{IntakeRequest, Packet, PacketBookFlag};

pub fn validate(request: &IntakeRequest) -> LedgerResult<()> {
    if request.packets.is_empty() {
        return Err(LedgerError::validation("no packets to receive"));
    }
    for (index, line) in request.packets.iter().enumerate() {
        if line.on_book_weight < Decimal::ZERO || line.off_book_weight < Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "packet {} has a negative book weight",
                index
            )));
        }
        if line.on_book_weight + line.off_book_weight <= Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "packet {} weight must be positive",
                index
            )));
        }
    }
    Ok(())
}

pub fn execute(ctx: &LedgerContext<'_>, request: &IntakeRequest) -> LedgerResult<Vec<Packet>> {
    let mut created = Vec::with_capacity(request.packets.len());

    for line in &request.packets {
        let grade = grades::resolve_grade(ctx, &line.grade)?;
        let book_flag =
            PacketBookFlag::from_split(line.on_book_weight, line.off_book_weight, ctx.tolerance);
        let lot_pair = lots::resolve_lot_pair(
            ctx,
            request.location_id,
            grade.id,
            line.sieve_size_id,
            book_flag.lot_flag(),
        )?;

        let packet = packets::create_packet(
            ctx,
            NewPacket {
                grade_id: grade.id,
                location_id: request.location_id,
                sieve_size_id: line.sieve_size_id,
                on_book_weight: line.on_book_weight,
                off_book_weight: line.off_book_weight,
                book_flag,
                actor_id: request.actor_id,
            },
            &lot_pair,
        )?;
        created.push(packet);
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{GradeKey, IntakePacket};

    #[test]
    fn test_validate() {
        let line = |on: i64, off: i64| IntakePacket {
            grade: GradeKey::new(1, 1, 1),
            sieve_size_id: 1,
            on_book_weight: Decimal::new(on, 2),
            off_book_weight: Decimal::new(off, 2),
        };
        let request = |packets| IntakeRequest {
            location_id: 1,
            actor_id: 1,
            packets,
        };

        assert!(validate(&request(vec![line(25, 0)])).is_ok());
        assert!(validate(&request(vec![])).is_err());
        assert!(validate(&request(vec![line(0, 0)])).is_err());
        assert!(validate(&request(vec![line(50, -25)])).is_err());
    }
}
