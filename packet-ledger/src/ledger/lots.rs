//! Lot Aggregator
//!
//! Every counter change is a [`LotDelta`] applied to a book lot and its total
//! mirror inside the same write transaction. Lots are created lazily on first
//! contribution and only ever soft-deleted.

use super::context::LedgerContext;
use super::error::{LedgerError, LedgerResult};
use super::storage::Sequence;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::Tolerance;
use shared::models::{Lot, LotBookFlag, LotDelta, LotKey};
use std::collections::BTreeMap;

/// A book lot together with its total mirror
#[derive(Debug, Clone)]
pub struct LotPair {
    pub book: Lot,
    pub total: Lot,
}

/// Find the live lot for `key`, creating a zeroed one if absent
pub fn find_or_create_lot(ctx: &LedgerContext<'_>, key: LotKey) -> LedgerResult<Lot> {
    if let Some(id) = ctx.storage.find_lot_id_txn(ctx.txn, &key)? {
        return load_lot(ctx, id);
    }

    let lot = Lot::empty(ctx.next_id(Sequence::Lot)?, key, ctx.now);
    ctx.storage.store_lot(ctx.txn, &lot)?;
    ctx.storage.index_lot(ctx.txn, &lot)?;
    tracing::debug!(lot_id = lot.id, ?key, "Lot created");
    Ok(lot)
}

/// Resolve the book lot for `book_flag` and the mirrored total lot
pub fn resolve_lot_pair(
    ctx: &LedgerContext<'_>,
    location_id: i64,
    grade_id: i64,
    sieve_size_id: i64,
    book_flag: LotBookFlag,
) -> LedgerResult<LotPair> {
    let key = LotKey::new(location_id, grade_id, sieve_size_id, book_flag);
    let book = find_or_create_lot(ctx, key)?;
    let total = find_or_create_lot(ctx, key.total())?;
    Ok(LotPair { book, total })
}

/// Load a live lot
pub fn load_lot(ctx: &LedgerContext<'_>, lot_id: i64) -> LedgerResult<Lot> {
    match ctx.storage.get_lot_txn(ctx.txn, lot_id)? {
        Some(lot) if !lot.is_deleted => Ok(lot),
        _ => Err(LedgerError::LotNotFound(lot_id)),
    }
}

/// Apply the same delta to a book lot and its total mirror
pub fn apply_delta(
    ctx: &LedgerContext<'_>,
    lot_id: i64,
    total_lot_id: i64,
    delta: &LotDelta,
) -> LedgerResult<()> {
    for id in [lot_id, total_lot_id] {
        let mut lot = load_lot(ctx, id)?;
        lot.apply(delta, ctx.now);
        if lot.has_negative_counter(ctx.tolerance) {
            return Err(LedgerError::consistency(format!(
                "lot {} counter would go negative applying {:?}",
                id, delta
            )));
        }
        ctx.storage.store_lot(ctx.txn, &lot)?;
    }
    Ok(())
}

/// Soft-delete an empty lot and drop it from the key index
pub fn retire_lot(ctx: &LedgerContext<'_>, lot_id: i64) -> LedgerResult<Lot> {
    let mut lot = load_lot(ctx, lot_id)?;
    if !lot.is_empty(ctx.tolerance) {
        return Err(LedgerError::LotNotEmpty {
            lot_id,
            quantity: lot.total_quantity,
        });
    }

    lot.is_deleted = true;
    lot.updated_at = ctx.now;
    ctx.storage.store_lot(ctx.txn, &lot)?;
    ctx.storage.unindex_lot(ctx.txn, &lot.key())?;
    Ok(lot)
}

// ========== Mirror verification ==========

/// Every counter of a lot, comparable across rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSet {
    pub quarter_quantity: i64,
    pub quarter_weight: Decimal,
    pub half_quantity: i64,
    pub half_weight: Decimal,
    pub carat_quantity: i64,
    pub carat_weight: Decimal,
    pub unpacked_quantity: i64,
    pub unpacked_weight: Decimal,
    pub total_quantity: i64,
    pub total_weight: Decimal,
}

impl CounterSet {
    pub fn of(lot: &Lot) -> Self {
        Self {
            quarter_quantity: lot.quarter.quantity,
            quarter_weight: lot.quarter.weight,
            half_quantity: lot.half.quantity,
            half_weight: lot.half.weight,
            carat_quantity: lot.carat.quantity,
            carat_weight: lot.carat.weight,
            unpacked_quantity: lot.unpacked_quantity,
            unpacked_weight: lot.unpacked_weight,
            total_quantity: lot.total_quantity,
            total_weight: lot.total_weight,
        }
    }

    pub fn add(self, other: Self) -> Self {
        Self {
            quarter_quantity: self.quarter_quantity + other.quarter_quantity,
            quarter_weight: self.quarter_weight + other.quarter_weight,
            half_quantity: self.half_quantity + other.half_quantity,
            half_weight: self.half_weight + other.half_weight,
            carat_quantity: self.carat_quantity + other.carat_quantity,
            carat_weight: self.carat_weight + other.carat_weight,
            unpacked_quantity: self.unpacked_quantity + other.unpacked_quantity,
            unpacked_weight: self.unpacked_weight + other.unpacked_weight,
            total_quantity: self.total_quantity + other.total_quantity,
            total_weight: self.total_weight + other.total_weight,
        }
    }

    pub fn approx_eq(&self, other: &Self, tolerance: Tolerance) -> bool {
        self.quarter_quantity == other.quarter_quantity
            && self.half_quantity == other.half_quantity
            && self.carat_quantity == other.carat_quantity
            && self.unpacked_quantity == other.unpacked_quantity
            && self.total_quantity == other.total_quantity
            && tolerance.approx_eq(self.quarter_weight, other.quarter_weight)
            && tolerance.approx_eq(self.half_weight, other.half_weight)
            && tolerance.approx_eq(self.carat_weight, other.carat_weight)
            && tolerance.approx_eq(self.unpacked_weight, other.unpacked_weight)
            && tolerance.approx_eq(self.total_weight, other.total_weight)
    }
}

/// A broken lot invariant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LotDiscrepancy {
    /// Total lot differs from on-book + off-book for one (location, grade, sieve)
    MirrorMismatch {
        location_id: i64,
        grade_id: i64,
        sieve_size_id: i64,
        total: CounterSet,
        books: CounterSet,
    },
    /// `total_weight` differs from class weights + unpacked weight
    Unbalanced {
        lot_id: i64,
        total_weight: Decimal,
        component_weight: Decimal,
    },
}

#[derive(Default)]
struct MirrorGroup {
    total: CounterSet,
    books: CounterSet,
}

/// Check every live lot; missing lots count as zero
pub fn verify_lot_mirrors(lots: &[Lot], tolerance: Tolerance) -> Vec<LotDiscrepancy> {
    let mut discrepancies = Vec::new();
    let mut groups: BTreeMap<(i64, i64, i64), MirrorGroup> = BTreeMap::new();

    for lot in lots.iter().filter(|lot| !lot.is_deleted) {
        if !lot.is_balanced(tolerance) {
            discrepancies.push(LotDiscrepancy::Unbalanced {
                lot_id: lot.id,
                total_weight: lot.total_weight,
                component_weight: lot.component_weight(),
            });
        }

        let group = groups
            .entry((lot.location_id, lot.grade_id, lot.sieve_size_id))
            .or_default();
        let counters = CounterSet::of(lot);
        if lot.book_flag.is_total() {
            group.total = group.total.add(counters);
        } else {
            group.books = group.books.add(counters);
        }
    }

    for ((location_id, grade_id, sieve_size_id), group) in groups {
        if !group.total.approx_eq(&group.books, tolerance) {
            discrepancies.push(LotDiscrepancy::MirrorMismatch {
                location_id,
                grade_id,
                sieve_size_id,
                total: group.total,
                books: group.books,
            });
        }
    }

    discrepancies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::storage::LedgerStorage;
    use shared::SizeClass;
    use shared::models::WeightBucket;

    fn quarter() -> LotDelta {
        LotDelta::add_packet(WeightBucket::Standard(SizeClass::Quarter), Decimal::new(25, 2))
    }

    #[test]
    fn test_find_or_create_is_lazy_and_stable() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        let ctx = LedgerContext::new(&storage, &txn, Tolerance::default(), 0);

        let pair = resolve_lot_pair(&ctx, 1, 2, 3, LotBookFlag::OffBook).unwrap();
        assert_eq!(pair.book.book_flag, LotBookFlag::OffBook);
        assert_eq!(pair.total.book_flag, LotBookFlag::Total);
        assert_ne!(pair.book.id, pair.total.id);

        let again = resolve_lot_pair(&ctx, 1, 2, 3, LotBookFlag::OffBook).unwrap();
        assert_eq!(again.book.id, pair.book.id);
        assert_eq!(again.total.id, pair.total.id);

        // On-book sibling shares the total lot
        let on_book = resolve_lot_pair(&ctx, 1, 2, 3, LotBookFlag::OnBook).unwrap();
        assert_ne!(on_book.book.id, pair.book.id);
        assert_eq!(on_book.total.id, pair.total.id);
    }

    #[test]
    fn test_apply_delta_updates_both_lots() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        let ctx = LedgerContext::new(&storage, &txn, Tolerance::default(), 0);

        let pair = resolve_lot_pair(&ctx, 1, 2, 3, LotBookFlag::OnBook).unwrap();
        apply_delta(&ctx, pair.book.id, pair.total.id, &quarter()).unwrap();

        let book = load_lot(&ctx, pair.book.id).unwrap();
        let total = load_lot(&ctx, pair.total.id).unwrap();
        assert_eq!(book.quarter.quantity, 1);
        assert_eq!(CounterSet::of(&book), CounterSet::of(&total));
    }

    #[test]
    fn test_negative_delta_is_consistency_error() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        let ctx = LedgerContext::new(&storage, &txn, Tolerance::default(), 0);

        let pair = resolve_lot_pair(&ctx, 1, 2, 3, LotBookFlag::OnBook).unwrap();
        let removal = LotDelta::remove_packet(
            WeightBucket::Standard(SizeClass::Quarter),
            Decimal::new(25, 2),
        );
        let err = apply_delta(&ctx, pair.book.id, pair.total.id, &removal).unwrap_err();
        assert!(matches!(err, LedgerError::Consistency(_)));
    }

    #[test]
    fn test_retire_requires_empty_lot() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        let ctx = LedgerContext::new(&storage, &txn, Tolerance::default(), 0);

        let pair = resolve_lot_pair(&ctx, 1, 2, 3, LotBookFlag::OnBook).unwrap();
        apply_delta(&ctx, pair.book.id, pair.total.id, &quarter()).unwrap();
        assert!(matches!(
            retire_lot(&ctx, pair.book.id),
            Err(LedgerError::LotNotEmpty { quantity: 1, .. })
        ));

        let empty = resolve_lot_pair(&ctx, 1, 2, 4, LotBookFlag::OffBook).unwrap();
        let retired = retire_lot(&ctx, empty.book.id).unwrap();
        assert!(retired.is_deleted);
        assert!(matches!(
            load_lot(&ctx, empty.book.id),
            Err(LedgerError::LotNotFound(_))
        ));

        // Next contribution gets a fresh lot
        let fresh = resolve_lot_pair(&ctx, 1, 2, 4, LotBookFlag::OffBook).unwrap();
        assert_ne!(fresh.book.id, empty.book.id);
    }

    #[test]
    fn test_verify_detects_mirror_mismatch() {
        let tol = Tolerance::default();
        let on_key = LotKey::new(1, 2, 3, LotBookFlag::OnBook);
        let mut on_book = Lot::empty(1, on_key, 0);
        let mut total = Lot::empty(2, on_key.total(), 0);
        on_book.apply(&quarter(), 0);
        total.apply(&quarter(), 0);
        assert!(verify_lot_mirrors(&[on_book.clone(), total.clone()], tol).is_empty());

        // Off-book contribution missing from the total
        let mut off_book = Lot::empty(3, on_key.with_flag(LotBookFlag::OffBook), 0);
        off_book.apply(&quarter(), 0);
        let found = verify_lot_mirrors(&[on_book, total, off_book], tol);
        assert_eq!(found.len(), 1);
        assert!(matches!(
            found[0],
            LotDiscrepancy::MirrorMismatch { location_id: 1, grade_id: 2, sieve_size_id: 3, .. }
        ));
    }

    #[test]
    fn test_verify_detects_unbalanced_lot() {
        let mut lot = Lot::empty(1, LotKey::new(1, 1, 1, LotBookFlag::Total), 0);
        lot.total_weight = Decimal::new(1, 0);
        let found = verify_lot_mirrors(&[lot], Tolerance::default());
        assert!(
            found
                .iter()
                .any(|d| matches!(d, LotDiscrepancy::Unbalanced { lot_id: 1, .. }))
        );
    }
}
