//! Price lookup seam
//!
//! Allocation captures a per-carat price for every reserved packet. Price
//! computation lives elsewhere; the ledger only reads it.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Price lookup key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceKey {
    pub region_id: i64,
    pub shape_id: i64,
    pub color_id: i64,
    pub clarity_id: i64,
    pub sieve_size_id: i64,
}

/// Read-only price oracle
///
/// `None` means no price is recorded; allocation stores zero and proceeds.
pub trait PriceOracle: Send + Sync {
    fn price_for_grade(
        &self,
        region_id: i64,
        shape_id: i64,
        color_id: i64,
        clarity_id: i64,
        sieve_size_id: i64,
    ) -> Option<Decimal>;
}

/// In-memory price list
#[derive(Debug, Default)]
pub struct StaticPriceList {
    prices: RwLock<HashMap<PriceKey, Decimal>>,
}

impl StaticPriceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, key: PriceKey, price_per_carat: Decimal) {
        self.prices.write().insert(key, price_per_carat);
    }

    pub fn remove_price(&self, key: &PriceKey) {
        self.prices.write().remove(key);
    }
}

impl PriceOracle for StaticPriceList {
    fn price_for_grade(
        &self,
        region_id: i64,
        shape_id: i64,
        color_id: i64,
        clarity_id: i64,
        sieve_size_id: i64,
    ) -> Option<Decimal> {
        let key = PriceKey {
            region_id,
            shape_id,
            color_id,
            clarity_id,
            sieve_size_id,
        };
        self.prices.read().get(&key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_price_list() {
        let list = StaticPriceList::new();
        let key = PriceKey {
            region_id: 1,
            shape_id: 2,
            color_id: 3,
            clarity_id: 4,
            sieve_size_id: 5,
        };
        assert_eq!(list.price_for_grade(1, 2, 3, 4, 5), None);

        list.set_price(key, Decimal::new(120000, 2));
        assert_eq!(list.price_for_grade(1, 2, 3, 4, 5), Some(Decimal::new(120000, 2)));
        assert_eq!(list.price_for_grade(9, 2, 3, 4, 5), None);

        list.remove_price(&key);
        assert_eq!(list.price_for_grade(1, 2, 3, 4, 5), None);
    }
}
