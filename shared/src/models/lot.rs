//! Lot Model
//!
//! A lot aggregates packets sharing (location, grade, sieve size, book flag).
//! It never stores packet identities, only running counters, and every
//! counter change is expressed as a [`LotDelta`].

use crate::carat::{SizeClass, Tolerance};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Book flag of a lot row
///
/// `Total` rows mirror the sum of the `OnBook` and `OffBook` rows sharing the
/// same location, grade and sieve size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotBookFlag {
    Total,
    OnBook,
    OffBook,
}

impl LotBookFlag {
    /// Stable numeric tag used in storage keys
    pub const fn tag(self) -> u8 {
        match self {
            LotBookFlag::Total => 0,
            LotBookFlag::OnBook => 1,
            LotBookFlag::OffBook => 2,
        }
    }

    pub fn is_total(self) -> bool {
        matches!(self, LotBookFlag::Total)
    }
}

/// Four-part lot identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LotKey {
    pub location_id: i64,
    pub grade_id: i64,
    pub sieve_size_id: i64,
    pub book_flag: LotBookFlag,
}

impl LotKey {
    pub fn new(location_id: i64, grade_id: i64, sieve_size_id: i64, book_flag: LotBookFlag) -> Self {
        Self {
            location_id,
            grade_id,
            sieve_size_id,
            book_flag,
        }
    }

    /// The mirrored `Total` key for the same location, grade and sieve size
    pub fn total(&self) -> Self {
        Self {
            book_flag: LotBookFlag::Total,
            ..*self
        }
    }

    pub fn with_flag(&self, book_flag: LotBookFlag) -> Self {
        Self { book_flag, ..*self }
    }
}

/// Count and weight of one standard size class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeCounter {
    pub quantity: i64,
    pub weight: Decimal,
}

/// Which counter bucket a delta applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightBucket {
    Standard(SizeClass),
    /// Non-standard weight
    Unpacked,
}

impl WeightBucket {
    pub fn classify(weight: Decimal, tolerance: Tolerance) -> Self {
        SizeClass::classify(weight, tolerance)
            .map(WeightBucket::Standard)
            .unwrap_or(WeightBucket::Unpacked)
    }
}

/// Counter delta applied to a lot (and identically to its total mirror)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDelta {
    pub bucket: WeightBucket,
    pub count: i64,
    pub weight: Decimal,
}

impl LotDelta {
    /// One packet of `weight` entering the lot
    pub fn add_packet(bucket: WeightBucket, weight: Decimal) -> Self {
        Self {
            bucket,
            count: 1,
            weight,
        }
    }

    /// One packet of `weight` leaving the lot
    pub fn remove_packet(bucket: WeightBucket, weight: Decimal) -> Self {
        Self {
            bucket,
            count: -1,
            weight: -weight,
        }
    }
}

/// Lot entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub id: i64,
    pub location_id: i64,
    pub grade_id: i64,
    pub sieve_size_id: i64,
    pub book_flag: LotBookFlag,
    pub quarter: SizeCounter,
    pub half: SizeCounter,
    pub carat: SizeCounter,
    /// Packets whose weight matches no standard class
    pub unpacked_quantity: i64,
    pub unpacked_weight: Decimal,
    pub total_quantity: i64,
    pub total_weight: Decimal,
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Lot {
    /// A lot with every counter zeroed
    pub fn empty(id: i64, key: LotKey, now: i64) -> Self {
        Self {
            id,
            location_id: key.location_id,
            grade_id: key.grade_id,
            sieve_size_id: key.sieve_size_id,
            book_flag: key.book_flag,
            quarter: SizeCounter::default(),
            half: SizeCounter::default(),
            carat: SizeCounter::default(),
            unpacked_quantity: 0,
            unpacked_weight: Decimal::ZERO,
            total_quantity: 0,
            total_weight: Decimal::ZERO,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> LotKey {
        LotKey::new(
            self.location_id,
            self.grade_id,
            self.sieve_size_id,
            self.book_flag,
        )
    }

    pub fn counter(&self, class: SizeClass) -> SizeCounter {
        match class {
            SizeClass::Quarter => self.quarter,
            SizeClass::Half => self.half,
            SizeClass::Carat => self.carat,
        }
    }

    fn counter_mut(&mut self, class: SizeClass) -> &mut SizeCounter {
        match class {
            SizeClass::Quarter => &mut self.quarter,
            SizeClass::Half => &mut self.half,
            SizeClass::Carat => &mut self.carat,
        }
    }

    /// Apply a counter delta
    pub fn apply(&mut self, delta: &LotDelta, now: i64) {
        match delta.bucket {
            WeightBucket::Standard(class) => {
                let counter = self.counter_mut(class);
                counter.quantity += delta.count;
                counter.weight += delta.weight;
            }
            WeightBucket::Unpacked => {
                self.unpacked_quantity += delta.count;
                self.unpacked_weight += delta.weight;
            }
        }
        self.total_quantity += delta.count;
        self.total_weight += delta.weight;
        self.updated_at = now;
    }

    /// Sum of the standard class weights plus unpacked weight
    pub fn component_weight(&self) -> Decimal {
        self.quarter.weight + self.half.weight + self.carat.weight + self.unpacked_weight
    }

    /// `total_weight == sum(class weights) + unpacked_weight`
    pub fn is_balanced(&self, tolerance: Tolerance) -> bool {
        tolerance.approx_eq(self.total_weight, self.component_weight())
    }

    /// Any counter driven below zero
    pub fn has_negative_counter(&self, tolerance: Tolerance) -> bool {
        let quantities = [
            self.quarter.quantity,
            self.half.quantity,
            self.carat.quantity,
            self.unpacked_quantity,
            self.total_quantity,
        ];
        let weights = [
            self.quarter.weight,
            self.half.weight,
            self.carat.weight,
            self.unpacked_weight,
            self.total_weight,
        ];
        quantities.iter().any(|q| *q < 0) || weights.iter().any(|w| tolerance.is_negative(*w))
    }

    pub fn is_empty(&self, tolerance: Tolerance) -> bool {
        self.total_quantity == 0 && tolerance.is_zero(self.total_weight)
    }
}
