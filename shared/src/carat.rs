//! Carat weights, standard packet sizes and weight tolerance
//!
//! All weights are `Decimal` carats. Comparisons go through [`Tolerance`] so
//! the epsilon is a single configurable value rather than a literal scattered
//! across the engines.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default weight epsilon (0.0001 ct)
pub const DEFAULT_WEIGHT_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

/// Standard packet size classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SizeClass {
    /// 0.25 ct
    #[serde(rename = "0.25")]
    Quarter,
    /// 0.50 ct
    #[serde(rename = "0.50")]
    Half,
    /// 1.00 ct
    #[serde(rename = "1.00")]
    Carat,
}

impl SizeClass {
    pub const ALL: [SizeClass; 3] = [SizeClass::Quarter, SizeClass::Half, SizeClass::Carat];

    /// Nominal weight of this class
    pub const fn weight(self) -> Decimal {
        match self {
            SizeClass::Quarter => Decimal::from_parts(25, 0, 0, false, 2),
            SizeClass::Half => Decimal::from_parts(50, 0, 0, false, 2),
            SizeClass::Carat => Decimal::from_parts(100, 0, 0, false, 2),
        }
    }

    /// Classify a weight into a standard class, or `None` for non-standard weight
    pub fn classify(weight: Decimal, tolerance: Tolerance) -> Option<SizeClass> {
        Self::ALL
            .into_iter()
            .find(|class| tolerance.approx_eq(weight, class.weight()))
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ct", self.weight())
    }
}

/// Weight comparison tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tolerance(Decimal);

impl Tolerance {
    /// Create a tolerance; negative values are taken as their magnitude
    pub fn new(epsilon: Decimal) -> Self {
        Self(epsilon.abs())
    }

    pub fn epsilon(&self) -> Decimal {
        self.0
    }

    /// `a == b` within epsilon
    pub fn approx_eq(&self, a: Decimal, b: Decimal) -> bool {
        (a - b).abs() <= self.0
    }

    /// `value == 0` within epsilon
    pub fn is_zero(&self, value: Decimal) -> bool {
        value.abs() <= self.0
    }

    /// `available` can cover `required` (shortfall no larger than epsilon)
    pub fn covers(&self, available: Decimal, required: Decimal) -> bool {
        available + self.0 >= required
    }

    /// `value` is below zero by more than epsilon
    pub fn is_negative(&self, value: Decimal) -> bool {
        value < -self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self(DEFAULT_WEIGHT_EPSILON)
    }
}
