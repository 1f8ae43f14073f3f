//! Provenance Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Audit link from an unpacked target packet back to one source it drew from
///
/// Never mutated after creation and never read for weight truth; the target
/// packet's own on/off weights are authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub id: i64,
    /// Newly created packet
    pub packet_id: i64,
    pub source_packet_id: i64,
    pub source_lot_id: i64,
    pub on_book_weight: Decimal,
    pub off_book_weight: Decimal,
    pub created_at: i64,
}

impl ProvenanceRecord {
    pub fn weight(&self) -> Decimal {
        self.on_book_weight + self.off_book_weight
    }
}
