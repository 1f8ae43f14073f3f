//! Ledger request and outcome types

use super::grade::GradeKey;
use super::order::{Order, OrderPacketDetail, ReleaseKind};
use super::packet::Packet;
use super::provenance::ProvenanceRecord;
use crate::carat::SizeClass;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ========== Intake ==========

/// One incoming packet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakePacket {
    pub grade: GradeKey,
    pub sieve_size_id: i64,
    pub on_book_weight: Decimal,
    pub off_book_weight: Decimal,
}

/// New stock arriving at a purchase location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeRequest {
    pub location_id: i64,
    pub actor_id: i64,
    pub packets: Vec<IntakePacket>,
}

// ========== Unpacking ==========

/// One requested target packet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnpackTarget {
    pub weight: Decimal,
    pub grade: GradeKey,
    pub sieve_size_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnpackRequest {
    pub source_packet_ids: Vec<i64>,
    /// Processed in input order
    pub targets: Vec<UnpackTarget>,
    pub actor_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnpackOutcome {
    pub created: Vec<Packet>,
    pub provenance: Vec<ProvenanceRecord>,
    /// Sources fully drained and now terminal
    pub unpacked_sources: Vec<i64>,
    /// Sources left with a residual weight
    pub residual_sources: Vec<i64>,
}

// ========== Allocation ==========

/// "`quantity` packets of `size` from `lot_id`"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationLine {
    pub lot_id: i64,
    pub size: SizeClass,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub customer_id: i64,
    /// Used for price lookup
    pub region_id: i64,
    pub actor_id: i64,
    pub lines: Vec<AllocationLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub order: Order,
    pub details: Vec<OrderPacketDetail>,
}

impl AllocationOutcome {
    pub fn packet_ids(&self) -> Vec<i64> {
        self.details.iter().map(|d| d.packet_id).collect()
    }
}

// ========== Release ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub order_id: i64,
    pub kind: ReleaseKind,
    pub reason: String,
    pub actor_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseOutcome {
    pub order: Order,
    pub released_packet_ids: Vec<i64>,
}
