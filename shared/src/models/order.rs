//! Order Model
//!
//! Only the parts of an order the ledger owns: the header status and the
//! packet snapshots taken at allocation time.

use super::packet::{PacketBookFlag, PacketStatus};
use crate::carat::SizeClass;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Position on the forward path, `None` for released states
    pub fn forward_rank(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Shipped => Some(2),
            OrderStatus::Delivered => Some(3),
            OrderStatus::Cancelled | OrderStatus::Rejected => None,
        }
    }

    pub fn is_released(self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Rejected)
    }

    /// Shipped or delivered: reserved packets have left the building
    pub fn is_dispatched(self) -> bool {
        matches!(self, OrderStatus::Shipped | OrderStatus::Delivered)
    }
}

/// How a reservation is being released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseKind {
    /// Customer-initiated, limited to the cancel window
    CustomerCancel,
    Reject,
    AdminRevert,
}

impl ReleaseKind {
    pub fn target_status(self) -> OrderStatus {
        match self {
            ReleaseKind::CustomerCancel | ReleaseKind::AdminRevert => OrderStatus::Cancelled,
            ReleaseKind::Reject => OrderStatus::Rejected,
        }
    }

    pub fn is_time_boxed(self) -> bool {
        matches!(self, ReleaseKind::CustomerCancel)
    }
}

/// Order header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub region_id: i64,
    pub status: OrderStatus,
    pub total_weight: Decimal,
    pub total_amount: Decimal,
    pub packet_count: u32,
    pub reason: Option<String>,
    pub created_by: i64,
    pub released_by: Option<i64>,
    pub released_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Snapshot of a packet at the moment it was reserved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPacketDetail {
    pub id: i64,
    pub order_id: i64,
    pub packet_id: i64,
    pub qr_code: String,
    pub lot_id: i64,
    pub total_lot_id: i64,
    pub grade_id: i64,
    pub shape_id: i64,
    pub color_id: i64,
    pub clarity_id: i64,
    pub sieve_size_id: i64,
    pub location_id: i64,
    pub size_class: SizeClass,
    pub weight: Decimal,
    pub on_book_weight: Decimal,
    pub off_book_weight: Decimal,
    pub book_flag: PacketBookFlag,
    /// Zero when no price is recorded
    pub price_per_carat: Decimal,
    pub amount: Decimal,
    pub current_status: PacketStatus,
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}
