//! Packet Model

use super::lot::{LotBookFlag, WeightBucket};
use crate::carat::{SizeClass, Tolerance};
use crate::util::date_stamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Book provenance of a packet's carats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketBookFlag {
    OnBook,
    OffBook,
    Mix,
}

impl PacketBookFlag {
    /// Derive the flag from an on/off split
    pub fn from_split(on_book: Decimal, off_book: Decimal, tolerance: Tolerance) -> Self {
        match (tolerance.is_zero(on_book), tolerance.is_zero(off_book)) {
            (false, true) => PacketBookFlag::OnBook,
            (true, false) => PacketBookFlag::OffBook,
            _ => PacketBookFlag::Mix,
        }
    }

    /// Book lot the packet files under; mixed packets file on-book
    pub fn lot_flag(self) -> LotBookFlag {
        match self {
            PacketBookFlag::OnBook | PacketBookFlag::Mix => LotBookFlag::OnBook,
            PacketBookFlag::OffBook => LotBookFlag::OffBook,
        }
    }

    /// Allocation priority (lower sells first)
    pub fn priority(self) -> u8 {
        match self {
            PacketBookFlag::OnBook => 0,
            PacketBookFlag::OffBook => 1,
            PacketBookFlag::Mix => 2,
        }
    }
}

/// Packet current status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketStatus {
    Available,
    Unavailable,
    Sold,
    Hold,
}

/// Packet entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub id: i64,
    pub qr_code: String,
    /// Book-specific lot
    pub lot_id: i64,
    /// Mirrored total lot
    pub total_lot_id: i64,
    pub grade_id: i64,
    pub location_id: i64,
    pub sieve_size_id: i64,
    pub weight: Decimal,
    pub on_book_weight: Decimal,
    pub off_book_weight: Decimal,
    pub book_flag: PacketBookFlag,
    pub remaining_weight: Decimal,
    pub remaining_on_book: Decimal,
    pub remaining_off_book: Decimal,
    pub is_unpacked: bool,
    pub is_available_for_store: bool,
    pub current_status: PacketStatus,
    pub available_since: Option<i64>,
    pub available_by: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Packet {
    /// QR code printed on the physical packet
    pub fn qr_code_for(id: i64, created_at: i64) -> String {
        format!("PKT{}{:08}", date_stamp(created_at), id)
    }

    /// Counter bucket of the packet's current contribution to its lots
    pub fn remaining_bucket(&self, tolerance: Tolerance) -> WeightBucket {
        WeightBucket::classify(self.remaining_weight, tolerance)
    }

    /// Eligible as an unpacking source
    pub fn is_selectable_source(&self) -> bool {
        !self.is_unpacked && self.current_status == PacketStatus::Available
    }

    /// Eligible to be reserved as one packet of `class`
    pub fn is_sale_candidate(&self, class: SizeClass, tolerance: Tolerance) -> bool {
        self.is_available_for_store
            && !self.is_unpacked
            && self.remaining_weight > Decimal::ZERO
            && self.current_status != PacketStatus::Sold
            && tolerance.approx_eq(self.remaining_weight, class.weight())
    }

    /// Sort key used by allocation and browsing
    pub fn selection_key(&self) -> (u8, i64, i64) {
        (self.book_flag.priority(), self.created_at, self.id)
    }

    /// Consume `on_book` and `off_book` carats from the remaining split
    pub fn draw(&mut self, on_book: Decimal, off_book: Decimal) {
        self.remaining_on_book -= on_book;
        self.remaining_off_book -= off_book;
        self.remaining_weight = self.remaining_on_book + self.remaining_off_book;
    }

    /// Terminal unpacked state
    pub fn mark_unpacked(&mut self, now: i64) {
        self.is_unpacked = true;
        self.is_available_for_store = false;
        self.current_status = PacketStatus::Unavailable;
        self.available_since = None;
        self.available_by = None;
        self.remaining_on_book = Decimal::ZERO;
        self.remaining_off_book = Decimal::ZERO;
        self.remaining_weight = Decimal::ZERO;
        self.updated_at = now;
    }

    /// Reservation by an order
    pub fn mark_sold(&mut self, now: i64) {
        self.is_available_for_store = false;
        self.current_status = PacketStatus::Sold;
        self.available_since = None;
        self.available_by = None;
        self.updated_at = now;
    }

    /// Return to the available pool
    pub fn mark_available(&mut self, actor_id: i64, now: i64) {
        self.is_available_for_store = true;
        self.current_status = PacketStatus::Available;
        self.available_since = Some(now);
        self.available_by = Some(actor_id);
        self.updated_at = now;
    }
}
