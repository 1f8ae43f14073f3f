//! Unified error codes for the packet ledger
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Grade and lot errors
//! - 2xxx: Packet errors
//! - 3xxx: Unpacking errors
//! - 4xxx: Order and allocation errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for compact serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,

    // ==================== 1xxx: Grade / Lot ====================
    /// Grade not found
    GradeNotFound = 1001,
    /// Lot not found
    LotNotFound = 1101,
    /// Lot still holds stock
    LotNotEmpty = 1102,

    // ==================== 2xxx: Packet ====================
    /// Packet not found
    PacketNotFound = 2001,
    /// Packet has already been unpacked
    PacketAlreadyUnpacked = 2002,
    /// Packet is reserved by an order
    PacketReserved = 2003,

    // ==================== 3xxx: Unpacking ====================
    /// Sources cannot cover the requested target weight
    InsufficientWeight = 3001,
    /// Source packets belong to more than one location
    SourceLocationMismatch = 3002,

    // ==================== 4xxx: Order / Allocation ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Not enough available packets for a lot and size
    InsufficientPackets = 4002,
    /// Order has already been cancelled or rejected
    OrderAlreadyReleased = 4003,
    /// Order has already shipped
    OrderAlreadyShipped = 4004,
    /// Customer cancellation window has passed
    CancelWindowExceeded = 4005,
    /// Order status transition not allowed
    InvalidOrderTransition = 4006,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Ledger consistency violated (logic bug, not a business condition)
    ConsistencyViolation = 9003,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",

            // Grade / Lot
            ErrorCode::GradeNotFound => "Grade not found",
            ErrorCode::LotNotFound => "Lot not found",
            ErrorCode::LotNotEmpty => "Lot still holds stock",

            // Packet
            ErrorCode::PacketNotFound => "Packet not found",
            ErrorCode::PacketAlreadyUnpacked => "Source already unpacked",
            ErrorCode::PacketReserved => "Packet is reserved by an order",

            // Unpacking
            ErrorCode::InsufficientWeight => {
                "Insufficient combined weight to satisfy requested targets"
            }
            ErrorCode::SourceLocationMismatch => "Source packets span multiple locations",

            // Order / Allocation
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::InsufficientPackets => "Insufficient available packets",
            ErrorCode::OrderAlreadyReleased => "Order has already been released",
            ErrorCode::OrderAlreadyShipped => "Order has already shipped",
            ErrorCode::CancelWindowExceeded => "Cancellation window has passed",
            ErrorCode::InvalidOrderTransition => "Order status transition not allowed",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConsistencyViolation => "Ledger consistency violated",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),

            // Grade / Lot
            1001 => Ok(ErrorCode::GradeNotFound),
            1101 => Ok(ErrorCode::LotNotFound),
            1102 => Ok(ErrorCode::LotNotEmpty),

            // Packet
            2001 => Ok(ErrorCode::PacketNotFound),
            2002 => Ok(ErrorCode::PacketAlreadyUnpacked),
            2003 => Ok(ErrorCode::PacketReserved),

            // Unpacking
            3001 => Ok(ErrorCode::InsufficientWeight),
            3002 => Ok(ErrorCode::SourceLocationMismatch),

            // Order / Allocation
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::InsufficientPackets),
            4003 => Ok(ErrorCode::OrderAlreadyReleased),
            4004 => Ok(ErrorCode::OrderAlreadyShipped),
            4005 => Ok(ErrorCode::CancelWindowExceeded),
            4006 => Ok(ErrorCode::InvalidOrderTransition),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::ConsistencyViolation),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
