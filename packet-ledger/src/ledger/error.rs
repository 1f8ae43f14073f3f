use super::storage::StorageError;
use rust_decimal::Decimal;
use shared::SizeClass;
use shared::error::{AppError, ErrorCode};
use shared::models::{OrderStatus, PacketStatus};
use thiserror::Error;

/// Coarse failure class, independent of the concrete error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request, rejected before any transaction opens
    Validation,
    NotFound,
    /// Legitimate business conflict, rolled back
    StateConflict,
    /// Logic bug, rolled back and reported distinctly
    Consistency,
    /// Refused by policy, nothing mutated
    Policy,
    Storage,
}

/// Ledger engine errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Grade not found: {0}")]
    GradeNotFound(i64),

    #[error("Lot not found: {0}")]
    LotNotFound(i64),

    #[error("Packet not found: {0}")]
    PacketNotFound(i64),

    #[error("Order not found: {0}")]
    OrderNotFound(i64),

    #[error("Source already unpacked: packet {0}")]
    SourceAlreadyUnpacked(i64),

    #[error("Source packet {packet_id} is {status:?}, not available")]
    SourceReserved { packet_id: i64, status: PacketStatus },

    #[error(
        "Source packets span multiple locations: packet {packet_id} is at {found}, expected {expected}"
    )]
    LocationMismatch {
        packet_id: i64,
        expected: i64,
        found: i64,
    },

    #[error("Insufficient combined weight: requested {requested} ct, available {available} ct")]
    InsufficientWeight {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Insufficient packets in lot {lot_id} for {size}: needed {needed}, available {available}")]
    InsufficientPackets {
        lot_id: i64,
        size: SizeClass,
        needed: u32,
        available: u32,
    },

    #[error("Lot {lot_id} still holds {quantity} packets")]
    LotNotEmpty { lot_id: i64, quantity: i64 },

    #[error("Order {order_id} already {status:?}")]
    OrderAlreadyReleased { order_id: i64, status: OrderStatus },

    #[error("Order {order_id} is {status:?}; release no longer permitted")]
    OrderDispatched { order_id: i64, status: OrderStatus },

    #[error("Cancel window exceeded for order {order_id}: {elapsed_ms} ms elapsed, window {window_ms} ms")]
    CancelWindowExceeded {
        order_id: i64,
        elapsed_ms: i64,
        window_ms: i64,
    },

    #[error("Order {order_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Ledger consistency violated: {0}")]
    Consistency(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Storage(_) => ErrorKind::Storage,
            LedgerError::Validation(_) | LedgerError::InvalidTransition { .. } => {
                ErrorKind::Validation
            }
            LedgerError::GradeNotFound(_)
            | LedgerError::LotNotFound(_)
            | LedgerError::PacketNotFound(_)
            | LedgerError::OrderNotFound(_) => ErrorKind::NotFound,
            LedgerError::SourceAlreadyUnpacked(_)
            | LedgerError::SourceReserved { .. }
            | LedgerError::LocationMismatch { .. }
            | LedgerError::InsufficientWeight { .. }
            | LedgerError::InsufficientPackets { .. }
            | LedgerError::LotNotEmpty { .. }
            | LedgerError::OrderAlreadyReleased { .. } => ErrorKind::StateConflict,
            LedgerError::OrderDispatched { .. } | LedgerError::CancelWindowExceeded { .. } => {
                ErrorKind::Policy
            }
            LedgerError::Consistency(_) => ErrorKind::Consistency,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation(msg.into())
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        LedgerError::Consistency(msg.into())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::Storage(e) => {
                tracing::error!(error = %e, "Storage error occurred");
                AppError::with_message(ErrorCode::DatabaseError, message)
            }
            LedgerError::Validation(_) => AppError::with_message(ErrorCode::ValidationFailed, message),
            LedgerError::GradeNotFound(id) => {
                AppError::with_message(ErrorCode::GradeNotFound, message).with_detail("grade_id", id)
            }
            LedgerError::LotNotFound(id) => {
                AppError::with_message(ErrorCode::LotNotFound, message).with_detail("lot_id", id)
            }
            LedgerError::PacketNotFound(id) => {
                AppError::with_message(ErrorCode::PacketNotFound, message)
                    .with_detail("packet_id", id)
            }
            LedgerError::OrderNotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, message).with_detail("order_id", id)
            }
            LedgerError::SourceAlreadyUnpacked(id) => {
                AppError::with_message(ErrorCode::PacketAlreadyUnpacked, message)
                    .with_detail("packet_id", id)
            }
            LedgerError::SourceReserved { packet_id, .. } => {
                AppError::with_message(ErrorCode::PacketReserved, message)
                    .with_detail("packet_id", packet_id)
            }
            LedgerError::LocationMismatch {
                packet_id,
                expected,
                found,
            } => AppError::with_message(ErrorCode::SourceLocationMismatch, message)
                .with_detail("packet_id", packet_id)
                .with_detail("expected_location_id", expected)
                .with_detail("found_location_id", found),
            LedgerError::InsufficientWeight {
                requested,
                available,
            } => AppError::with_message(ErrorCode::InsufficientWeight, message)
                .with_detail("requested", requested.to_string())
                .with_detail("available", available.to_string()),
            LedgerError::InsufficientPackets {
                lot_id,
                size,
                needed,
                available,
            } => AppError::with_message(ErrorCode::InsufficientPackets, message)
                .with_detail("lot_id", lot_id)
                .with_detail("size", size.weight().to_string())
                .with_detail("needed", needed)
                .with_detail("available", available),
            LedgerError::LotNotEmpty { lot_id, quantity } => {
                AppError::with_message(ErrorCode::LotNotEmpty, message)
                    .with_detail("lot_id", lot_id)
                    .with_detail("quantity", quantity)
            }
            LedgerError::OrderAlreadyReleased { order_id, .. } => {
                AppError::with_message(ErrorCode::OrderAlreadyReleased, message)
                    .with_detail("order_id", order_id)
            }
            LedgerError::OrderDispatched { order_id, .. } => {
                AppError::with_message(ErrorCode::OrderAlreadyShipped, message)
                    .with_detail("order_id", order_id)
            }
            LedgerError::CancelWindowExceeded {
                order_id,
                elapsed_ms,
                window_ms,
            } => AppError::with_message(ErrorCode::CancelWindowExceeded, message)
                .with_detail("order_id", order_id)
                .with_detail("elapsed_ms", elapsed_ms)
                .with_detail("window_ms", window_ms),
            LedgerError::InvalidTransition { order_id, .. } => {
                AppError::with_message(ErrorCode::InvalidOrderTransition, message)
                    .with_detail("order_id", order_id)
            }
            LedgerError::Consistency(_) => {
                tracing::error!(error = %message, "Ledger consistency violation");
                AppError::with_message(ErrorCode::ConsistencyViolation, message)
            }
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ErrorCategory;

    #[test]
    fn test_kinds() {
        assert_eq!(
            LedgerError::validation("empty").kind(),
            ErrorKind::Validation
        );
        assert_eq!(LedgerError::PacketNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(
            LedgerError::SourceAlreadyUnpacked(1).kind(),
            ErrorKind::StateConflict
        );
        assert_eq!(
            LedgerError::consistency("negative remainder").kind(),
            ErrorKind::Consistency
        );
        assert_eq!(
            LedgerError::CancelWindowExceeded {
                order_id: 1,
                elapsed_ms: 2,
                window_ms: 1
            }
            .kind(),
            ErrorKind::Policy
        );
    }

    #[test]
    fn test_insufficient_packets_details() {
        let err: AppError = LedgerError::InsufficientPackets {
            lot_id: 42,
            size: SizeClass::Quarter,
            needed: 3,
            available: 1,
        }
        .into();

        assert_eq!(err.code, ErrorCode::InsufficientPackets);
        assert_eq!(err.detail("lot_id").unwrap(), 42);
        assert_eq!(err.detail("needed").unwrap(), 3);
        assert_eq!(err.detail("available").unwrap(), 1);
        assert_eq!(err.detail("size").unwrap(), "0.25");
    }

    #[test]
    fn test_consistency_maps_to_system_code() {
        let err: AppError = LedgerError::consistency("split mismatch").into();
        assert_eq!(err.code, ErrorCode::ConsistencyViolation);
        assert_eq!(err.code.category(), ErrorCategory::System);
    }

    #[test]
    fn test_policy_codes() {
        let err: AppError = LedgerError::OrderDispatched {
            order_id: 9,
            status: OrderStatus::Shipped,
        }
        .into();
        assert_eq!(err.code, ErrorCode::OrderAlreadyShipped);
        assert_eq!(err.code.category(), ErrorCategory::Order);
    }
}
