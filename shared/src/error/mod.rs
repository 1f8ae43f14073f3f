//! Unified error system for the packet ledger
//!
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`AppError`]: Rich error type with codes, messages, and details
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Grade and lot errors
//! - 2xxx: Packet errors
//! - 3xxx: Unpacking errors
//! - 4xxx: Order and allocation errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode};
//!
//! let err = AppError::with_message(ErrorCode::InsufficientPackets, "lot 42 is short")
//!     .with_detail("lot_id", 42)
//!     .with_detail("needed", 3);
//!
//! assert_eq!(err.code.code(), 4002);
//! assert_eq!(err.detail("needed").unwrap(), 3);
//! ```

mod category;
mod codes;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{AppError, AppResult};
