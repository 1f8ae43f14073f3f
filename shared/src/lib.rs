//! Shared types for the packet ledger
//!
//! Domain models, carat size classes, and the unified error-code system used
//! by the ledger engine and by any surface that reports its failures.

pub mod carat;
pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use carat::{SizeClass, Tolerance};
pub use error::{AppError, AppResult, ErrorCategory, ErrorCode};
pub use serde::{Deserialize, Serialize};
