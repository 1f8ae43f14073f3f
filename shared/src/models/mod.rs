//! Data models
//!
//! Shared between the ledger engine and any surface that reports on it.
//! All IDs are `i64` and ascend in creation order.

pub mod grade;
pub mod lot;
pub mod order;
pub mod packet;
pub mod provenance;
pub mod requests;

// Re-exports
pub use grade::*;
pub use lot::*;
pub use order::*;
pub use packet::*;
pub use provenance::*;
pub use requests::*;
