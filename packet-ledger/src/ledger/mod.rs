//! Packet/lot ledger
//!
//! # Architecture
//!
//! ```text
//! InventoryManager (validate → begin_write → engine → commit/abort)
//!     │
//!     ├─ intake      new stock into packets and lots
//!     ├─ unpacking   sources → targets, FIFO book provenance (fifo)
//!     ├─ allocation  (lot, size) counts → reserved packets + order
//!     └─ release     order back to the pool, status moves
//!            │
//!            ▼
//!     lots / packets / grades   counter and row helpers over LedgerContext
//!            │
//!            ▼
//!     LedgerStorage (redb)      rows, indexes, sequences
//! ```
//!
//! Every lot change is applied to the book lot and its total lot in the
//! same transaction, so a total lot always equals the sum of its books.

pub mod allocation;
pub mod clock;
pub mod context;
pub mod error;
pub mod fifo;
pub mod grades;
pub mod intake;
pub mod lots;
pub mod manager;
pub mod packets;
pub mod pricing;
pub mod release;
pub mod storage;
pub mod unpacking;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use lots::LotDiscrepancy;
pub use manager::{InventoryManager, LedgerSettings};
pub use pricing::{PriceKey, PriceOracle, StaticPriceList};
pub use storage::{LedgerStorage, StorageError, StorageStats};
