use super::error::LedgerResult;
use super::storage::{LedgerStorage, Sequence};
use redb::WriteTransaction;
use shared::Tolerance;

/// Per-operation context
///
/// Holds the single write transaction every read and write of one mutating
/// operation goes through. Rows read via the context stay locked until the
/// transaction commits or aborts.
pub struct LedgerContext<'a> {
    pub storage: &'a LedgerStorage,
    pub txn: &'a WriteTransaction,
    pub tolerance: Tolerance,
    /// Captured once the write lock is held
    pub now: i64,
}

impl<'a> LedgerContext<'a> {
    pub fn new(
        storage: &'a LedgerStorage,
        txn: &'a WriteTransaction,
        tolerance: Tolerance,
        now: i64,
    ) -> Self {
        Self {
            storage,
            txn,
            tolerance,
            now,
        }
    }

    pub fn next_id(&self, seq: Sequence) -> LedgerResult<i64> {
        Ok(self.storage.next_id(self.txn, seq)?)
    }
}
