//! InventoryManager - entry point for every ledger operation
//!
//! # Operation Flow
//!
//! ```text
//! operation(request)
//!     ├─ 1. Validate request (no transaction, no lock)
//!     ├─ 2. Begin write transaction (blocks while another writer holds it)
//!     ├─ 3. Create LedgerContext (clock read under the lock)
//!     ├─ 4. Run the engine against the context
//!     ├─ 5. Commit, or abort on any error
//!     └─ 6. Return outcome
//! ```
//!
//! Read queries open MVCC read transactions and never block writers.

use super::allocation;
use super::clock::{Clock, SystemClock};
use super::context::LedgerContext;
use super::error::{LedgerError, LedgerResult};
use super::intake;
use super::lots::{self, LotDiscrepancy};
use super::pricing::{PriceOracle, StaticPriceList};
use super::release;
use super::storage::{LedgerStorage, StorageError, StorageStats};
use super::unpacking;
use shared::models::{
    AllocationOutcome, AllocationRequest, IntakeRequest, Lot, LotKey, Order, OrderPacketDetail,
    OrderStatus, Packet, ProvenanceRecord, ReleaseOutcome, ReleaseRequest, UnpackOutcome,
    UnpackRequest,
};
use shared::util::HOUR_MILLIS;
use shared::{SizeClass, Tolerance};
use std::path::Path;
use std::sync::Arc;

/// Default customer cancel window
pub const DEFAULT_CANCEL_WINDOW_HOURS: i64 = 24;

/// Engine tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    pub tolerance: Tolerance,
    pub cancel_window_ms: i64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            cancel_window_ms: DEFAULT_CANCEL_WINDOW_HOURS * HOUR_MILLIS,
        }
    }
}

/// Inventory ledger facade
///
/// Cheap to share across threads behind an `Arc`; every mutating call is
/// serialized by the store's single write transaction.
pub struct InventoryManager {
    storage: LedgerStorage,
    settings: LedgerSettings,
    clock: Arc<dyn Clock>,
    prices: Arc<dyn PriceOracle>,
    /// Instance id generated on startup, tagged on operation logs
    epoch: String,
}

impl std::fmt::Debug for InventoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryManager")
            .field("storage", &"<LedgerStorage>")
            .field("settings", &self.settings)
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl InventoryManager {
    /// Open the ledger file at `db_path`
    pub fn new(db_path: impl AsRef<Path>, settings: LedgerSettings) -> LedgerResult<Self> {
        let storage = LedgerStorage::open(db_path)?;
        Ok(Self::with_storage(storage, settings))
    }

    /// Create a manager over existing storage, system clock, no prices
    pub fn with_storage(storage: LedgerStorage, settings: LedgerSettings) -> Self {
        let epoch = uuid::Uuid::new_v4().to_string();
        tracing::info!(epoch = %epoch, epsilon = %settings.tolerance.epsilon(), "InventoryManager started");
        Self {
            storage,
            settings,
            clock: Arc::new(SystemClock),
            prices: Arc::new(StaticPriceList::new()),
            epoch,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_prices(mut self, prices: Arc<dyn PriceOracle>) -> Self {
        self.prices = prices;
        self
    }

    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    pub fn settings(&self) -> LedgerSettings {
        self.settings
    }

    pub fn storage(&self) -> &LedgerStorage {
        &self.storage
    }

    /// Run `f` in one write transaction; commit on success, abort on error
    fn run_in_txn<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&LedgerContext<'_>) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let txn = self.storage.begin_write()?;
        let result = {
            let ctx = LedgerContext::new(
                &self.storage,
                &txn,
                self.settings.tolerance,
                self.clock.now_millis(),
            );
            f(&ctx)
        };

        match result {
            Ok(value) => {
                txn.commit().map_err(StorageError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = txn.abort() {
                    tracing::error!(operation, error = %abort_err, "Failed to abort transaction");
                }
                match err {
                    LedgerError::Consistency(_) | LedgerError::Storage(_) => {
                        tracing::error!(operation, epoch = %self.epoch, error = %err, "Operation rolled back")
                    }
                    _ => tracing::warn!(operation, error = %err, "Operation rejected"),
                }
                Err(err)
            }
        }
    }

    fn rejected<T>(operation: &'static str, err: LedgerError) -> LedgerResult<T> {
        tracing::warn!(operation, error = %err, "Request rejected before transaction");
        Err(err)
    }

    // ========== Mutations ==========

    /// Receive new stock at a purchase location
    pub fn receive_packets(&self, request: &IntakeRequest) -> LedgerResult<Vec<Packet>> {
        if let Err(err) = intake::validate(request) {
            return Self::rejected("intake", err);
        }
        let created = self.run_in_txn("intake", |ctx| intake::execute(ctx, request))?;
        tracing::info!(
            location_id = request.location_id,
            packet_count = created.len(),
            "Packets received"
        );
        Ok(created)
    }

    /// Split source packets into the requested targets
    pub fn unpack(&self, request: &UnpackRequest) -> LedgerResult<UnpackOutcome> {
        if let Err(err) = unpacking::validate(request) {
            return Self::rejected("unpack", err);
        }
        let outcome = self.run_in_txn("unpack", |ctx| unpacking::execute(ctx, request))?;
        tracing::info!(
            sources = ?request.source_packet_ids,
            created = outcome.created.len(),
            unpacked = ?outcome.unpacked_sources,
            "Unpack committed"
        );
        Ok(outcome)
    }

    /// Select and reserve packets for a new order
    pub fn allocate(&self, request: &AllocationRequest) -> LedgerResult<AllocationOutcome> {
        if let Err(err) = allocation::validate(request) {
            return Self::rejected("allocate", err);
        }
        let outcome = self.run_in_txn("allocate", |ctx| {
            allocation::execute(ctx, request, self.prices.as_ref())
        })?;
        tracing::info!(
            order_id = outcome.order.id,
            customer_id = request.customer_id,
            packet_count = outcome.details.len(),
            total_weight = %outcome.order.total_weight,
            "Order allocated"
        );
        Ok(outcome)
    }

    /// Cancel, reject or revert an order and return its packets
    pub fn release(&self, request: &ReleaseRequest) -> LedgerResult<ReleaseOutcome> {
        if let Err(err) = release::validate(request) {
            return Self::rejected("release", err);
        }
        let window = self.settings.cancel_window_ms;
        let outcome = self.run_in_txn("release", |ctx| release::execute(ctx, request, window))?;
        tracing::info!(
            order_id = request.order_id,
            kind = ?request.kind,
            released = outcome.released_packet_ids.len(),
            "Order released"
        );
        Ok(outcome)
    }

    /// Move an order forward along its lifecycle
    pub fn advance_order(&self, order_id: i64, to: OrderStatus) -> LedgerResult<Order> {
        let order = self.run_in_txn("advance_order", |ctx| release::advance(ctx, order_id, to))?;
        tracing::info!(order_id, status = ?order.status, "Order advanced");
        Ok(order)
    }

    /// Soft-delete an empty lot
    pub fn retire_lot(&self, lot_id: i64) -> LedgerResult<Lot> {
        let lot = self.run_in_txn("retire_lot", |ctx| lots::retire_lot(ctx, lot_id))?;
        tracing::info!(lot_id, "Lot retired");
        Ok(lot)
    }

    // ========== Queries (no locks) ==========

    pub fn get_packet(&self, packet_id: i64) -> LedgerResult<Packet> {
        self.storage
            .get_packet(packet_id)?
            .ok_or(LedgerError::PacketNotFound(packet_id))
    }

    /// Lot row by id; retired rows stay readable
    pub fn get_lot(&self, lot_id: i64) -> LedgerResult<Lot> {
        self.storage
            .get_lot(lot_id)?
            .ok_or(LedgerError::LotNotFound(lot_id))
    }

    pub fn find_lot(&self, key: &LotKey) -> LedgerResult<Option<Lot>> {
        Ok(self.storage.find_lot(key)?)
    }

    /// Browse list in allocation order; may include packets a concurrent
    /// order is reserving right now
    pub fn available_packets(
        &self,
        lot_id: i64,
        size: Option<SizeClass>,
    ) -> LedgerResult<Vec<Packet>> {
        let tol = self.settings.tolerance;
        let members = self.storage.packets_in_lot(lot_id)?;
        match size {
            Some(size) => Ok(allocation::rank_candidates(
                members,
                size,
                tol,
                &Default::default(),
            )),
            None => {
                let mut packets: Vec<Packet> = members
                    .into_iter()
                    .filter(|p| {
                        SizeClass::ALL
                            .into_iter()
                            .any(|class| p.is_sale_candidate(class, tol))
                    })
                    .collect();
                packets.sort_by_key(Packet::selection_key);
                Ok(packets)
            }
        }
    }

    pub fn provenance_for(&self, packet_id: i64) -> LedgerResult<Vec<ProvenanceRecord>> {
        Ok(self.storage.provenance_for(packet_id)?)
    }

    pub fn get_order(&self, order_id: i64) -> LedgerResult<Order> {
        self.storage
            .get_order(order_id)?
            .ok_or(LedgerError::OrderNotFound(order_id))
    }

    pub fn order_details(&self, order_id: i64) -> LedgerResult<Vec<OrderPacketDetail>> {
        Ok(self.storage.order_details(order_id)?)
    }

    pub fn stats(&self) -> LedgerResult<StorageStats> {
        Ok(self.storage.get_stats()?)
    }

    /// Report every broken lot invariant
    pub fn verify_lot_mirrors(&self) -> LedgerResult<Vec<LotDiscrepancy>> {
        let lots = self.storage.all_lots()?;
        let discrepancies = lots::verify_lot_mirrors(&lots, self.settings.tolerance);
        if !discrepancies.is_empty() {
            tracing::error!(count = discrepancies.len(), "Lot invariant discrepancies found");
        }
        Ok(discrepancies)
    }
}

#[cfg(test)]
mod tests;
