//! redb-based Ledger Store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `grades` | `grade_id` | `Grade` | Grade rows |
//! | `grade_index` | `(shape, color, clarity)` | `grade_id` | Unique triple lookup |
//! | `lots` | `lot_id` | `Lot` | Lot counters (soft-deleted rows kept) |
//! | `lot_index` | `(location, grade, sieve, flag)` | `lot_id` | Live lot per four-part key |
//! | `packets` | `packet_id` | `Packet` | Packet ledger |
//! | `lot_packets` | `(lot_id, packet_id)` | `()` | Membership, book and total lot |
//! | `provenance` | `record_id` | `ProvenanceRecord` | Unpacking audit trail |
//! | `packet_provenance` | `(packet_id, record_id)` | `()` | Records per new packet |
//! | `orders` | `order_id` | `Order` | Order headers |
//! | `order_details` | `detail_id` | `OrderPacketDetail` | Allocation snapshots |
//! | `order_detail_index` | `(order_id, detail_id)` | `()` | Details per order |
//! | `sequence_counter` | kind | `i64` | Per-kind id sequences |
//!
//! # Locking
//!
//! redb admits one write transaction at a time and `begin_write` blocks until
//! the current holder commits or aborts. Every row an operation reads through
//! its write transaction is therefore locked until commit. Read transactions
//! are MVCC snapshots of committed state and never block.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, Table, TableDefinition,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::models::{
    Grade, GradeKey, Lot, LotKey, Order, OrderPacketDetail, Packet, ProvenanceRecord,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

type Row = &'static [u8];

/// grade_id → JSON Grade
const GRADES_TABLE: TableDefinition<i64, Row> = TableDefinition::new("grades");

/// (shape_id, color_id, clarity_id) → grade_id
const GRADE_INDEX_TABLE: TableDefinition<(i64, i64, i64), i64> =
    TableDefinition::new("grade_index");

/// lot_id → JSON Lot
const LOTS_TABLE: TableDefinition<i64, Row> = TableDefinition::new("lots");

/// (location_id, grade_id, sieve_size_id, book flag tag) → lot_id, live lots only
const LOT_INDEX_TABLE: TableDefinition<(i64, i64, i64, u8), i64> =
    TableDefinition::new("lot_index");

/// packet_id → JSON Packet
const PACKETS_TABLE: TableDefinition<i64, Row> = TableDefinition::new("packets");

/// (lot_id, packet_id) → (), indexed under both the book lot and the total lot
const LOT_PACKETS_TABLE: TableDefinition<(i64, i64), ()> = TableDefinition::new("lot_packets");

/// record_id → JSON ProvenanceRecord
const PROVENANCE_TABLE: TableDefinition<i64, Row> = TableDefinition::new("provenance");

/// (packet_id, record_id) → ()
const PACKET_PROVENANCE_TABLE: TableDefinition<(i64, i64), ()> =
    TableDefinition::new("packet_provenance");

/// order_id → JSON Order
const ORDERS_TABLE: TableDefinition<i64, Row> = TableDefinition::new("orders");

/// detail_id → JSON OrderPacketDetail
const ORDER_DETAILS_TABLE: TableDefinition<i64, Row> = TableDefinition::new("order_details");

/// (order_id, detail_id) → ()
const ORDER_DETAIL_INDEX_TABLE: TableDefinition<(i64, i64), ()> =
    TableDefinition::new("order_detail_index");

/// kind → last issued id
const SEQUENCE_TABLE: TableDefinition<&str, i64> = TableDefinition::new("sequence_counter");

/// Id sequence kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    Grade,
    Lot,
    Packet,
    Provenance,
    Order,
    OrderDetail,
}

impl Sequence {
    const ALL: [Sequence; 6] = [
        Sequence::Grade,
        Sequence::Lot,
        Sequence::Packet,
        Sequence::Provenance,
        Sequence::Order,
        Sequence::OrderDetail,
    ];

    fn key(self) -> &'static str {
        match self {
            Sequence::Grade => "grade",
            Sequence::Lot => "lot",
            Sequence::Packet => "packet",
            Sequence::Provenance => "provenance",
            Sequence::Order => "order",
            Sequence::OrderDetail => "order_detail",
        }
    }
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

// ========== Row helpers ==========

fn read_row<T, Tbl>(table: &Tbl, id: i64) -> StorageResult<Option<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<i64, Row>,
{
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn write_row<T: Serialize>(table: &mut Table<'_, i64, Row>, id: i64, row: &T) -> StorageResult<()> {
    let value = serde_json::to_vec(row)?;
    table.insert(id, value.as_slice())?;
    Ok(())
}

fn read_all<T, Tbl>(table: &Tbl) -> StorageResult<Vec<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<i64, Row>,
{
    let mut rows = Vec::new();
    for result in table.iter()? {
        let (_key, value) = result?;
        rows.push(serde_json::from_slice(value.value())?);
    }
    Ok(rows)
}

/// Second key component of every `(owner, id)` entry, ascending
fn member_ids<Tbl>(table: &Tbl, owner: i64) -> StorageResult<Vec<i64>>
where
    Tbl: ReadableTable<(i64, i64), ()>,
{
    let mut ids = Vec::new();
    for result in table.range((owner, i64::MIN)..=(owner, i64::MAX))? {
        let (key, _value) = result?;
        ids.push(key.value().1);
    }
    Ok(ids)
}

fn rows_by_ids<T, Tbl>(table: &Tbl, ids: &[i64]) -> StorageResult<Vec<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<i64, Row>,
{
    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(row) = read_row(table, *id)? {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn lot_index_key(key: &LotKey) -> (i64, i64, i64, u8) {
    (
        key.location_id,
        key.grade_id,
        key.sieve_size_id,
        key.book_flag.tag(),
    )
}

/// Ledger storage backed by redb
#[derive(Clone)]
pub struct LedgerStorage {
    db: Arc<Database>,
}

impl LedgerStorage {
    /// Open or create the ledger file at the given path
    ///
    /// Commits are durable as soon as `commit()` returns.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            // Read transactions cannot open missing tables
            let _ = write_txn.open_table(GRADES_TABLE)?;
            let _ = write_txn.open_table(GRADE_INDEX_TABLE)?;
            let _ = write_txn.open_table(LOTS_TABLE)?;
            let _ = write_txn.open_table(LOT_INDEX_TABLE)?;
            let _ = write_txn.open_table(PACKETS_TABLE)?;
            let _ = write_txn.open_table(LOT_PACKETS_TABLE)?;
            let _ = write_txn.open_table(PROVENANCE_TABLE)?;
            let _ = write_txn.open_table(PACKET_PROVENANCE_TABLE)?;
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(ORDER_DETAILS_TABLE)?;
            let _ = write_txn.open_table(ORDER_DETAIL_INDEX_TABLE)?;

            let mut seq_table = write_txn.open_table(SEQUENCE_TABLE)?;
            for seq in Sequence::ALL {
                if seq_table.get(seq.key())?.is_none() {
                    seq_table.insert(seq.key(), 0i64)?;
                }
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction (blocks while another writer is active)
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Sequences ==========

    /// Increment and return the next id of `seq`
    pub fn next_id(&self, txn: &WriteTransaction, seq: Sequence) -> StorageResult<i64> {
        let mut table = txn.open_table(SEQUENCE_TABLE)?;
        let current = table
            .get(seq.key())?
            .map(|guard| guard.value())
            .unwrap_or(0);
        let next = current + 1;
        table.insert(seq.key(), next)?;
        Ok(next)
    }

    /// Last issued id of `seq` (read-only)
    pub fn current_id(&self, seq: Sequence) -> StorageResult<i64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SEQUENCE_TABLE)?;
        Ok(table
            .get(seq.key())?
            .map(|guard| guard.value())
            .unwrap_or(0))
    }

    // ========== Grades ==========

    pub fn find_grade_txn(
        &self,
        txn: &WriteTransaction,
        key: &GradeKey,
    ) -> StorageResult<Option<Grade>> {
        let index = txn.open_table(GRADE_INDEX_TABLE)?;
        let id = index
            .get((key.shape_id, key.color_id, key.clarity_id))?
            .map(|guard| guard.value());
        match id {
            Some(id) => read_row(&txn.open_table(GRADES_TABLE)?, id),
            None => Ok(None),
        }
    }

    /// Store a new grade and its unique triple index entry
    pub fn insert_grade(&self, txn: &WriteTransaction, grade: &Grade) -> StorageResult<()> {
        write_row(&mut txn.open_table(GRADES_TABLE)?, grade.id, grade)?;
        let mut index = txn.open_table(GRADE_INDEX_TABLE)?;
        index.insert((grade.shape_id, grade.color_id, grade.clarity_id), grade.id)?;
        Ok(())
    }

    pub fn get_grade_txn(&self, txn: &WriteTransaction, id: i64) -> StorageResult<Option<Grade>> {
        read_row(&txn.open_table(GRADES_TABLE)?, id)
    }

    pub fn get_grade(&self, id: i64) -> StorageResult<Option<Grade>> {
        let read_txn = self.db.begin_read()?;
        read_row(&read_txn.open_table(GRADES_TABLE)?, id)
    }

    // ========== Lots ==========

    /// Live lot id for a four-part key (within transaction)
    pub fn find_lot_id_txn(&self, txn: &WriteTransaction, key: &LotKey) -> StorageResult<Option<i64>> {
        let index = txn.open_table(LOT_INDEX_TABLE)?;
        Ok(index.get(lot_index_key(key))?.map(|guard| guard.value()))
    }

    pub fn get_lot_txn(&self, txn: &WriteTransaction, id: i64) -> StorageResult<Option<Lot>> {
        read_row(&txn.open_table(LOTS_TABLE)?, id)
    }

    pub fn store_lot(&self, txn: &WriteTransaction, lot: &Lot) -> StorageResult<()> {
        write_row(&mut txn.open_table(LOTS_TABLE)?, lot.id, lot)
    }

    pub fn index_lot(&self, txn: &WriteTransaction, lot: &Lot) -> StorageResult<()> {
        let mut index = txn.open_table(LOT_INDEX_TABLE)?;
        index.insert(lot_index_key(&lot.key()), lot.id)?;
        Ok(())
    }

    pub fn unindex_lot(&self, txn: &WriteTransaction, key: &LotKey) -> StorageResult<()> {
        let mut index = txn.open_table(LOT_INDEX_TABLE)?;
        index.remove(lot_index_key(key))?;
        Ok(())
    }

    pub fn get_lot(&self, id: i64) -> StorageResult<Option<Lot>> {
        let read_txn = self.db.begin_read()?;
        read_row(&read_txn.open_table(LOTS_TABLE)?, id)
    }

    /// Live lot for a four-part key (read-only)
    pub fn find_lot(&self, key: &LotKey) -> StorageResult<Option<Lot>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(LOT_INDEX_TABLE)?;
        let id = index.get(lot_index_key(key))?.map(|guard| guard.value());
        match id {
            Some(id) => read_row(&read_txn.open_table(LOTS_TABLE)?, id),
            None => Ok(None),
        }
    }

    /// Every lot row, retired ones included
    pub fn all_lots(&self) -> StorageResult<Vec<Lot>> {
        let read_txn = self.db.begin_read()?;
        read_all(&read_txn.open_table(LOTS_TABLE)?)
    }

    // ========== Packets ==========

    pub fn get_packet_txn(&self, txn: &WriteTransaction, id: i64) -> StorageResult<Option<Packet>> {
        read_row(&txn.open_table(PACKETS_TABLE)?, id)
    }

    pub fn store_packet(&self, txn: &WriteTransaction, packet: &Packet) -> StorageResult<()> {
        write_row(&mut txn.open_table(PACKETS_TABLE)?, packet.id, packet)
    }

    /// Index a new packet under its book lot and its total lot
    pub fn index_packet(&self, txn: &WriteTransaction, packet: &Packet) -> StorageResult<()> {
        let mut table = txn.open_table(LOT_PACKETS_TABLE)?;
        table.insert((packet.lot_id, packet.id), ())?;
        table.insert((packet.total_lot_id, packet.id), ())?;
        Ok(())
    }

    /// Move a packet's book-lot membership; the total lot membership stays
    pub fn refile_packet(
        &self,
        txn: &WriteTransaction,
        packet_id: i64,
        from_lot_id: i64,
        to_lot_id: i64,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(LOT_PACKETS_TABLE)?;
        table.remove((from_lot_id, packet_id))?;
        table.insert((to_lot_id, packet_id), ())?;
        Ok(())
    }

    /// Packets filed under a lot, ascending id (within transaction)
    pub fn packets_in_lot_txn(&self, txn: &WriteTransaction, lot_id: i64) -> StorageResult<Vec<Packet>> {
        let ids = member_ids(&txn.open_table(LOT_PACKETS_TABLE)?, lot_id)?;
        rows_by_ids(&txn.open_table(PACKETS_TABLE)?, &ids)
    }

    pub fn get_packet(&self, id: i64) -> StorageResult<Option<Packet>> {
        let read_txn = self.db.begin_read()?;
        read_row(&read_txn.open_table(PACKETS_TABLE)?, id)
    }

    /// Packets filed under a lot, ascending id (read-only)
    pub fn packets_in_lot(&self, lot_id: i64) -> StorageResult<Vec<Packet>> {
        let read_txn = self.db.begin_read()?;
        let ids = member_ids(&read_txn.open_table(LOT_PACKETS_TABLE)?, lot_id)?;
        rows_by_ids(&read_txn.open_table(PACKETS_TABLE)?, &ids)
    }

    // ========== Provenance ==========

    pub fn insert_provenance(
        &self,
        txn: &WriteTransaction,
        record: &ProvenanceRecord,
    ) -> StorageResult<()> {
        write_row(&mut txn.open_table(PROVENANCE_TABLE)?, record.id, record)?;
        let mut index = txn.open_table(PACKET_PROVENANCE_TABLE)?;
        index.insert((record.packet_id, record.id), ())?;
        Ok(())
    }

    /// Provenance records of a packet created by unpacking
    pub fn provenance_for(&self, packet_id: i64) -> StorageResult<Vec<ProvenanceRecord>> {
        let read_txn = self.db.begin_read()?;
        let ids = member_ids(&read_txn.open_table(PACKET_PROVENANCE_TABLE)?, packet_id)?;
        rows_by_ids(&read_txn.open_table(PROVENANCE_TABLE)?, &ids)
    }

    // ========== Orders ==========

    pub fn get_order_txn(&self, txn: &WriteTransaction, id: i64) -> StorageResult<Option<Order>> {
        read_row(&txn.open_table(ORDERS_TABLE)?, id)
    }

    pub fn store_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        write_row(&mut txn.open_table(ORDERS_TABLE)?, order.id, order)
    }

    pub fn get_order(&self, id: i64) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        read_row(&read_txn.open_table(ORDERS_TABLE)?, id)
    }

    /// Store a detail row, indexing it under its order
    pub fn store_order_detail(
        &self,
        txn: &WriteTransaction,
        detail: &OrderPacketDetail,
    ) -> StorageResult<()> {
        write_row(&mut txn.open_table(ORDER_DETAILS_TABLE)?, detail.id, detail)?;
        let mut index = txn.open_table(ORDER_DETAIL_INDEX_TABLE)?;
        index.insert((detail.order_id, detail.id), ())?;
        Ok(())
    }

    pub fn order_details_txn(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
    ) -> StorageResult<Vec<OrderPacketDetail>> {
        let ids = member_ids(&txn.open_table(ORDER_DETAIL_INDEX_TABLE)?, order_id)?;
        rows_by_ids(&txn.open_table(ORDER_DETAILS_TABLE)?, &ids)
    }

    pub fn order_details(&self, order_id: i64) -> StorageResult<Vec<OrderPacketDetail>> {
        let read_txn = self.db.begin_read()?;
        let ids = member_ids(&read_txn.open_table(ORDER_DETAIL_INDEX_TABLE)?, order_id)?;
        rows_by_ids(&read_txn.open_table(ORDER_DETAILS_TABLE)?, &ids)
    }

    // ========== Statistics ==========

    /// Get storage statistics
    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        let read_txn = self.db.begin_read()?;

        let grades_table = read_txn.open_table(GRADES_TABLE)?;
        let lots_table = read_txn.open_table(LOTS_TABLE)?;
        let live_lots_table = read_txn.open_table(LOT_INDEX_TABLE)?;
        let packets_table = read_txn.open_table(PACKETS_TABLE)?;
        let provenance_table = read_txn.open_table(PROVENANCE_TABLE)?;
        let orders_table = read_txn.open_table(ORDERS_TABLE)?;
        let details_table = read_txn.open_table(ORDER_DETAILS_TABLE)?;

        Ok(StorageStats {
            grade_count: grades_table.len()?,
            lot_count: lots_table.len()?,
            live_lot_count: live_lots_table.len()?,
            packet_count: packets_table.len()?,
            provenance_count: provenance_table.len()?,
            order_count: orders_table.len()?,
            order_detail_count: details_table.len()?,
        })
    }
}

/// Storage statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    pub grade_count: u64,
    pub lot_count: u64,
    pub live_lot_count: u64,
    pub packet_count: u64,
    pub provenance_count: u64,
    pub order_count: u64,
    pub order_detail_count: u64,
}
