//! FIFO book queues used by unpacking
//!
//! One queue per book (on-book, off-book). Entries are ordered by source
//! packet id and consumed oldest first. Queues live inside one operation and
//! are never shared.

use super::error::{LedgerError, LedgerResult};
use rust_decimal::Decimal;
use shared::Tolerance;
use std::collections::VecDeque;

/// Which ledger a queue (or a draw) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Book {
    OnBook,
    OffBook,
}

/// Remaining weight of one source in one book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub source_packet_id: i64,
    pub source_lot_id: i64,
    pub remaining: Decimal,
}

/// Carats taken from one queue entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draw {
    pub source_packet_id: i64,
    pub source_lot_id: i64,
    pub book: Book,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct BookQueue {
    book: Book,
    entries: VecDeque<QueueEntry>,
    tolerance: Tolerance,
}

impl BookQueue {
    pub fn new(book: Book, tolerance: Tolerance) -> Self {
        Self {
            book,
            entries: VecDeque::new(),
            tolerance,
        }
    }

    /// Append an entry; callers push in ascending source id. Dust is skipped.
    pub fn push(&mut self, source_packet_id: i64, source_lot_id: i64, remaining: Decimal) {
        if remaining > self.tolerance.epsilon() {
            self.entries.push_back(QueueEntry {
                source_packet_id,
                source_lot_id,
                remaining,
            });
        }
    }

    pub fn available(&self) -> Decimal {
        self.entries.iter().map(|e| e.remaining).sum()
    }

    pub fn covers(&self, amount: Decimal) -> bool {
        self.tolerance.covers(self.available(), amount)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    /// Consume up to `amount`, oldest entry first
    ///
    /// An entry whose leftover would be within tolerance is drained whole so
    /// no dust is stranded. Stops when the amount is met or the queue is empty.
    pub fn drain(&mut self, amount: Decimal) -> LedgerResult<Vec<Draw>> {
        let eps = self.tolerance.epsilon();
        let mut needed = amount;
        let mut draws = Vec::new();

        while needed > eps {
            let Some(front) = self.entries.front_mut() else {
                break;
            };

            let take = if front.remaining <= needed + eps {
                front.remaining
            } else {
                needed
            };
            front.remaining -= take;
            needed -= take;

            if front.remaining < Decimal::ZERO {
                return Err(LedgerError::consistency(format!(
                    "negative queue remainder {} for source packet {}",
                    front.remaining, front.source_packet_id
                )));
            }

            draws.push(Draw {
                source_packet_id: front.source_packet_id,
                source_lot_id: front.source_lot_id,
                book: self.book,
                amount: take,
            });

            if front.remaining <= eps {
                self.entries.pop_front();
            }
        }

        Ok(draws)
    }

    /// Consume everything left
    pub fn drain_all(&mut self) -> LedgerResult<Vec<Draw>> {
        self.drain(self.available())
    }
}
