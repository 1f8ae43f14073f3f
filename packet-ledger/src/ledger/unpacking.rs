//! Unpacking Engine
//!
//! Redistributes the remaining carats of a set of source packets into new
//! target packets, preserving total weight and per-book provenance.
//!
//! # Flow
//!
//! ```text
//! unpack(request)
//!     ├─ 1. Validate request (before any transaction)
//!     ├─ 2. Load sources in ascending id, check state and location
//!     ├─ 3. Plan: FIFO draws per target from the on-book / off-book queues
//!     ├─ 4. Per target: resolve grade and lot pair, create packet + provenance
//!     └─ 5. Per source: consume drawn carats, mark drained sources unpacked
//! ```

use super::context::LedgerContext;
use super::error::{LedgerError, LedgerResult};
use super::fifo::{Book, BookQueue, Draw};
use super::grades;
use super::lots;
use super::packets::{self, NewPacket};
use super::storage::Sequence;
use rust_decimal::Decimal;
use shared::Tolerance;
use shared::models::{
    Packet, PacketBookFlag, ProvenanceRecord, UnpackOutcome, UnpackRequest,
};
use std::collections::{BTreeMap, HashSet};

/// Source state the planner needs
#[derive(Debug, Clone)]
pub struct SourceView {
    pub packet_id: i64,
    pub lot_id: i64,
    pub on_book: Decimal,
    pub off_book: Decimal,
}

impl SourceView {
    pub fn weight(&self) -> Decimal {
        self.on_book + self.off_book
    }
}

impl From<&Packet> for SourceView {
    fn from(packet: &Packet) -> Self {
        Self {
            packet_id: packet.id,
            lot_id: packet.lot_id,
            on_book: packet.remaining_on_book,
            off_book: packet.remaining_off_book,
        }
    }
}

/// On/off carats one target draws from one source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceShare {
    pub source_lot_id: i64,
    pub on_book: Decimal,
    pub off_book: Decimal,
}

#[derive(Debug, Clone)]
pub struct TargetPlan {
    pub declared_weight: Decimal,
    pub on_book: Decimal,
    pub off_book: Decimal,
    pub book_flag: PacketBookFlag,
    /// Keyed by source packet id, ascending
    pub shares: BTreeMap<i64, SourceShare>,
}

impl TargetPlan {
    pub fn weight(&self) -> Decimal {
        self.on_book + self.off_book
    }
}

#[derive(Debug, Clone)]
pub struct UnpackPlan {
    pub targets: Vec<TargetPlan>,
    /// Total carats consumed per source packet id
    pub consumed: BTreeMap<i64, (Decimal, Decimal)>,
    /// Sources whose remaining weight is within tolerance of zero
    pub drained: HashSet<i64>,
}

/// Request checks that need no stored state
pub fn validate(request: &UnpackRequest) -> LedgerResult<()> {
    if request.source_packet_ids.is_empty() {
        return Err(LedgerError::validation("no source packets given"));
    }
    if request.targets.is_empty() {
        return Err(LedgerError::validation("no target packets requested"));
    }

    let mut seen = HashSet::new();
    for id in &request.source_packet_ids {
        if !seen.insert(*id) {
            return Err(LedgerError::validation(format!(
                "source packet {} listed twice",
                id
            )));
        }
    }

    for (index, target) in request.targets.iter().enumerate() {
        if target.weight <= Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "target {} weight must be positive, got {}",
                index, target.weight
            )));
        }
    }
    Ok(())
}

/// Compute FIFO draws for `targets` against `sources`
///
/// `sources` must be in ascending packet id order.
pub fn plan_unpack(
    sources: &[SourceView],
    targets: &[Decimal],
    tolerance: Tolerance,
) -> LedgerResult<UnpackPlan> {
    let mut on_queue = BookQueue::new(Book::OnBook, tolerance);
    let mut off_queue = BookQueue::new(Book::OffBook, tolerance);
    for source in sources {
        on_queue.push(source.packet_id, source.lot_id, source.on_book);
        off_queue.push(source.packet_id, source.lot_id, source.off_book);
    }

    let requested: Decimal = targets.iter().copied().sum();
    let available = on_queue.available() + off_queue.available();
    if !tolerance.covers(available, requested) {
        return Err(LedgerError::InsufficientWeight {
            requested,
            available,
        });
    }

    let mut plans = Vec::with_capacity(targets.len());
    let mut consumed: BTreeMap<i64, (Decimal, Decimal)> = BTreeMap::new();

    for (index, &weight) in targets.iter().enumerate() {
        let (draws, book_flag) = if on_queue.covers(weight) {
            (on_queue.drain(weight)?, PacketBookFlag::OnBook)
        } else if off_queue.covers(weight) {
            (off_queue.drain(weight)?, PacketBookFlag::OffBook)
        } else {
            let mut draws = on_queue.drain_all()?;
            let drawn_on: Decimal = draws.iter().map(|d| d.amount).sum();
            draws.extend(off_queue.drain(weight - drawn_on)?);
            (draws, PacketBookFlag::Mix)
        };

        let plan = build_target(weight, book_flag, &draws);
        if !tolerance.approx_eq(plan.weight(), weight) {
            return Err(LedgerError::consistency(format!(
                "target {} split {} + {} does not sum to declared weight {}",
                index, plan.on_book, plan.off_book, weight
            )));
        }

        for (source_id, share) in &plan.shares {
            let entry = consumed.entry(*source_id).or_default();
            entry.0 += share.on_book;
            entry.1 += share.off_book;
        }
        plans.push(plan);
    }

    let drained = sources
        .iter()
        .filter(|s| {
            let (on, off) = consumed.get(&s.packet_id).copied().unwrap_or_default();
            tolerance.is_zero(s.weight() - on - off)
        })
        .map(|s| s.packet_id)
        .collect();

    Ok(UnpackPlan {
        targets: plans,
        consumed,
        drained,
    })
}

fn build_target(weight: Decimal, book_flag: PacketBookFlag, draws: &[Draw]) -> TargetPlan {
    let mut plan = TargetPlan {
        declared_weight: weight,
        on_book: Decimal::ZERO,
        off_book: Decimal::ZERO,
        book_flag,
        shares: BTreeMap::new(),
    };

    for draw in draws {
        let share = plan
            .shares
            .entry(draw.source_packet_id)
            .or_insert_with(|| SourceShare {
                source_lot_id: draw.source_lot_id,
                ..SourceShare::default()
            });
        match draw.book {
            Book::OnBook => {
                share.on_book += draw.amount;
                plan.on_book += draw.amount;
            }
            Book::OffBook => {
                share.off_book += draw.amount;
                plan.off_book += draw.amount;
            }
        }
    }
    plan
}

/// Load and check the sources, ascending id
fn load_sources(ctx: &LedgerContext<'_>, ids: &[i64]) -> LedgerResult<Vec<Packet>> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();

    let mut sources: Vec<Packet> = Vec::with_capacity(ids.len());
    for id in ids {
        let packet = packets::load_packet(ctx, id)?;
        if packet.is_unpacked {
            return Err(LedgerError::SourceAlreadyUnpacked(id));
        }
        if !packet.is_selectable_source() {
            return Err(LedgerError::SourceReserved {
                packet_id: id,
                status: packet.current_status,
            });
        }
        if let Some(first) = sources.first()
            && first.location_id != packet.location_id
        {
            return Err(LedgerError::LocationMismatch {
                packet_id: id,
                expected: first.location_id,
                found: packet.location_id,
            });
        }
        sources.push(packet);
    }
    Ok(sources)
}

/// Run an unpack inside `ctx`; the caller validated the request
pub fn execute(ctx: &LedgerContext<'_>, request: &UnpackRequest) -> LedgerResult<UnpackOutcome> {
    // 1. Sources (locked through the write transaction)
    let mut sources = load_sources(ctx, &request.source_packet_ids)?;
    let location_id = sources
        .first()
        .map(|p| p.location_id)
        .ok_or_else(|| LedgerError::validation("no source packets given"))?;

    // 2. Plan
    let views: Vec<SourceView> = sources.iter().map(SourceView::from).collect();
    let weights: Vec<Decimal> = request.targets.iter().map(|t| t.weight).collect();
    let plan = plan_unpack(&views, &weights, ctx.tolerance)?;

    // 3. Targets
    let mut created = Vec::with_capacity(plan.targets.len());
    let mut provenance = Vec::new();
    for (target, target_plan) in request.targets.iter().zip(&plan.targets) {
        let grade = grades::resolve_grade(ctx, &target.grade)?;
        let lot_pair = lots::resolve_lot_pair(
            ctx,
            location_id,
            grade.id,
            target.sieve_size_id,
            target_plan.book_flag.lot_flag(),
        )?;

        let packet = packets::create_packet(
            ctx,
            NewPacket {
                grade_id: grade.id,
                location_id,
                sieve_size_id: target.sieve_size_id,
                on_book_weight: target_plan.on_book,
                off_book_weight: target_plan.off_book,
                book_flag: target_plan.book_flag,
                actor_id: request.actor_id,
            },
            &lot_pair,
        )?;

        for (source_id, share) in &target_plan.shares {
            let record = ProvenanceRecord {
                id: ctx.next_id(Sequence::Provenance)?,
                packet_id: packet.id,
                source_packet_id: *source_id,
                source_lot_id: share.source_lot_id,
                on_book_weight: share.on_book,
                off_book_weight: share.off_book,
                created_at: ctx.now,
            };
            ctx.storage.insert_provenance(ctx.txn, &record)?;
            provenance.push(record);
        }

        tracing::debug!(
            packet_id = packet.id,
            weight = %packet.weight,
            book_flag = ?packet.book_flag,
            sources = target_plan.shares.len(),
            "Unpack target created"
        );
        created.push(packet);
    }

    // 4. Sources
    let mut unpacked_sources = Vec::new();
    let mut residual_sources = Vec::new();
    for source in &mut sources {
        let consumed = plan.consumed.get(&source.id).copied();
        if consumed.is_none() && !plan.drained.contains(&source.id) {
            // Untouched sources pass through as stored
            residual_sources.push(source.id);
            continue;
        }
        let (on_book, off_book) = consumed.unwrap_or_default();

        let drained = packets::consume(ctx, source, on_book, off_book)?;
        if drained != plan.drained.contains(&source.id) {
            return Err(LedgerError::consistency(format!(
                "source packet {} drained state disagrees with its queues",
                source.id
            )));
        }
        if drained {
            unpacked_sources.push(source.id);
        } else {
            residual_sources.push(source.id);
        }
    }

    Ok(UnpackOutcome {
        created,
        provenance,
        unpacked_sources,
        residual_sources,
    })
}
