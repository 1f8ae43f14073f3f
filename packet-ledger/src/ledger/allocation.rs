//! Allocation Engine
//!
//! Selects concrete packets for an order's (lot, size) counts and reserves
//! them in one transaction. Selection re-reads candidates through the write
//! transaction, so a packet reserved by a concurrent order that committed
//! first is never seen as available.

use super::context::LedgerContext;
use super::error::{LedgerError, LedgerResult};
use super::grades;
use super::lots;
use super::packets;
use super::pricing::PriceOracle;
use super::storage::Sequence;
use rust_decimal::Decimal;
use shared::models::{
    AllocationOutcome, AllocationRequest, Order, OrderPacketDetail, OrderStatus, Packet,
    PacketStatus,
};
use shared::{SizeClass, Tolerance};
use std::collections::{BTreeMap, HashSet};

/// Request checks that need no stored state
pub fn validate(request: &AllocationRequest) -> LedgerResult<()> {
    if request.lines.is_empty() {
        return Err(LedgerError::validation("no size counts requested"));
    }
    for line in &request.lines {
        if line.quantity == 0 {
            return Err(LedgerError::validation(format!(
                "lot {} {} quantity must be positive",
                line.lot_id, line.size
            )));
        }
    }
    merge_lines(request)?;
    Ok(())
}

/// Merge duplicate lines; iteration order is ascending (lot id, size)
pub fn merge_lines(request: &AllocationRequest) -> LedgerResult<BTreeMap<(i64, SizeClass), u32>> {
    let mut merged: BTreeMap<(i64, SizeClass), u32> = BTreeMap::new();
    for line in &request.lines {
        let quantity = merged.entry((line.lot_id, line.size)).or_insert(0);
        *quantity = quantity.checked_add(line.quantity).ok_or_else(|| {
            LedgerError::validation(format!(
                "lot {} {} merged quantity exceeds {}",
                line.lot_id,
                line.size,
                u32::MAX
            ))
        })?;
    }
    Ok(merged)
}

/// Candidates for one (lot, size) pair in selection order
///
/// On-book first, then off-book, then mixed; oldest first within a flag.
pub fn rank_candidates(
    packets: Vec<Packet>,
    size: SizeClass,
    tolerance: Tolerance,
    exclude: &HashSet<i64>,
) -> Vec<Packet> {
    let mut candidates: Vec<Packet> = packets
        .into_iter()
        .filter(|p| p.is_sale_candidate(size, tolerance) && !exclude.contains(&p.id))
        .collect();
    candidates.sort_by_key(Packet::selection_key);
    candidates
}

/// Reserve packets for `request` inside `ctx`; the caller validated the request
pub fn execute(
    ctx: &LedgerContext<'_>,
    request: &AllocationRequest,
    prices: &dyn PriceOracle,
) -> LedgerResult<AllocationOutcome> {
    // 1. Select every pair before mutating anything
    let mut selected: Vec<(SizeClass, Packet)> = Vec::new();
    let mut taken: HashSet<i64> = HashSet::new();

    for ((lot_id, size), needed) in merge_lines(request)? {
        lots::load_lot(ctx, lot_id)?;
        let members = ctx.storage.packets_in_lot_txn(ctx.txn, lot_id)?;
        let candidates = rank_candidates(members, size, ctx.tolerance, &taken);

        if candidates.len() < needed as usize {
            return Err(LedgerError::InsufficientPackets {
                lot_id,
                size,
                needed,
                available: u32::try_from(candidates.len()).unwrap_or(u32::MAX),
            });
        }

        for packet in candidates.into_iter().take(needed as usize) {
            taken.insert(packet.id);
            selected.push((size, packet));
        }
        tracing::debug!(lot_id, size = %size, needed, "Allocation pair satisfied");
    }

    // 2. Order header
    let order_id = ctx.next_id(Sequence::Order)?;
    let mut order = Order {
        id: order_id,
        customer_id: request.customer_id,
        region_id: request.region_id,
        status: OrderStatus::Pending,
        total_weight: Decimal::ZERO,
        total_amount: Decimal::ZERO,
        packet_count: 0,
        reason: None,
        created_by: request.actor_id,
        released_by: None,
        released_at: None,
        created_at: ctx.now,
        updated_at: ctx.now,
    };

    // 3. Snapshot details, then flip the live packets
    let mut details = Vec::with_capacity(selected.len());
    for (size, mut packet) in selected {
        let grade = grades::load_grade(ctx, packet.grade_id)?;
        let price_per_carat = prices
            .price_for_grade(
                request.region_id,
                grade.shape_id,
                grade.color_id,
                grade.clarity_id,
                packet.sieve_size_id,
            )
            .unwrap_or(Decimal::ZERO);
        let amount = (price_per_carat * packet.remaining_weight).round_dp(2);

        let detail = OrderPacketDetail {
            id: ctx.next_id(Sequence::OrderDetail)?,
            order_id,
            packet_id: packet.id,
            qr_code: packet.qr_code.clone(),
            lot_id: packet.lot_id,
            total_lot_id: packet.total_lot_id,
            grade_id: grade.id,
            shape_id: grade.shape_id,
            color_id: grade.color_id,
            clarity_id: grade.clarity_id,
            sieve_size_id: packet.sieve_size_id,
            location_id: packet.location_id,
            size_class: size,
            weight: packet.remaining_weight,
            on_book_weight: packet.remaining_on_book,
            off_book_weight: packet.remaining_off_book,
            book_flag: packet.book_flag,
            price_per_carat,
            amount,
            current_status: PacketStatus::Sold,
            is_deleted: false,
            created_at: ctx.now,
            updated_at: ctx.now,
        };
        ctx.storage.store_order_detail(ctx.txn, &detail)?;

        packet.mark_sold(ctx.now);
        packets::store_packet(ctx, &packet)?;

        order.total_weight += detail.weight;
        order.total_amount += detail.amount;
        order.packet_count += 1;
        details.push(detail);
    }

    ctx.storage.store_order(ctx.txn, &order)?;
    Ok(AllocationOutcome { order, details })
}
