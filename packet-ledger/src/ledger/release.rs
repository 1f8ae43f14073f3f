//! Reservation Release and order status moves

use super::context::LedgerContext;
use super::error::{LedgerError, LedgerResult};
use super::packets;
use shared::models::{Order, OrderStatus, PacketStatus, ReleaseOutcome, ReleaseRequest};

pub fn validate(request: &ReleaseRequest) -> LedgerResult<()> {
    if request.reason.trim().is_empty() {
        return Err(LedgerError::validation("release reason is required"));
    }
    Ok(())
}

fn load_order(ctx: &LedgerContext<'_>, order_id: i64) -> LedgerResult<Order> {
    ctx.storage
        .get_order_txn(ctx.txn, order_id)?
        .ok_or(LedgerError::OrderNotFound(order_id))
}

/// Return an order's packets to the pool; the caller validated the request
pub fn execute(
    ctx: &LedgerContext<'_>,
    request: &ReleaseRequest,
    cancel_window_ms: i64,
) -> LedgerResult<ReleaseOutcome> {
    let mut order = load_order(ctx, request.order_id)?;

    // 1. Policy
    if order.status.is_released() {
        return Err(LedgerError::OrderAlreadyReleased {
            order_id: order.id,
            status: order.status,
        });
    }
    if order.status.is_dispatched() {
        return Err(LedgerError::OrderDispatched {
            order_id: order.id,
            status: order.status,
        });
    }
    if request.kind.is_time_boxed() {
        let elapsed_ms = ctx.now - order.created_at;
        if elapsed_ms > cancel_window_ms {
            return Err(LedgerError::CancelWindowExceeded {
                order_id: order.id,
                elapsed_ms,
                window_ms: cancel_window_ms,
            });
        }
    }

    // 2. Packets back to the pool, details retired
    let mut released_packet_ids = Vec::new();
    for mut detail in ctx.storage.order_details_txn(ctx.txn, order.id)? {
        if detail.is_deleted {
            continue;
        }

        let mut packet = packets::load_packet(ctx, detail.packet_id)?;
        packet.mark_available(request.actor_id, ctx.now);
        packets::store_packet(ctx, &packet)?;

        detail.current_status = PacketStatus::Unavailable;
        detail.is_deleted = true;
        detail.updated_at = ctx.now;
        ctx.storage.store_order_detail(ctx.txn, &detail)?;
        released_packet_ids.push(packet.id);
    }

    // 3. Terminal status
    order.status = request.kind.target_status();
    order.reason = Some(request.reason.trim().to_string());
    order.released_by = Some(request.actor_id);
    order.released_at = Some(ctx.now);
    order.updated_at = ctx.now;
    ctx.storage.store_order(ctx.txn, &order)?;

    Ok(ReleaseOutcome {
        order,
        released_packet_ids,
    })
}

/// Move an order forward along Pending → Confirmed → Shipped → Delivered
pub fn advance(ctx: &LedgerContext<'_>, order_id: i64, to: OrderStatus) -> LedgerResult<Order> {
    let mut order = load_order(ctx, order_id)?;

    let allowed = match (order.status.forward_rank(), to.forward_rank()) {
        (Some(from), Some(target)) => target > from,
        _ => false,
    };
    if !allowed {
        return Err(LedgerError::InvalidTransition {
            order_id,
            from: order.status,
            to,
        });
    }

    order.status = to;
    order.updated_at = ctx.now;
    ctx.storage.store_order(ctx.txn, &order)?;
    Ok(order)
}
