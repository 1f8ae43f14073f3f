use super::*;

const START: i64 = 1_760_000_000_000;

fn reserved_order(manager: &InventoryManager) -> (Packet, AllocationOutcome) {
    let packet = receive(manager, grade_a(), "0.50", "0");
    let outcome = manager
        .allocate(&allocation_request(&[(packet.lot_id, SizeClass::Half, 1)]))
        .unwrap();
    (packet, outcome)
}

#[test]
fn test_cancel_within_window_returns_packets() {
    let clock = Arc::new(ManualClock::new(START));
    let manager = create_manager_with_clock(clock.clone());
    let (packet, allocated) = reserved_order(&manager);

    clock.advance(HOUR_MILLIS);
    let outcome = manager
        .release(&release_request(allocated.order.id, ReleaseKind::CustomerCancel))
        .unwrap();

    assert_eq!(outcome.released_packet_ids, vec![packet.id]);
    let order = manager.get_order(allocated.order.id).unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.reason.as_deref(), Some("customer changed mind"));
    assert_eq!(order.released_by, Some(OPERATOR));
    assert_eq!(order.released_at, Some(START + HOUR_MILLIS));

    let packet = manager.get_packet(packet.id).unwrap();
    assert_eq!(packet.current_status, PacketStatus::Available);
    assert!(packet.is_available_for_store);
    assert_eq!(packet.available_since, Some(START + HOUR_MILLIS));
    assert_eq!(packet.available_by, Some(OPERATOR));

    let details = manager.order_details(order.id).unwrap();
    assert!(details[0].is_deleted);
    assert_eq!(details[0].current_status, PacketStatus::Unavailable);

    // Released packet is sellable again
    let again = manager
        .allocate(&allocation_request(&[(packet.lot_id, SizeClass::Half, 1)]))
        .unwrap();
    assert_eq!(again.packet_ids(), vec![packet.id]);
    assert_ledger_consistent(&manager);
}

#[test]
fn test_cancel_after_window_rejected() {
    let clock = Arc::new(ManualClock::new(START));
    let manager = create_manager_with_clock(clock.clone());
    let (packet, allocated) = reserved_order(&manager);

    clock.advance(25 * HOUR_MILLIS);
    let err = manager
        .release(&release_request(allocated.order.id, ReleaseKind::CustomerCancel))
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::CancelWindowExceeded { elapsed_ms, .. } if elapsed_ms == 25 * HOUR_MILLIS
    ));

    assert_eq!(
        manager.get_order(allocated.order.id).unwrap().status,
        OrderStatus::Pending
    );
    assert_eq!(
        manager.get_packet(packet.id).unwrap().current_status,
        PacketStatus::Sold
    );
}

#[test]
fn test_cancel_at_window_edge_allowed() {
    let clock = Arc::new(ManualClock::new(START));
    let manager = create_manager_with_clock(clock.clone());
    let (_, allocated) = reserved_order(&manager);

    clock.advance(manager.settings().cancel_window_ms);
    assert!(
        manager
            .release(&release_request(allocated.order.id, ReleaseKind::CustomerCancel))
            .is_ok()
    );
}

#[test]
fn test_reject_and_revert_ignore_window() {
    let clock = Arc::new(ManualClock::new(START));
    let manager = create_manager_with_clock(clock.clone());
    let (_, rejected) = reserved_order(&manager);
    let (_, reverted) = reserved_order(&manager);

    clock.advance(72 * HOUR_MILLIS);
    let outcome = manager
        .release(&release_request(rejected.order.id, ReleaseKind::Reject))
        .unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Rejected);

    let outcome = manager
        .release(&release_request(reverted.order.id, ReleaseKind::AdminRevert))
        .unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Cancelled);
}

#[test]
fn test_release_twice_rejected() {
    let manager = create_test_manager();
    let (_, allocated) = reserved_order(&manager);
    let request = release_request(allocated.order.id, ReleaseKind::Reject);

    manager.release(&request).unwrap();
    let err = manager.release(&request).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::OrderAlreadyReleased { status: OrderStatus::Rejected, .. }
    ));
}

#[test]
fn test_shipped_order_cannot_release() {
    let manager = create_test_manager();
    let (packet, allocated) = reserved_order(&manager);
    let order_id = allocated.order.id;

    manager.advance_order(order_id, OrderStatus::Confirmed).unwrap();
    manager.advance_order(order_id, OrderStatus::Shipped).unwrap();

    let err = manager
        .release(&release_request(order_id, ReleaseKind::AdminRevert))
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::OrderDispatched { status: OrderStatus::Shipped, .. }
    ));
    assert_eq!(
        manager.get_packet(packet.id).unwrap().current_status,
        PacketStatus::Sold
    );
}

#[test]
fn test_advance_order_only_moves_forward() {
    let manager = create_test_manager();
    let (_, allocated) = reserved_order(&manager);
    let order_id = allocated.order.id;

    let order = manager.advance_order(order_id, OrderStatus::Confirmed).unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);

    for to in [OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Cancelled] {
        let err = manager.advance_order(order_id, to).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }), "{:?}", to);
    }

    // Skipping ahead is allowed
    let order = manager.advance_order(order_id, OrderStatus::Delivered).unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
}

#[test]
fn test_released_order_cannot_advance() {
    let manager = create_test_manager();
    let (_, allocated) = reserved_order(&manager);
    let order_id = allocated.order.id;

    manager
        .release(&release_request(order_id, ReleaseKind::Reject))
        .unwrap();
    let err = manager
        .advance_order(order_id, OrderStatus::Confirmed)
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidTransition { from: OrderStatus::Rejected, .. }
    ));
}

#[test]
fn test_release_request_checks() {
    let manager = create_test_manager();

    let mut request = release_request(77, ReleaseKind::Reject);
    let err = manager.release(&request).unwrap_err();
    assert!(matches!(err, LedgerError::OrderNotFound(77)));

    request.reason = String::new();
    let err = manager.release(&request).unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}
