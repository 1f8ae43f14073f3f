use super::*;

#[test]
fn test_allocation_prefers_on_book_then_age() {
    let manager = create_test_manager();
    let off = receive(&manager, grade_a(), "0", "0.25");
    let mix = receive(&manager, grade_a(), "0.15", "0.10");
    let older = receive(&manager, grade_a(), "0.25", "0");
    let newer = receive(&manager, grade_a(), "0.25", "0");
    let total_lot_id = older.total_lot_id;

    let browse: Vec<i64> = manager
        .available_packets(total_lot_id, Some(SizeClass::Quarter))
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(browse, vec![older.id, newer.id, off.id, mix.id]);

    let outcome = manager
        .allocate(&allocation_request(&[(total_lot_id, SizeClass::Quarter, 3)]))
        .unwrap();
    assert_eq!(outcome.packet_ids(), vec![older.id, newer.id, off.id]);

    let left = manager.available_packets(total_lot_id, None).unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, mix.id);
}

#[test]
fn test_allocation_records_order_and_details() {
    let prices = Arc::new(StaticPriceList::new());
    let manager = create_test_manager().with_prices(prices.clone());

    let half = receive(&manager, grade_a(), "0.50", "0");
    let grade = manager.storage().get_grade(half.grade_id).unwrap().unwrap();
    prices.set_price(
        PriceKey {
            region_id: 1,
            shape_id: grade.shape_id,
            color_id: grade.color_id,
            clarity_id: grade.clarity_id,
            sieve_size_id: SIEVE,
        },
        ct("1200"),
    );

    let outcome = manager
        .allocate(&allocation_request(&[(half.lot_id, SizeClass::Half, 1)]))
        .unwrap();

    let order = manager.get_order(outcome.order.id).unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.customer_id, 100);
    assert_eq!(order.packet_count, 1);
    assert_eq!(order.total_weight, ct("0.50"));
    assert_eq!(order.total_amount, ct("600.00"));

    let details = manager.order_details(order.id).unwrap();
    assert_eq!(details, outcome.details);
    let detail = &details[0];
    assert_eq!(detail.packet_id, half.id);
    assert_eq!(detail.qr_code, half.qr_code);
    assert_eq!(detail.size_class, SizeClass::Half);
    assert_eq!(detail.shape_id, grade.shape_id);
    assert_eq!(detail.price_per_carat, ct("1200"));
    assert_eq!(detail.amount, ct("600.00"));
    assert_eq!(detail.current_status, PacketStatus::Sold);
    assert!(!detail.is_deleted);

    let packet = manager.get_packet(half.id).unwrap();
    assert_eq!(packet.current_status, PacketStatus::Sold);
    assert!(!packet.is_available_for_store);
    assert!(packet.available_since.is_none());

    // Reserved packets still count in their lot
    let lot = manager.get_lot(half.lot_id).unwrap();
    assert_eq!(lot.half.quantity, 1);
    assert_ledger_consistent(&manager);
}

#[test]
fn test_missing_price_records_zero_amount() {
    let manager = create_test_manager();
    let carat = receive(&manager, grade_a(), "1.00", "0");

    let outcome = manager
        .allocate(&allocation_request(&[(carat.lot_id, SizeClass::Carat, 1)]))
        .unwrap();

    assert_eq!(outcome.details[0].price_per_carat, Decimal::ZERO);
    assert_eq!(outcome.order.total_amount, Decimal::ZERO);
    assert_eq!(outcome.order.total_weight, ct("1.00"));
}

#[test]
fn test_short_pair_fails_whole_order() {
    let manager = create_test_manager();
    let quarter = receive(&manager, grade_a(), "0.25", "0");
    let half = receive(&manager, grade_x(), "0.50", "0");

    let err = manager
        .allocate(&allocation_request(&[
            (quarter.lot_id, SizeClass::Quarter, 1),
            (half.lot_id, SizeClass::Half, 2),
        ]))
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientPackets { needed: 2, available: 1, size: SizeClass::Half, .. }
    ));

    // Nothing from the satisfiable pair was reserved
    assert_eq!(
        manager.get_packet(quarter.id).unwrap().current_status,
        PacketStatus::Available
    );
    assert_eq!(manager.stats().unwrap().order_count, 0);
    assert_eq!(manager.stats().unwrap().order_detail_count, 0);
}

#[test]
fn test_duplicate_lines_take_distinct_packets() {
    let manager = create_test_manager();
    let first = receive(&manager, grade_a(), "0.25", "0");
    let second = receive(&manager, grade_a(), "0.25", "0");

    let outcome = manager
        .allocate(&allocation_request(&[
            (first.lot_id, SizeClass::Quarter, 1),
            (first.lot_id, SizeClass::Quarter, 1),
        ]))
        .unwrap();

    assert_eq!(outcome.packet_ids(), vec![first.id, second.id]);
    assert_eq!(outcome.order.packet_count, 2);
}

#[test]
fn test_sold_packet_never_reselected() {
    let manager = create_test_manager();
    let quarter = receive(&manager, grade_a(), "0.25", "0");
    let request = allocation_request(&[(quarter.lot_id, SizeClass::Quarter, 1)]);

    manager.allocate(&request).unwrap();
    let err = manager.allocate(&request).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientPackets { available: 0, .. }
    ));
}

#[test]
fn test_size_mismatch_and_unpacked_remainders_skipped() {
    let manager = create_test_manager();
    let source = receive(&manager, grade_a(), "1.00", "0");
    manager
        .unpack(&unpack_request(&[source.id], &[("0.60", grade_a())]))
        .unwrap();

    // 0.60 target and 0.40 residual match no size class
    let lot_id = source.lot_id;
    for size in SizeClass::ALL {
        let err = manager
            .allocate(&allocation_request(&[(lot_id, size, 1)]))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientPackets { .. }));
    }
}

#[test]
fn test_unknown_or_retired_lot_rejected() {
    let manager = create_test_manager();

    let err = manager
        .allocate(&allocation_request(&[(42, SizeClass::Quarter, 1)]))
        .unwrap_err();
    assert!(matches!(err, LedgerError::LotNotFound(42)));

    let err = manager
        .allocate(&allocation_request(&[(42, SizeClass::Quarter, 0)]))
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[test]
fn test_overflowing_merged_quantity_rejected() {
    let manager = create_test_manager();
    let packet = receive(&manager, grade_a(), "0.25", "0");

    let err = manager
        .allocate(&allocation_request(&[
            (packet.lot_id, SizeClass::Quarter, u32::MAX),
            (packet.lot_id, SizeClass::Quarter, 2),
        ]))
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    assert_eq!(manager.stats().unwrap().order_count, 0);
    assert_eq!(
        manager.get_packet(packet.id).unwrap().current_status,
        PacketStatus::Available
    );
}
