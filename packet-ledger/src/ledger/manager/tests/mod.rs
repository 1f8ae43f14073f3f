use super::*;
use crate::ledger::clock::ManualClock;
use crate::ledger::pricing::PriceKey;
use rust_decimal::Decimal;
use shared::models::{
    AllocationLine, GradeKey, IntakePacket, LotBookFlag, PacketBookFlag, PacketStatus,
    ReleaseKind, UnpackTarget,
};

const LOCATION: i64 = 1;
const SIEVE: i64 = 3;
const OPERATOR: i64 = 7;

fn create_test_manager() -> InventoryManager {
    let storage = LedgerStorage::open_in_memory().unwrap();
    InventoryManager::with_storage(storage, LedgerSettings::default())
}

fn create_manager_with_clock(clock: Arc<ManualClock>) -> InventoryManager {
    create_test_manager().with_clock(clock)
}

fn ct(value: &str) -> Decimal {
    value.parse().unwrap()
}

fn grade_a() -> GradeKey {
    GradeKey::new(1, 1, 1)
}

fn grade_x() -> GradeKey {
    GradeKey::new(2, 4, 6)
}

// ========================================================================
// Helper: seed stock
// ========================================================================

fn receive_at(
    manager: &InventoryManager,
    location_id: i64,
    grade: GradeKey,
    on_book: &str,
    off_book: &str,
) -> Packet {
    let request = IntakeRequest {
        location_id,
        actor_id: OPERATOR,
        packets: vec![IntakePacket {
            grade,
            sieve_size_id: SIEVE,
            on_book_weight: ct(on_book),
            off_book_weight: ct(off_book),
        }],
    };
    manager
        .receive_packets(&request)
        .unwrap()
        .pop()
        .unwrap()
}

fn receive(manager: &InventoryManager, grade: GradeKey, on_book: &str, off_book: &str) -> Packet {
    receive_at(manager, LOCATION, grade, on_book, off_book)
}

fn on_book_lot(manager: &InventoryManager, grade_id: i64) -> Option<Lot> {
    manager
        .find_lot(&LotKey::new(LOCATION, grade_id, SIEVE, LotBookFlag::OnBook))
        .unwrap()
}

fn total_lot(manager: &InventoryManager, grade_id: i64) -> Option<Lot> {
    manager
        .find_lot(&LotKey::new(LOCATION, grade_id, SIEVE, LotBookFlag::Total))
        .unwrap()
}

// ========================================================================
// Helper: requests
// ========================================================================

fn unpack_request(sources: &[i64], targets: &[(&str, GradeKey)]) -> UnpackRequest {
    UnpackRequest {
        source_packet_ids: sources.to_vec(),
        targets: targets
            .iter()
            .map(|(weight, grade)| UnpackTarget {
                weight: ct(weight),
                grade: *grade,
                sieve_size_id: SIEVE,
            })
            .collect(),
        actor_id: OPERATOR,
    }
}

fn allocation_request(lines: &[(i64, SizeClass, u32)]) -> AllocationRequest {
    AllocationRequest {
        customer_id: 100,
        region_id: 1,
        actor_id: OPERATOR,
        lines: lines
            .iter()
            .map(|&(lot_id, size, quantity)| AllocationLine {
                lot_id,
                size,
                quantity,
            })
            .collect(),
    }
}

fn release_request(order_id: i64, kind: ReleaseKind) -> ReleaseRequest {
    ReleaseRequest {
        order_id,
        kind,
        reason: "customer changed mind".to_string(),
        actor_id: OPERATOR,
    }
}

fn assert_ledger_consistent(manager: &InventoryManager) {
    let discrepancies = manager.verify_lot_mirrors().unwrap();
    assert!(discrepancies.is_empty(), "discrepancies: {:?}", discrepancies);
}

mod test_allocation;
mod test_release;
