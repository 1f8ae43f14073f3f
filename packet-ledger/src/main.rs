use anyhow::Context;
use packet_ledger::{InventoryManager, setup_environment};

fn main() -> anyhow::Result<()> {
    // 1. Environment (dotenv, work dir, logging)
    let config = setup_environment()?;
    tracing::info!(
        environment = %config.environment,
        db = %config.db_path().display(),
        "Packet ledger audit starting"
    );

    // 2. Open the ledger
    let manager = InventoryManager::new(config.db_path(), config.ledger_settings())
        .with_context(|| format!("failed to open ledger at {}", config.db_path().display()))?;

    // 3. Report
    let stats = manager.stats()?;
    tracing::info!(
        grades = stats.grade_count,
        lots = stats.lot_count,
        live_lots = stats.live_lot_count,
        packets = stats.packet_count,
        provenance = stats.provenance_count,
        orders = stats.order_count,
        order_details = stats.order_detail_count,
        "Ledger statistics"
    );

    // 4. Verify lot invariants
    let discrepancies = manager.verify_lot_mirrors()?;
    if discrepancies.is_empty() {
        tracing::info!("Lot mirrors consistent");
        return Ok(());
    }

    for discrepancy in &discrepancies {
        tracing::error!(discrepancy = %serde_json::to_string(discrepancy)?, "Lot discrepancy");
    }
    anyhow::bail!("{} lot discrepancies found", discrepancies.len())
}
