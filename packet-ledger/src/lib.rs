//! Packet Ledger - diamond packet and lot inventory ledger
//!
//! # Overview
//!
//! - **Lots** (`ledger::lots`): per (location, grade, sieve, book) counters, mirrored into a total lot
//! - **Unpacking** (`ledger::unpacking`): split packets with FIFO on-book / off-book provenance
//! - **Allocation** (`ledger::allocation`): reserve packets for orders without overselling
//! - **Release** (`ledger::release`): cancel, reject or revert orders
//! - **Storage** (`ledger::storage`): embedded redb file, one writer at a time
//!
//! # Module layout
//!
//! ```text
//! packet-ledger/src/
//! ├── core/          # configuration
//! ├── ledger/        # storage, engines, InventoryManager
//! └── utils/         # logging
//! ```

pub mod core;
pub mod ledger;
pub mod utils;

pub use core::Config;
pub use ledger::{
    InventoryManager, LedgerError, LedgerResult, LedgerSettings, LedgerStorage, LotDiscrepancy,
};
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};

/// Load `.env`, read the configuration, prepare the work directory and logging
pub fn setup_environment() -> anyhow::Result<Config> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.work_dir)?;

    init_logger_with_file(&config.log_level, config.json_logs(), config.log_dir.as_deref())?;
    if let Some(dir) = &config.log_dir {
        cleanup_old_logs(std::path::Path::new(dir))?;
    }

    Ok(config)
}
