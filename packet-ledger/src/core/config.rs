use crate::ledger::LedgerSettings;
use rust_decimal::Decimal;
use shared::Tolerance;
use shared::carat::DEFAULT_WEIGHT_EPSILON;
use shared::util::HOUR_MILLIS;
use std::path::PathBuf;

/// Ledger configuration
///
/// # Environment variables
///
/// Every field can be overridden from the environment (`.env` is honoured):
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./work_dir | Working directory for the ledger file |
/// | LEDGER_DB_FILE | ledger.redb | Ledger file name inside WORK_DIR |
/// | ENVIRONMENT | development | Runtime environment |
/// | LOG_LEVEL | info | Default log filter |
/// | LOG_JSON | false | JSON log output (always on in production) |
/// | LOG_DIR | (unset) | Directory for daily rotating log files |
/// | WEIGHT_EPSILON | 0.0001 | Carat tolerance for weight equality |
/// | CANCEL_WINDOW_HOURS | 24 | Customer cancel window |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/data/ledger WEIGHT_EPSILON=0.001 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory, holds the ledger file
    pub work_dir: String,
    pub ledger_db_file: String,
    /// development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
    pub weight_epsilon: Decimal,
    pub cancel_window_hours: i64,
}

impl Config {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./work_dir".into()),
            ledger_db_file: std::env::var("LEDGER_DB_FILE")
                .unwrap_or_else(|_| "ledger.redb".into()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: std::env::var("LOG_JSON")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            weight_epsilon: std::env::var("WEIGHT_EPSILON")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|e: &Decimal| *e > Decimal::ZERO)
                .unwrap_or(DEFAULT_WEIGHT_EPSILON),
            cancel_window_hours: std::env::var("CANCEL_WINDOW_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|h: &i64| *h >= 0)
                .unwrap_or(24),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join(&self.ledger_db_file)
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            tolerance: Tolerance::new(self.weight_epsilon),
            cancel_window_ms: self.cancel_window_hours.saturating_mul(HOUR_MILLIS),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Production always logs JSON
    pub fn json_logs(&self) -> bool {
        self.log_json || self.is_production()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
