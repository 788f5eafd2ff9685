//! Static configuration loading
//!
//! The account -> VPS -> profile -> sheet mapping and the concurrency caps
//! are loaded once at startup from a JSON file. Reload requires a controlled
//! restart of the scheduler, not a live patch, to avoid races with in-flight
//! leases.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::domain::{
    AccountSheetMapping, ProfileSplit, SheetConfig, SheetTier, SheetType, VpsConfig,
};

/// Scheduler and concurrency settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Fixed driver-loop tick in seconds.
    pub tick_seconds: u64,
    /// Global cap on concurrent sync executions.
    pub global_concurrency: usize,
    /// Hard wall-clock timeout per execution in seconds.
    pub execution_timeout_seconds: u64,
    /// External sheet id of the Master dashboard.
    pub master_sheet_id: String,
    /// Sync interval of Master-tier sheets in minutes.
    pub master_interval_minutes: u32,
    /// Bind address of the HTTP control surface.
    pub listen_addr: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 30,
            global_concurrency: 10,
            execution_timeout_seconds: 60,
            master_sheet_id: "master-dashboard".to_string(),
            master_interval_minutes: 15,
            listen_addr: "127.0.0.1:8088".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level filter when RUST_LOG is not set.
    pub level: String,
    /// Whether to also write rotating log files.
    pub file_enabled: bool,
    /// Log directory; defaults to `logs/` next to the executable.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: false,
            dir: None,
        }
    }
}

/// Durable sync-state storage. Absent path means in-memory only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    /// Expected browser-profile split for load-time validation. Absent skips
    /// the split check; structural invariants are always enforced.
    pub expected_profiles: Option<ProfileSplit>,
    pub vps: Vec<VpsConfig>,
    pub accounts: Vec<AccountSheetMapping>,
    /// Explicit sheet configs. Empty means "derive the default set".
    pub sheets: Vec<SheetConfig>,
}

impl AppConfig {
    /// Load configuration from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        info!(
            accounts = config.accounts.len(),
            vps = config.vps.len(),
            sheets = config.sheets.len(),
            "configuration loaded from {}",
            path.display()
        );
        Ok(config)
    }

    /// Load from a file when it exists, otherwise fall back to defaults.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            info!(
                "config file {} not found, using built-in defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// The sheet configs the scheduler drives: the explicit list when given,
    /// otherwise the default provisioning, one orders-processing sheet per
    /// account at the account's interval plus the Master performance report.
    #[must_use]
    pub fn effective_sheet_configs(&self) -> Vec<SheetConfig> {
        if !self.sheets.is_empty() {
            return self.sheets.clone();
        }
        let mut sheets: Vec<SheetConfig> = self
            .accounts
            .iter()
            .map(|account| SheetConfig {
                tier: SheetTier::Account,
                sheet_type: SheetType::OrdersProcessing,
                owner_id: Some(account.account_id),
                auto_sync: true,
                sync_interval_minutes: account.sync_interval_minutes,
            })
            .collect();
        if !self.accounts.is_empty() {
            sheets.push(SheetConfig {
                tier: SheetTier::Master,
                sheet_type: SheetType::PerformanceReport,
                owner_id: None,
                auto_sync: true,
                sync_interval_minutes: self.scheduler.master_interval_minutes,
            });
        }
        sheets
    }
}
