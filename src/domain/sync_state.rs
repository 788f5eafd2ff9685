//! Per-sheet synchronization state
//!
//! Follows the memory-first state layout: live `SyncState` is held in the
//! state store's map and mirrored to durable storage on every mutation, so a
//! restart resumes from the last persisted row position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of one sheet's synchronization.
///
/// `Syncing` implies exactly one in-flight execution owns the state; that is
/// enforced by the concurrency manager's per-account lock, not by this record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStatus {
    Pending,
    Syncing,
    Completed,
    Error,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Syncing => "Syncing",
            Self::Completed => "Completed",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Syncing" => Ok(Self::Syncing),
            "Completed" => Ok(Self::Completed),
            "Error" => Ok(Self::Error),
            other => Err(format!("invalid sync status: {other}")),
        }
    }
}

/// Mutable sync state of one sheet. Mutated only by the executor that holds
/// the sheet owner's lease; read by the due selector and status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub last_sync_time: Option<DateTime<Utc>>,
    /// The next unwritten row (1-based). Advances only when rows are appended.
    pub last_row: u32,
    pub status: SyncStatus,
    pub consecutive_errors: u32,
    pub last_error: Option<String>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            last_sync_time: None,
            last_row: 1,
            status: SyncStatus::Pending,
            consecutive_errors: 0,
            last_error: None,
        }
    }
}

/// Transient outcome of one completed execution. Persisted only as counter
/// updates; not itself durable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub account_id: u32,
    pub success: bool,
    pub orders_synced: u32,
    pub listings_synced: u32,
    pub messages_synced: u32,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl SyncResult {
    #[must_use]
    pub fn failure(account_id: u32, error: String, duration_ms: u64) -> Self {
        Self {
            account_id,
            success: false,
            orders_synced: 0,
            listings_synced: 0,
            messages_synced: 0,
            errors: vec![error],
            duration_ms,
        }
    }
}

/// Rolling per-account counters backing the single-account status endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCounters {
    pub total_syncs: u64,
    pub total_errors: u64,
    pub total_duration_ms: u64,
}

impl AccountCounters {
    #[must_use]
    pub fn average_duration_ms(&self) -> u64 {
        if self.total_syncs == 0 {
            0
        } else {
            self.total_duration_ms / self.total_syncs
        }
    }

    pub fn record(&mut self, result: &SyncResult) {
        self.total_syncs += 1;
        if !result.success {
            self.total_errors += 1;
        }
        self.total_duration_ms += result.duration_ms;
    }
}
