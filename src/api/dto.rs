//! Request/response bodies of the control surface.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{AccountCounters, SyncResult, SyncState};

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub account_id: u32,
    #[serde(default)]
    pub force_sync: bool,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub account_id: u32,
    pub results: Vec<SyncResult>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Per-sheet state keyed by the sheet's canonical key string,
/// e.g. `account:12:orders_processing`.
#[derive(Debug, Serialize)]
pub struct SheetStatus {
    pub sheet: String,
    pub state: SyncState,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatusResponse {
    pub running: bool,
    pub active_executions: usize,
    pub accounts: usize,
    /// Sheet counts keyed by sync status (`Pending`, `Syncing`, ...).
    pub status_counts: BTreeMap<String, usize>,
    pub sheets: Vec<SheetStatus>,
}

#[derive(Debug, Serialize)]
pub struct ServiceActionResponse {
    pub running: bool,
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct AccountStatusResponse {
    pub account_id: u32,
    pub vps_id: u32,
    pub sheet_display_name: String,
    pub sheets: Vec<SheetStatus>,
    pub counters: AccountCounters,
    pub average_duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
