//! Sync-state store
//!
//! Memory-first state management: the live per-sheet state lives in a map
//! owned by the scheduler and handed to workers by `Arc`; every mutation is
//! mirrored through the storage repository. Per-owner mutual exclusion
//! guarantees a single writer per key, so no locking beyond the map lock is
//! needed.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::domain::{AccountCounters, SheetKey, SyncResult, SyncState, SyncStatus};
use crate::infrastructure::state_repository::SyncStateRepository;

pub struct SyncStateStore {
    states: RwLock<HashMap<SheetKey, SyncState>>,
    counters: RwLock<HashMap<u32, AccountCounters>>,
    repository: Arc<dyn SyncStateRepository>,
}

impl SyncStateStore {
    #[must_use]
    pub fn new(repository: Arc<dyn SyncStateRepository>) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            counters: RwLock::new(HashMap::new()),
            repository,
        }
    }

    /// Load persisted states into memory. Called once before the scheduler
    /// starts so row positions survive restarts.
    pub async fn hydrate(&self) -> anyhow::Result<usize> {
        let persisted = self.repository.load_all().await?;
        let count = persisted.len();
        let mut states = self.states.write().await;
        for (key, state) in persisted {
            states.insert(key, state);
        }
        Ok(count)
    }

    /// Current state of one sheet; a sheet that never ran reports the
    /// default Pending state.
    pub async fn get(&self, key: SheetKey) -> SyncState {
        self.states
            .read()
            .await
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn last_sync_time(&self, key: SheetKey) -> Option<DateTime<Utc>> {
        self.states
            .read()
            .await
            .get(&key)
            .and_then(|s| s.last_sync_time)
    }

    /// Snapshot of all known states, for the due selector and the status
    /// endpoints.
    pub async fn snapshot(&self) -> HashMap<SheetKey, SyncState> {
        self.states.read().await.clone()
    }

    pub async fn mark_syncing(&self, key: SheetKey) {
        self.update(key, |state| {
            state.status = SyncStatus::Syncing;
        })
        .await;
    }

    /// Successful pass: `appended_rows` advances the next-unwritten-row
    /// cursor; overwritten rows do not move it.
    pub async fn record_success(&self, key: SheetKey, now: DateTime<Utc>, appended_rows: u32) {
        self.update(key, |state| {
            state.status = SyncStatus::Completed;
            state.last_sync_time = Some(now);
            state.last_row += appended_rows;
            state.consecutive_errors = 0;
            state.last_error = None;
        })
        .await;
    }

    /// Failed pass: `last_sync_time` stays untouched so the due selector
    /// retries promptly instead of waiting out a full interval.
    pub async fn record_failure(&self, key: SheetKey, error: &str) {
        self.update(key, |state| {
            state.status = SyncStatus::Error;
            state.consecutive_errors += 1;
            state.last_error = Some(error.to_string());
        })
        .await;
    }

    /// Fold one execution result into the rolling per-account counters.
    pub async fn record_result(&self, result: &SyncResult) {
        self.counters
            .write()
            .await
            .entry(result.account_id)
            .or_default()
            .record(result);
    }

    pub async fn counters_for(&self, account_id: u32) -> AccountCounters {
        self.counters
            .read()
            .await
            .get(&account_id)
            .copied()
            .unwrap_or_default()
    }

    async fn update(&self, key: SheetKey, mutate: impl FnOnce(&mut SyncState)) {
        let state = {
            let mut states = self.states.write().await;
            let state = states.entry(key).or_default();
            mutate(state);
            state.clone()
        };
        // Persistence failures are contained: the in-memory state stays
        // authoritative for this process, the operator sees the warning.
        if let Err(error) = self.repository.save(key, &state).await {
            warn!(%key, %error, "failed to persist sync state");
        }
    }
}
