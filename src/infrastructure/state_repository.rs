//! Durable storage for per-sheet sync state
//!
//! The state store keeps live state in memory and mirrors every mutation
//! through this repository, so a restart resumes from the persisted row
//! positions instead of re-appending already-written rows.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;

use crate::domain::{SheetKey, SyncState, SyncStatus};

/// Storage collaborator of the sync-state store.
#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    async fn save(&self, key: SheetKey, state: &SyncState) -> Result<()>;

    async fn load_all(&self) -> Result<Vec<(SheetKey, SyncState)>>;
}

/// SQLite-backed repository.
pub struct SqliteStateRepository {
    pool: SqlitePool,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS sync_states (
    sheet_key TEXT PRIMARY KEY,
    last_sync_time TEXT NULL,
    last_row INTEGER NOT NULL,
    status TEXT NOT NULL,
    consecutive_errors INTEGER NOT NULL,
    last_error TEXT NULL
)";

impl SqliteStateRepository {
    /// Open (creating if missing) the state database at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| {
                format!("failed to open state database {}", path.as_ref().display())
            })?;
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .context("failed to initialize sync_states schema")?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl SyncStateRepository for SqliteStateRepository {
    async fn save(&self, key: SheetKey, state: &SyncState) -> Result<()> {
        sqlx::query(
            "INSERT INTO sync_states
                 (sheet_key, last_sync_time, last_row, status, consecutive_errors, last_error)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(sheet_key) DO UPDATE SET
                 last_sync_time = excluded.last_sync_time,
                 last_row = excluded.last_row,
                 status = excluded.status,
                 consecutive_errors = excluded.consecutive_errors,
                 last_error = excluded.last_error",
        )
        .bind(key.to_string())
        .bind(state.last_sync_time)
        .bind(i64::from(state.last_row))
        .bind(state.status.as_str())
        .bind(i64::from(state.consecutive_errors))
        .bind(state.last_error.as_deref())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to persist sync state for {key}"))?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<(SheetKey, SyncState)>> {
        let rows = sqlx::query(
            "SELECT sheet_key, last_sync_time, last_row, status, consecutive_errors, last_error
             FROM sync_states",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to load persisted sync states")?;

        let mut states = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_key: String = row.try_get("sheet_key")?;
            let key: SheetKey = raw_key
                .parse()
                .map_err(|e| anyhow!("corrupt sheet key '{raw_key}': {e}"))?;
            let raw_status: String = row.try_get("status")?;
            let status: SyncStatus = raw_status
                .parse()
                .map_err(|e| anyhow!("corrupt status for {key}: {e}"))?;
            let last_sync_time: Option<DateTime<Utc>> = row.try_get("last_sync_time")?;
            let last_row: i64 = row.try_get("last_row")?;
            let consecutive_errors: i64 = row.try_get("consecutive_errors")?;
            let last_error: Option<String> = row.try_get("last_error")?;

            states.push((
                key,
                SyncState {
                    last_sync_time,
                    last_row: u32::try_from(last_row).unwrap_or(1),
                    // A crash mid-sync leaves Syncing behind; surface it as
                    // Pending so the sheet is picked up again.
                    status: if status == SyncStatus::Syncing {
                        SyncStatus::Pending
                    } else {
                        status
                    },
                    consecutive_errors: u32::try_from(consecutive_errors).unwrap_or(0),
                    last_error,
                },
            ));
        }
        Ok(states)
    }
}

/// Map-backed repository used when no database path is configured.
#[derive(Default)]
pub struct InMemoryStateRepository {
    states: Mutex<HashMap<SheetKey, SyncState>>,
}

impl InMemoryStateRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncStateRepository for InMemoryStateRepository {
    async fn save(&self, key: SheetKey, state: &SyncState) -> Result<()> {
        self.states.lock().await.insert(key, state.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<(SheetKey, SyncState)>> {
        Ok(self
            .states
            .lock()
            .await
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SheetTier, SheetType};

    fn key(owner: u32) -> SheetKey {
        SheetKey {
            tier: SheetTier::Account,
            sheet_type: SheetType::OrdersProcessing,
            owner_id: Some(owner),
        }
    }

    #[tokio::test]
    async fn sqlite_round_trips_state() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteStateRepository::connect(dir.path().join("state.db"))
            .await
            .unwrap();

        let state = SyncState {
            last_sync_time: Some(Utc::now()),
            last_row: 42,
            status: SyncStatus::Completed,
            consecutive_errors: 0,
            last_error: None,
        };
        repo.save(key(1), &state).await.unwrap();

        // Overwrites, not duplicates
        let updated = SyncState {
            last_row: 50,
            ..state.clone()
        };
        repo.save(key(1), &updated).await.unwrap();
        repo.save(key(2), &SyncState::default()).await.unwrap();

        let mut loaded = repo.load_all().await.unwrap();
        loaded.sort_by_key(|(k, _)| *k);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].1.last_row, 50);
        assert_eq!(loaded[0].1.status, SyncStatus::Completed);
    }

    #[tokio::test]
    async fn interrupted_syncing_state_loads_as_pending() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteStateRepository::connect(dir.path().join("state.db"))
            .await
            .unwrap();

        let state = SyncState {
            status: SyncStatus::Syncing,
            ..SyncState::default()
        };
        repo.save(key(9), &state).await.unwrap();

        let loaded = repo.load_all().await.unwrap();
        assert_eq!(loaded[0].1.status, SyncStatus::Pending);
    }
}
