//! Sync executor
//!
//! Runs one sheet's synchronization pass: pull domain records, render them
//! through the template engine, upsert keyed rows into the external sheet,
//! and fold the outcome back into the state store.
//!
//! The executor does not manage leases. The scheduler admits a lease before
//! dispatching and drops it when the spawned execution finishes, so release
//! happens exactly once on every exit path including panics and timeouts.
//!
//! Dependencies arrive through the constructor; there is no service lookup.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::domain::{DomainBatch, SheetConfig, SheetTier, SyncResult};
use crate::engine::error::SyncError;
use crate::engine::registry::AccountRegistry;
use crate::engine::state_store::SyncStateStore;
use crate::engine::template;
use crate::infrastructure::backend::{DomainDatastore, RowRange, SheetBackend};

/// Sheet id prefix of staff-tier workload sheets, which have no account
/// mapping entry.
const STAFF_SHEET_PREFIX: &str = "staff-workload";

struct PassOutcome {
    appended_rows: u32,
    orders: u32,
    listings: u32,
    messages: u32,
}

pub struct SyncExecutor {
    registry: Arc<AccountRegistry>,
    store: Arc<SyncStateStore>,
    datastore: Arc<dyn DomainDatastore>,
    backend: Arc<dyn SheetBackend>,
    master_sheet_id: String,
    execution_timeout: Duration,
}

impl SyncExecutor {
    pub fn new(
        registry: Arc<AccountRegistry>,
        store: Arc<SyncStateStore>,
        datastore: Arc<dyn DomainDatastore>,
        backend: Arc<dyn SheetBackend>,
        master_sheet_id: impl Into<String>,
        execution_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            datastore,
            backend,
            master_sheet_id: master_sheet_id.into(),
            execution_timeout,
        }
    }

    /// Execute one pass for `config` under its admitted lease.
    ///
    /// Never returns an error: every failure is classified, recorded in the
    /// sheet's state and reported in the `SyncResult`, keeping it contained
    /// to this execution.
    pub async fn execute(&self, config: &SheetConfig) -> SyncResult {
        let key = config.key();
        let account_id = config.owner_id.unwrap_or(0);
        let started = Instant::now();

        self.store.mark_syncing(key).await;

        let outcome = tokio::time::timeout(self.execution_timeout, self.run_pass(config)).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let result = match outcome {
            Ok(Ok(pass)) => {
                self.store
                    .record_success(key, Utc::now(), pass.appended_rows)
                    .await;
                info!(
                    sheet = %key,
                    appended = pass.appended_rows,
                    duration_ms,
                    "sync completed"
                );
                SyncResult {
                    account_id,
                    success: true,
                    orders_synced: pass.orders,
                    listings_synced: pass.listings,
                    messages_synced: pass.messages,
                    errors: vec![],
                    duration_ms,
                }
            }
            Ok(Err(error)) => {
                // Transient failures retry on the next due cycle; permanent
                // ones are logged distinctly so an operator can tell a dead
                // backend from a misconfigured account.
                if error.is_transient() {
                    warn!(sheet = %key, %error, classification = "transient", "sync failed, will retry next tick");
                } else {
                    warn!(sheet = %key, %error, classification = "permanent", "sync failed, needs attention");
                }
                self.store.record_failure(key, &error.to_string()).await;
                SyncResult::failure(account_id, error.to_string(), duration_ms)
            }
            Err(_elapsed) => {
                let error = SyncError::Timeout {
                    timeout_secs: self.execution_timeout.as_secs(),
                };
                warn!(sheet = %key, %error, classification = "transient", "sync timed out");
                self.store.record_failure(key, &error.to_string()).await;
                SyncResult::failure(account_id, error.to_string(), duration_ms)
            }
        };

        self.store.record_result(&result).await;
        result
    }

    async fn run_pass(&self, config: &SheetConfig) -> Result<PassOutcome, SyncError> {
        let (sheet_id, batch) = self.collect(config).await?;

        let output = template::transform(config.tier, config.sheet_type, &batch, Utc::now());
        if !output.validation_errors.is_empty() {
            return Err(SyncError::Validation(output.validation_errors));
        }

        let existing = self.backend.read_rows(&sheet_id, RowRange::all()).await?;
        if existing.is_empty() {
            self.backend
                .create_sheet(&sheet_id, template::headers(config.tier))
                .await?;
        }

        // Keyed upsert: rows with known keys overwrite in place, the rest
        // append. Only appends move the row cursor, so replaying identical
        // input is a no-op for the cursor.
        let existing_keys: HashSet<&str> = existing.iter().map(|r| r.key.as_str()).collect();
        let appended_rows = u32::try_from(
            output
                .rows
                .iter()
                .filter(|row| !existing_keys.contains(row.key.as_str()))
                .count(),
        )
        .unwrap_or(u32::MAX);

        self.backend.upsert_rows(&sheet_id, &output.rows).await?;

        Ok(PassOutcome {
            appended_rows,
            orders: u32::try_from(batch.orders.len()).unwrap_or(u32::MAX),
            listings: u32::try_from(batch.listings.len()).unwrap_or(u32::MAX),
            messages: u32::try_from(batch.messages.len()).unwrap_or(u32::MAX),
        })
    }

    /// Resolve the target sheet and pull the records its tier renders.
    async fn collect(&self, config: &SheetConfig) -> Result<(String, DomainBatch), SyncError> {
        match config.tier {
            SheetTier::Master => {
                let summaries = self.datastore.fetch_account_summaries().await?;
                Ok((
                    self.master_sheet_id.clone(),
                    DomainBatch::from_summaries(summaries),
                ))
            }
            SheetTier::Account => {
                let account_id = config.owner_id.ok_or_else(|| SyncError::SheetNotFound {
                    key: config.key().to_string(),
                })?;
                let mapping = self.registry.resolve(account_id)?;
                let orders = self.datastore.fetch_orders(account_id).await?;
                let listings = self.datastore.fetch_listings(account_id).await?;
                let messages = self.datastore.fetch_messages(account_id).await?;
                Ok((
                    mapping.external_sheet_id.clone(),
                    DomainBatch {
                        orders,
                        listings,
                        messages,
                        summaries: vec![],
                    },
                ))
            }
            SheetTier::Staff => {
                let user_id = config.owner_id.ok_or_else(|| SyncError::SheetNotFound {
                    key: config.key().to_string(),
                })?;
                let orders = self.datastore.fetch_assigned_orders(user_id).await?;
                Ok((
                    format!("{STAFF_SHEET_PREFIX}-{user_id}"),
                    DomainBatch::from_orders(orders),
                ))
            }
        }
    }
}
