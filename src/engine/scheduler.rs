//! Sync scheduler
//!
//! Single periodic driver loop: every tick it snapshots sync state, asks the
//! due selector for due sheets in priority order, and tries to admit each one
//! through the concurrency manager. Admitted candidates run as independent
//! tasks; `Busy` candidates simply stay due for the next tick.
//!
//! Workers never block each other directly. All coordination goes through
//! the three concurrency caps and the state store, so one slow or failing
//! account cannot delay the rest.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{SheetConfig, SheetTier, SyncResult};
use crate::engine::concurrency::{ConcurrencyManager, LeaseKey};
use crate::engine::due::{is_due, select_due, DueEntry};
use crate::engine::error::SyncError;
use crate::engine::executor::SyncExecutor;
use crate::engine::registry::AccountRegistry;
use crate::engine::state_store::SyncStateStore;

/// Outcome of one scheduling pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TickSummary {
    pub due: usize,
    pub admitted: usize,
    pub busy: usize,
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct SyncScheduler {
    registry: Arc<AccountRegistry>,
    store: Arc<SyncStateStore>,
    concurrency: Arc<ConcurrencyManager>,
    executor: Arc<SyncExecutor>,
    sheet_configs: Vec<SheetConfig>,
    tick: Duration,
    runtime: Mutex<Option<RunningLoop>>,
}

impl SyncScheduler {
    pub fn new(
        registry: Arc<AccountRegistry>,
        store: Arc<SyncStateStore>,
        concurrency: Arc<ConcurrencyManager>,
        executor: Arc<SyncExecutor>,
        sheet_configs: Vec<SheetConfig>,
        tick: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            concurrency,
            executor,
            sheet_configs,
            tick,
            runtime: Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.runtime.lock().await.is_some()
    }

    /// Start the driver loop. Idempotent: returns false without side effects
    /// when the loop is already running.
    pub async fn start(self: &Arc<Self>) -> bool {
        let mut runtime = self.runtime.lock().await;
        if runtime.is_some() {
            return false;
        }
        let cancel = CancellationToken::new();
        let this = Arc::clone(self);
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            this.run_loop(token).await;
        });
        *runtime = Some(RunningLoop { cancel, handle });
        info!(tick_secs = self.tick.as_secs(), "scheduler started");
        true
    }

    /// Stop the driver loop, waiting for in-flight executions to release
    /// their leases before returning. Graceful drain, not a hard kill.
    pub async fn stop(&self) {
        let running = self.runtime.lock().await.take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(error) = running.handle.await {
                warn!(%error, "scheduler loop ended abnormally");
            }
            info!("scheduler stopped");
        }
    }

    async fn run_loop(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tasks: JoinSet<SyncResult> = JoinSet::new();

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    // Reap finished executions before dispatching new ones.
                    while tasks.try_join_next().is_some() {}
                    let summary = self.dispatch_due(&mut tasks, Utc::now()).await;
                    if summary.due > 0 {
                        debug!(
                            due = summary.due,
                            admitted = summary.admitted,
                            busy = summary.busy,
                            "scheduler tick"
                        );
                    }
                }
            }
        }

        // Drain: in-flight executions finish and drop their leases.
        while tasks.join_next().await.is_some() {}
    }

    /// One scheduling pass: select due sheets, admit as many as the caps
    /// allow, spawn one execution per admitted lease.
    async fn dispatch_due(&self, tasks: &mut JoinSet<SyncResult>, now: chrono::DateTime<Utc>) -> TickSummary {
        let snapshot = self.store.snapshot().await;
        let entries: Vec<DueEntry> = self
            .sheet_configs
            .iter()
            .map(|config| DueEntry {
                config: config.clone(),
                last_sync_time: snapshot.get(&config.key()).and_then(|s| s.last_sync_time),
            })
            .collect();

        let due = select_due(now, &entries);
        let mut summary = TickSummary {
            due: due.len(),
            ..TickSummary::default()
        };

        for config in due {
            match self.admit_for(&config) {
                Ok(lease) => {
                    summary.admitted += 1;
                    let executor = Arc::clone(&self.executor);
                    tasks.spawn(async move {
                        let result = executor.execute(&config).await;
                        drop(lease);
                        result
                    });
                }
                Err(SyncError::Busy { reason }) => {
                    summary.busy += 1;
                    debug!(sheet = %config.key(), %reason, "candidate not admitted, stays due");
                }
                Err(error) => {
                    warn!(sheet = %config.key(), %error, "candidate skipped");
                }
            }
        }
        summary
    }

    fn admit_for(&self, config: &SheetConfig) -> Result<crate::engine::concurrency::Lease, SyncError> {
        let key = LeaseKey::for_sheet(config);
        // Only account-owned sheets consume a browser-profile slot on their
        // host; Master and Staff sheets are bounded by the global cap alone.
        let vps_id = match key {
            LeaseKey::Account(account_id) => Some(self.registry.vps_for_account(account_id)?),
            LeaseKey::Master | LeaseKey::Staff(_) => None,
        };
        self.concurrency.admit(key, vps_id)
    }

    /// Run one scheduling pass immediately and wait for every admitted
    /// execution to finish. Used by tests and out-of-band triggers.
    pub async fn tick_now(&self) -> TickSummary {
        let mut tasks = JoinSet::new();
        let summary = self.dispatch_due(&mut tasks, Utc::now()).await;
        while tasks.join_next().await.is_some() {}
        summary
    }

    /// Out-of-band sync of one account's sheets. `force` ignores the
    /// interval (deactivated sheets stay excluded); otherwise only sheets
    /// that are actually due run. The whole pass holds the account's lease,
    /// so it cannot interleave with scheduled executions.
    pub async fn trigger_account(
        &self,
        account_id: u32,
        force: bool,
    ) -> Result<Vec<SyncResult>, SyncError> {
        let mapping = self.registry.resolve(account_id)?;
        let vps_id = mapping.vps_id;

        let configs: Vec<SheetConfig> = self
            .sheet_configs
            .iter()
            .filter(|c| c.tier == SheetTier::Account && c.owner_id == Some(account_id))
            .cloned()
            .collect();

        let lease = self
            .concurrency
            .admit(LeaseKey::Account(account_id), Some(vps_id))?;

        let now = Utc::now();
        let mut results = Vec::new();
        for config in configs {
            let eligible = if force {
                config.auto_sync
            } else {
                is_due(now, &config, self.store.last_sync_time(config.key()).await)
            };
            if eligible {
                results.push(self.executor.execute(&config).await);
            }
        }
        drop(lease);
        Ok(results)
    }

    #[must_use]
    pub fn sheet_configs(&self) -> &[SheetConfig] {
        &self.sheet_configs
    }

    #[must_use]
    pub fn active_executions(&self) -> usize {
        self.concurrency.active_count()
    }
}
