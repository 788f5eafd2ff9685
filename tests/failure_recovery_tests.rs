//! Failure classification, retry behavior, graceful shutdown and sync-state
//! persistence across restarts.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sheetsync::domain::{
    AccountSheetMapping, BrowserProfile, BrowserProfileKind, OrderRecord, OrderStatus,
    SheetConfig, SheetTier, SheetType, SyncStatus, VpsConfig,
};
use sheetsync::engine::{AccountRegistry, ConcurrencyManager, SyncExecutor, SyncScheduler, SyncStateStore};
use sheetsync::infrastructure::state_repository::{
    InMemoryStateRepository, SqliteStateRepository, SyncStateRepository,
};
use sheetsync::infrastructure::{BackendError, InMemoryDatastore, InMemorySheetBackend};

fn mapping(account_id: u32) -> AccountSheetMapping {
    AccountSheetMapping {
        account_id,
        vps_id: 1,
        browser_profile: BrowserProfile {
            id: format!("profile-{account_id}"),
            kind: BrowserProfileKind::Multilogin,
        },
        external_sheet_id: format!("sheet-{account_id}"),
        sheet_display_name: format!("Account {account_id}"),
        sync_interval_minutes: 30,
        collection_schedule: vec![],
    }
}

fn sheet(account_id: u32) -> SheetConfig {
    SheetConfig {
        tier: SheetTier::Account,
        sheet_type: SheetType::OrdersProcessing,
        owner_id: Some(account_id),
        auto_sync: true,
        sync_interval_minutes: 30,
    }
}

fn order(account_id: u32, order_id: &str) -> OrderRecord {
    OrderRecord {
        order_id: order_id.to_string(),
        account_id,
        customer_name: "Jane Buyer".to_string(),
        customer_email: "jane@example.com".to_string(),
        status: OrderStatus::Pending,
        order_date: Utc::now(),
        total: 19.99,
        assigned_to: None,
        tracking_number: None,
        supplier_order_id: None,
        blacklisted: false,
        notes: None,
    }
}

struct Harness {
    scheduler: Arc<SyncScheduler>,
    store: Arc<SyncStateStore>,
    backend: Arc<InMemorySheetBackend>,
    datastore: Arc<InMemoryDatastore>,
}

fn harness(accounts: u32, repository: Arc<dyn SyncStateRepository>) -> Harness {
    let mappings: Vec<AccountSheetMapping> = (1..=accounts).map(mapping).collect();
    let hosts = vec![VpsConfig {
        vps_id: 1,
        account_ids: (1..=accounts).collect(),
        max_concurrent_profiles: 6,
    }];
    let registry = Arc::new(AccountRegistry::from_config(mappings, hosts, None).unwrap());
    let store = Arc::new(SyncStateStore::new(repository));
    let concurrency = Arc::new(ConcurrencyManager::new(10, registry.vps_configs()));
    let backend = Arc::new(InMemorySheetBackend::new());
    let datastore = Arc::new(InMemoryDatastore::new());

    let executor = Arc::new(SyncExecutor::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        datastore.clone(),
        backend.clone(),
        "master-dashboard",
        Duration::from_secs(5),
    ));
    let scheduler = Arc::new(SyncScheduler::new(
        registry,
        Arc::clone(&store),
        concurrency,
        executor,
        (1..=accounts).map(sheet).collect(),
        Duration::from_millis(10),
    ));
    Harness {
        scheduler,
        store,
        backend,
        datastore,
    }
}

#[tokio::test]
async fn transient_failure_retries_and_recovers_on_the_next_cycle() {
    let h = harness(1, Arc::new(InMemoryStateRepository::new()));
    h.backend
        .push_failure(BackendError::from_http_status(503, "service unavailable"))
        .await;

    h.scheduler.tick_now().await;
    let state = h.store.get(sheet(1).key()).await;
    assert_eq!(state.status, SyncStatus::Error);
    assert_eq!(state.consecutive_errors, 1);
    // Never completed, so the sheet stays due immediately.
    assert!(state.last_sync_time.is_none());

    let retry = h.scheduler.tick_now().await;
    assert_eq!(retry.admitted, 1);
    let state = h.store.get(sheet(1).key()).await;
    assert_eq!(state.status, SyncStatus::Completed);
    assert_eq!(state.consecutive_errors, 0);
}

#[tokio::test]
async fn permanent_failure_is_recorded_without_crashing_other_accounts() {
    let h = harness(2, Arc::new(InMemoryStateRepository::new()));
    // One scripted failure for the whole cycle. Which account's call pops it
    // depends on task interleaving, so assert on the pair of outcomes.
    h.backend
        .push_failure(BackendError::from_http_status(403, "forbidden"))
        .await;

    let summary = h.scheduler.tick_now().await;
    assert_eq!(summary.admitted, 2);

    let states = [
        h.store.get(sheet(1).key()).await,
        h.store.get(sheet(2).key()).await,
    ];
    let failed: Vec<_> = states
        .iter()
        .filter(|s| s.status == SyncStatus::Error)
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].last_error.as_deref().unwrap().contains("forbidden"));
    assert_eq!(
        states
            .iter()
            .filter(|s| s.status == SyncStatus::Completed)
            .count(),
        1
    );
}

#[tokio::test]
async fn consecutive_failures_accumulate_until_a_success_resets_them() {
    let h = harness(1, Arc::new(InMemoryStateRepository::new()));
    for _ in 0..3 {
        h.backend
            .push_failure(BackendError::from_http_status(500, "boom"))
            .await;
        h.scheduler.tick_now().await;
    }
    assert_eq!(h.store.get(sheet(1).key()).await.consecutive_errors, 3);

    h.scheduler.tick_now().await;
    let state = h.store.get(sheet(1).key()).await;
    assert_eq!(state.consecutive_errors, 0);
    assert_eq!(state.status, SyncStatus::Completed);
}

#[tokio::test]
async fn sync_state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");

    {
        let repository = Arc::new(SqliteStateRepository::connect(&path).await.unwrap());
        let h = harness(1, repository);
        h.datastore.set_orders(1, vec![order(1, "ORD-1")]).await;
        h.scheduler.tick_now().await;
        assert_eq!(h.store.get(sheet(1).key()).await.status, SyncStatus::Completed);
    }

    // New process: hydrate from the same database file.
    let repository = Arc::new(SqliteStateRepository::connect(&path).await.unwrap());
    let restarted = harness(1, repository);
    let hydrated = restarted.store.hydrate().await.unwrap();
    assert_eq!(hydrated, 1);

    let state = restarted.store.get(sheet(1).key()).await;
    assert_eq!(state.status, SyncStatus::Completed);
    assert!(state.last_sync_time.is_some());
    assert_eq!(state.last_row, 2);
}

#[tokio::test]
async fn interrupted_execution_loads_as_pending_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");

    {
        let repository = Arc::new(SqliteStateRepository::connect(&path).await.unwrap());
        let store = SyncStateStore::new(repository);
        // Simulates a crash mid-execution: Syncing is persisted, the
        // completion never arrives.
        store.mark_syncing(sheet(1).key()).await;
    }

    let repository = Arc::new(SqliteStateRepository::connect(&path).await.unwrap());
    let store = SyncStateStore::new(repository);
    store.hydrate().await.unwrap();
    assert_eq!(store.get(sheet(1).key()).await.status, SyncStatus::Pending);
}

#[tokio::test]
async fn scheduler_start_is_idempotent_and_stop_drains() {
    let h = harness(3, Arc::new(InMemoryStateRepository::new()));

    assert!(h.scheduler.start().await);
    assert!(!h.scheduler.start().await);
    assert!(h.scheduler.is_running().await);

    // Let the loop run a few ticks, then stop and verify the drain.
    tokio::time::sleep(Duration::from_millis(60)).await;
    h.scheduler.stop().await;
    assert!(!h.scheduler.is_running().await);
    assert_eq!(h.scheduler.active_executions(), 0);

    for id in 1..=3 {
        assert_eq!(h.store.get(sheet(id).key()).await.status, SyncStatus::Completed);
    }

    // A stopped scheduler can be started again.
    assert!(h.scheduler.start().await);
    h.scheduler.stop().await;
}
