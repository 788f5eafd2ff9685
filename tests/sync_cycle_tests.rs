//! End-to-end scheduling cycles against the in-memory collaborators:
//! admission under the concurrency caps, cursor advancement, master
//! aggregation and manual triggers.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use sheetsync::domain::{
    AccountSheetMapping, AccountSummary, BrowserProfile, BrowserProfileKind, OrderRecord,
    OrderStatus, SheetConfig, SheetTier, SheetType, SyncStatus, VpsConfig,
};
use sheetsync::engine::{
    AccountRegistry, ConcurrencyManager, SyncError, SyncExecutor, SyncScheduler, SyncStateStore,
};
use sheetsync::infrastructure::state_repository::InMemoryStateRepository;
use sheetsync::infrastructure::{InMemoryDatastore, InMemorySheetBackend};

struct Harness {
    scheduler: Arc<SyncScheduler>,
    store: Arc<SyncStateStore>,
    backend: Arc<InMemorySheetBackend>,
    datastore: Arc<InMemoryDatastore>,
    concurrency: Arc<ConcurrencyManager>,
}

fn mapping(account_id: u32, vps_id: u32) -> AccountSheetMapping {
    AccountSheetMapping {
        account_id,
        vps_id,
        browser_profile: BrowserProfile {
            id: format!("profile-{account_id}"),
            kind: BrowserProfileKind::Hidemyacc,
        },
        external_sheet_id: format!("sheet-{account_id}"),
        sheet_display_name: format!("Account {account_id}"),
        sync_interval_minutes: 30,
        collection_schedule: vec![],
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

fn account_sheet(account_id: u32) -> SheetConfig {
    SheetConfig {
        tier: SheetTier::Account,
        sheet_type: SheetType::OrdersProcessing,
        owner_id: Some(account_id),
        auto_sync: true,
        sync_interval_minutes: 30,
    }
}

/// All accounts on one host with the given caps, one orders sheet each.
fn harness(accounts: u32, vps_cap: usize, global_cap: usize) -> Harness {
    harness_with_sheets(
        accounts,
        vps_cap,
        global_cap,
        (1..=accounts).map(account_sheet).collect(),
    )
}

fn harness_with_sheets(
    accounts: u32,
    vps_cap: usize,
    global_cap: usize,
    sheets: Vec<SheetConfig>,
) -> Harness {
    let mappings: Vec<AccountSheetMapping> = (1..=accounts).map(|id| mapping(id, 1)).collect();
    let hosts = vec![VpsConfig {
        vps_id: 1,
        account_ids: (1..=accounts).collect(),
        max_concurrent_profiles: vps_cap,
    }];
    let registry = Arc::new(AccountRegistry::from_config(mappings, hosts, None).unwrap());
    let store = Arc::new(SyncStateStore::new(Arc::new(InMemoryStateRepository::new())));
    let concurrency = Arc::new(ConcurrencyManager::new(global_cap, registry.vps_configs()));
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
        Arc::clone(&concurrency),
        executor,
        sheets,
        Duration::from_millis(20),
    ));

    Harness {
        scheduler,
        store,
        backend,
        datastore,
        concurrency,
    }
}

#[tokio::test]
async fn one_cycle_syncs_every_account_within_the_caps() {
    let h = harness(6, 6, 10);
    for id in 1..=6 {
        h.datastore
            .set_orders(id, vec![order(id, &format!("ORD-{id}"))])
            .await;
    }

    let summary = h.scheduler.tick_now().await;
    assert_eq!(summary.due, 6);
    assert_eq!(summary.admitted, 6);
    assert_eq!(summary.busy, 0);

    for id in 1..=6 {
        let state = h.store.get(account_sheet(id).key()).await;
        assert_eq!(state.status, SyncStatus::Completed, "account {id}");
        // Row 1 is the header; one appended order moves the cursor to 2.
        assert_eq!(state.last_row, 2);
        assert_eq!(h.backend.row_count(&format!("sheet-{id}")).await, 1);
    }
    assert_eq!(h.concurrency.active_count(), 0);
}

#[tokio::test]
async fn vps_overload_defers_excess_accounts_to_the_next_tick() {
    // 8 accounts on a host with 6 profile slots.
    let h = harness(8, 6, 10);

    let first = h.scheduler.tick_now().await;
    assert_eq!(first.due, 8);
    assert_eq!(first.admitted, 6);
    assert_eq!(first.busy, 2);

    // The deferred two are still due; the six just synced are not.
    let second = h.scheduler.tick_now().await;
    assert_eq!(second.due, 2);
    assert_eq!(second.admitted, 2);
    assert_eq!(second.busy, 0);

    for id in 1..=8 {
        let state = h.store.get(account_sheet(id).key()).await;
        assert_eq!(state.status, SyncStatus::Completed, "account {id}");
    }
}

#[tokio::test]
async fn global_cap_limits_one_cycle_even_with_free_profile_slots() {
    let h = harness(5, 6, 3);
    let summary = h.scheduler.tick_now().await;
    assert_eq!(summary.admitted, 3);
    assert_eq!(summary.busy, 2);
}

#[tokio::test]
async fn master_dashboard_aggregates_one_row_per_account() {
    let mut sheets: Vec<SheetConfig> = (1..=2).map(account_sheet).collect();
    sheets.push(SheetConfig {
        tier: SheetTier::Master,
        sheet_type: SheetType::PerformanceReport,
        owner_id: None,
        auto_sync: true,
        sync_interval_minutes: 15,
    });
    let h = harness_with_sheets(2, 6, 10, sheets);
    h.datastore
        .set_summaries(vec![
            AccountSummary {
                account_id: 1,
                display_name: "Account 1".to_string(),
                orders_pending: 1,
                orders_processing: 0,
                orders_shipped: 4,
                revenue: 250.0,
                assigned_orders: 1,
                sync_ok: true,
                last_error: None,
            },
            AccountSummary {
                account_id: 2,
                display_name: "Account 2".to_string(),
                orders_pending: 0,
                orders_processing: 2,
                orders_shipped: 1,
                revenue: 99.0,
                assigned_orders: 0,
                sync_ok: false,
                last_error: Some("503".to_string()),
            },
        ])
        .await;

    let summary = h.scheduler.tick_now().await;
    assert_eq!(summary.admitted, 3);

    let rows = h.backend.rows("master-dashboard").await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].key, "1");
    assert_eq!(rows[1].key, "2");
}

#[tokio::test]
async fn forced_trigger_ignores_the_interval() {
    let h = harness(1, 6, 10);
    h.datastore.set_orders(1, vec![order(1, "ORD-1")]).await;

    assert_eq!(h.scheduler.tick_now().await.admitted, 1);

    // Freshly synced: a plain trigger finds nothing due.
    let unforced = h.scheduler.trigger_account(1, false).await.unwrap();
    assert!(unforced.is_empty());

    let forced = h.scheduler.trigger_account(1, true).await.unwrap();
    assert_eq!(forced.len(), 1);
    assert!(forced[0].success);
}

#[tokio::test]
async fn trigger_for_unknown_account_is_not_found() {
    let h = harness(2, 6, 10);
    let result = h.scheduler.trigger_account(99, true).await;
    assert!(matches!(
        result,
        Err(SyncError::AccountNotFound { account_id: 99 })
    ));
}

#[tokio::test]
async fn trigger_conflicts_with_an_in_flight_execution() {
    let h = harness(1, 6, 10);
    let held = h.concurrency.admit_account(1, 1).unwrap();

    let result = h.scheduler.trigger_account(1, true).await;
    assert!(matches!(result, Err(SyncError::Busy { .. })));

    drop(held);
    assert!(h.scheduler.trigger_account(1, true).await.is_ok());
}

#[tokio::test]
async fn rerunning_a_cycle_is_idempotent_per_order_key() {
    let h = harness(1, 6, 10);
    h.datastore
        .set_orders(1, vec![order(1, "ORD-1"), order(1, "ORD-2")])
        .await;

    h.scheduler.tick_now().await;
    h.scheduler.trigger_account(1, true).await.unwrap();

    // Same two keys both times: overwritten in place, never duplicated.
    assert_eq!(h.backend.row_count("sheet-1").await, 2);
    let state = h.store.get(account_sheet(1).key()).await;
    assert_eq!(state.last_row, 3);
}
