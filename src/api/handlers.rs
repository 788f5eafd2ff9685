//! Handler functions for the control surface.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::api::dto::{
    AccountStatusResponse, ErrorResponse, HealthResponse, ServiceActionResponse,
    ServiceStatusResponse, SheetStatus, SyncRequest, SyncResponse,
};
use crate::engine::{AccountRegistry, SyncError, SyncScheduler, SyncStateStore};

pub struct AppContext {
    pub scheduler: Arc<SyncScheduler>,
    pub store: Arc<SyncStateStore>,
    pub registry: Arc<AccountRegistry>,
}

pub type SharedContext = Arc<AppContext>;

/// Engine error carried across the HTTP boundary.
pub struct ApiError(SyncError);

impl From<SyncError> for ApiError {
    fn from(error: SyncError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SyncError::AccountNotFound { .. } | SyncError::SheetNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            // Busy is not a failure: the caller retries after the in-flight
            // execution releases its lease.
            SyncError::Busy { .. } => StatusCode::CONFLICT,
            SyncError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SyncError::Backend { .. } | SyncError::Timeout { .. } => StatusCode::BAD_GATEWAY,
            SyncError::VpsNotConfigured { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn service_status(State(ctx): State<SharedContext>) -> Json<ServiceStatusResponse> {
    let snapshot = ctx.store.snapshot().await;
    let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut sheets: Vec<SheetStatus> = snapshot
        .into_iter()
        .map(|(key, state)| {
            *status_counts
                .entry(state.status.as_str().to_string())
                .or_default() += 1;
            SheetStatus {
                sheet: key.to_string(),
                state,
            }
        })
        .collect();
    sheets.sort_by(|a, b| a.sheet.cmp(&b.sheet));

    Json(ServiceStatusResponse {
        running: ctx.scheduler.is_running().await,
        active_executions: ctx.scheduler.active_executions(),
        accounts: ctx.registry.len(),
        status_counts,
        sheets,
    })
}

/// Out-of-band sync of one account. 404 for an unknown account, 409 while
/// another execution for the same account or its host is in flight.
pub async fn sync_account(
    State(ctx): State<SharedContext>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    info!(
        account_id = request.account_id,
        force = request.force_sync,
        "manual sync requested"
    );
    let results = ctx
        .scheduler
        .trigger_account(request.account_id, request.force_sync)
        .await?;
    Ok(Json(SyncResponse {
        account_id: request.account_id,
        results,
    }))
}

pub async fn start_service(State(ctx): State<SharedContext>) -> Json<ServiceActionResponse> {
    let changed = ctx.scheduler.start().await;
    Json(ServiceActionResponse {
        running: true,
        changed,
    })
}

/// Drains in-flight executions before responding, so a stop followed by
/// process exit never abandons a half-written sheet.
pub async fn stop_service(State(ctx): State<SharedContext>) -> Json<ServiceActionResponse> {
    let was_running = ctx.scheduler.is_running().await;
    ctx.scheduler.stop().await;
    Json(ServiceActionResponse {
        running: false,
        changed: was_running,
    })
}

pub async fn account_status(
    State(ctx): State<SharedContext>,
    Path(account_id): Path<u32>,
) -> Result<Json<AccountStatusResponse>, ApiError> {
    let mapping = ctx.registry.resolve(account_id)?.clone();

    let mut sheets = Vec::new();
    for config in ctx.scheduler.sheet_configs() {
        if config.owner_id == Some(account_id) {
            sheets.push(SheetStatus {
                sheet: config.key().to_string(),
                state: ctx.store.get(config.key()).await,
            });
        }
    }
    let counters = ctx.store.counters_for(account_id).await;

    Ok(Json(AccountStatusResponse {
        account_id,
        vps_id: mapping.vps_id,
        sheet_display_name: mapping.sheet_display_name,
        sheets,
        average_duration_ms: counters.average_duration_ms(),
        counters,
    }))
}
