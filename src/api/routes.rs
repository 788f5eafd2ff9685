//! Route definitions for the control surface.

use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::SharedContext;

pub fn create_router(context: SharedContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::service_status))
        .route("/sync/account", post(handlers::sync_account))
        .route("/service/start", post(handlers::start_service))
        .route("/service/stop", post(handlers::stop_service))
        .route("/account/:account_id/status", get(handlers::account_status))
        .with_state(context)
}
