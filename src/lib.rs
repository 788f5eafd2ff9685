//! Multi-account spreadsheet synchronization engine.
//!
//! Keeps the operational sheets of a multi-account e-commerce back office in
//! step with the domain datastore. Accounts run isolated browser profiles
//! spread over several hosts; the engine periodically pushes each account's
//! orders, listings and messages to that account's sheet, aggregates across
//! accounts onto a master dashboard, and derives per-staff workload sheets.
//!
//! Layers:
//! - `domain`: entities and value objects (accounts, sheets, records, state)
//! - `infrastructure`: configuration, logging, backend traits, persistence
//! - `engine`: registry, due selection, concurrency, templates, executor,
//!   scheduler
//! - `api`: HTTP control surface

pub mod api;
pub mod domain;
pub mod engine;
pub mod infrastructure;

pub use engine::{
    AccountRegistry, ConcurrencyManager, SyncError, SyncExecutor, SyncScheduler, SyncStateStore,
};
pub use infrastructure::AppConfig;
