//! Infrastructure module - configuration, logging and external collaborators
//!
//! Everything here sits at the edge of the engine: static configuration
//! loading, tracing setup, the two external-backend traits (sheet backend and
//! domain datastore) with their in-memory reference implementations, and the
//! durable side of the sync-state store.

pub mod backend;
pub mod config;
pub mod logging;
pub mod memory;
pub mod state_repository;

pub use backend::{BackendError, BackendErrorKind, DomainDatastore, RowRange, SheetBackend, SheetRow};
pub use config::{AppConfig, DatabaseConfig, LoggingConfig, SchedulerConfig};
pub use memory::{InMemoryDatastore, InMemorySheetBackend};
pub use state_repository::{InMemoryStateRepository, SqliteStateRepository, SyncStateRepository};
