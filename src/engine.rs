//! Engine module - the sheet synchronization engine proper
//!
//! Data flow per tick: the scheduler snapshots sync state, asks the due
//! selector for due sheets, lets the concurrency manager admit a bounded
//! subset, and dispatches one executor run per admitted lease. Results flow
//! back into the state store; aggregates surface on the Master tier on the
//! next pass.

pub mod concurrency;
pub mod due;
pub mod error;
pub mod executor;
pub mod registry;
pub mod scheduler;
pub mod state_store;
pub mod template;

pub use concurrency::{ConcurrencyManager, Lease, LeaseKey};
pub use due::{is_due, select_due, DueEntry};
pub use error::{BusyReason, ConfigError, SyncError};
pub use executor::SyncExecutor;
pub use registry::AccountRegistry;
pub use scheduler::{SyncScheduler, TickSummary};
pub use state_store::SyncStateStore;
pub use template::{transform, Priority, TemplateOutput};
