//! Domain module - core entities and value objects of the sync engine
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod account;
pub mod records;
pub mod sheet;
pub mod sync_state;

// Re-export commonly used items for convenience
pub use account::{AccountSheetMapping, BrowserProfile, BrowserProfileKind, ProfileSplit, VpsConfig};
pub use records::{
    AccountSummary, DomainBatch, ListingRecord, MessageRecord, OrderRecord, OrderStatus,
};
pub use sheet::{SheetConfig, SheetKey, SheetTier, SheetType};
pub use sync_state::{AccountCounters, SyncResult, SyncState, SyncStatus};
