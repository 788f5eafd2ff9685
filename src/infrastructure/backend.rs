//! External collaborator traits
//!
//! Two seams to the outside world: the spreadsheet backend the engine writes
//! to and the back-office datastore it reads from. The engine only ever sees
//! these traits; the wire protocol behind them is a deployment concern.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{AccountSummary, ListingRecord, MessageRecord, OrderRecord};

/// Whether a failed backend call is worth retrying on the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Rate limits, outages, timeouts. Retried on the next due cycle.
    Transient,
    /// Auth failures, missing sheets. Retrying without operator action is
    /// pointless.
    Permanent,
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient => f.write_str("transient"),
            Self::Permanent => f.write_str("permanent"),
        }
    }
}

/// A failed call to the sheet backend or the domain datastore.
#[derive(Error, Debug, Clone)]
#[error("{kind} backend error: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Transient,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Permanent,
            message: message.into(),
        }
    }

    /// Classify an HTTP-shaped failure: 429 and 5xx are worth retrying,
    /// everything else needs operator attention.
    #[must_use]
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let kind = if status == 429 || (500..=599).contains(&status) {
            BackendErrorKind::Transient
        } else {
            BackendErrorKind::Permanent
        };
        Self {
            kind,
            message: format!("HTTP {status}: {}", message.into()),
        }
    }

    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.kind, BackendErrorKind::Transient)
    }
}

/// One keyed sheet row. The key identifies the row for upserts (order id,
/// account id); the cells are the rendered column values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub key: String,
    pub cells: Vec<String>,
}

impl SheetRow {
    #[must_use]
    pub fn new(key: impl Into<String>, cells: Vec<String>) -> Self {
        Self {
            key: key.into(),
            cells,
        }
    }
}

/// 1-based inclusive row range; `end: None` reads to the end of the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub start: u32,
    pub end: Option<u32>,
}

impl RowRange {
    #[must_use]
    pub const fn all() -> Self {
        Self {
            start: 1,
            end: None,
        }
    }
}

/// The external spreadsheet service.
#[async_trait]
pub trait SheetBackend: Send + Sync {
    async fn read_rows(&self, sheet_id: &str, range: RowRange)
        -> Result<Vec<SheetRow>, BackendError>;

    /// Keyed upsert: rows whose key already exists on the sheet overwrite in
    /// place, the rest append in input order.
    async fn upsert_rows(&self, sheet_id: &str, rows: &[SheetRow]) -> Result<(), BackendError>;

    /// Provision an empty sheet with the given header row. Idempotent.
    async fn create_sheet(&self, sheet_id: &str, headers: &[&str]) -> Result<(), BackendError>;
}

/// The back-office datastore the engine reads from.
#[async_trait]
pub trait DomainDatastore: Send + Sync {
    async fn fetch_orders(&self, account_id: u32) -> Result<Vec<OrderRecord>, BackendError>;

    async fn fetch_listings(&self, account_id: u32) -> Result<Vec<ListingRecord>, BackendError>;

    async fn fetch_messages(&self, account_id: u32) -> Result<Vec<MessageRecord>, BackendError>;

    /// Orders assigned to one fulfillment user, across all accounts.
    async fn fetch_assigned_orders(&self, user_id: u32) -> Result<Vec<OrderRecord>, BackendError>;

    /// Fresh per-account aggregates for the Master tier.
    async fn fetch_account_summaries(&self) -> Result<Vec<AccountSummary>, BackendError>;
}
