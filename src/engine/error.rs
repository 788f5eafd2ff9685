//! Engine error taxonomy
//!
//! Configuration errors are fatal at startup. Everything that happens inside
//! one sync execution is contained in that execution and recorded in its
//! sheet's state; it never crosses over to other accounts or crashes the
//! scheduler loop.

use thiserror::Error;

use crate::infrastructure::backend::BackendErrorKind;

/// Invariant violation detected while loading the static mapping. The
/// process refuses to start on any of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("duplicate account id {account_id} in mapping")]
    DuplicateAccount { account_id: u32 },

    #[error("external sheet id '{sheet_id}' is mapped to more than one account")]
    DuplicateSheetId { sheet_id: String },

    #[error("account {account_id} references unknown VPS {vps_id}")]
    UnknownVps { account_id: u32, vps_id: u32 },

    #[error("account {account_id} is not listed in any VPS roster")]
    UncoveredAccount { account_id: u32 },

    #[error("account {account_id} appears in the rosters of VPS {first} and VPS {second}")]
    OverlappingRosters { account_id: u32, first: u32, second: u32 },

    #[error("VPS {vps_id} roster lists account {account_id}, which is mapped to VPS {mapped_vps_id}")]
    RosterMismatch {
        vps_id: u32,
        account_id: u32,
        mapped_vps_id: u32,
    },

    #[error("VPS {vps_id} roster lists unknown account {account_id}")]
    UnknownRosterAccount { vps_id: u32, account_id: u32 },

    #[error("VPS rosters cover {covered} accounts but {configured} accounts are configured")]
    CoverageMismatch { covered: usize, configured: usize },

    #[error("account {account_id} has a non-positive sync interval")]
    InvalidInterval { account_id: u32 },

    #[error("expected {expected} {kind} profiles, found {actual}")]
    ProfileSplitMismatch {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Which of the three nested limits rejected an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyReason {
    /// Global concurrent-execution cap exhausted.
    Global,
    /// The owning host has no free browser-profile slot.
    Vps { vps_id: u32 },
    /// Another execution for the same account is already in flight.
    Account { account_id: u32 },
}

impl std::fmt::Display for BusyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => f.write_str("global cap reached"),
            Self::Vps { vps_id } => write!(f, "VPS {vps_id} profile cap reached"),
            Self::Account { account_id } => {
                write!(f, "account {account_id} already syncing")
            }
        }
    }
}

/// Per-execution and lookup errors.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error("account {account_id} is not configured")]
    AccountNotFound { account_id: u32 },

    #[error("sheet {key} has no resolvable target")]
    SheetNotFound { key: String },

    #[error("VPS {vps_id} has no concurrency budget configured")]
    VpsNotConfigured { vps_id: u32 },

    #[error("{kind} backend failure: {message}")]
    Backend {
        kind: BackendErrorKind,
        message: String,
    },

    #[error("template validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Not a failure: the candidate simply waits for the next tick.
    #[error("not admitted: {reason}")]
    Busy { reason: BusyReason },

    #[error("execution timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

impl SyncError {
    /// Whether the error should be retried promptly (next due cycle without
    /// waiting out a full interval).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Backend {
                kind: BackendErrorKind::Transient,
                ..
            } | Self::Timeout { .. }
        )
    }
}

impl From<crate::infrastructure::backend::BackendError> for SyncError {
    fn from(error: crate::infrastructure::backend::BackendError) -> Self {
        Self::Backend {
            kind: error.kind,
            message: error.message,
        }
    }
}
