//! Due selection
//!
//! Pure computation over a state snapshot: no I/O, no clock beyond the
//! injected `now`. The ordering guarantees starvation-freedom: a sheet that
//! has never synced always sorts ahead of one synced recently, and ties
//! break stably by owner id so earlier-configured accounts are serviced
//! first.

use chrono::{DateTime, Duration, Utc};

use crate::domain::SheetConfig;

/// One sheet together with the piece of state due selection needs.
#[derive(Debug, Clone)]
pub struct DueEntry {
    pub config: SheetConfig,
    pub last_sync_time: Option<DateTime<Utc>>,
}

/// Whether a single sheet is due at `now`.
#[must_use]
pub fn is_due(now: DateTime<Utc>, config: &SheetConfig, last_sync_time: Option<DateTime<Utc>>) -> bool {
    if !config.auto_sync {
        return false;
    }
    match last_sync_time {
        None => true,
        Some(last) => now - last >= Duration::minutes(i64::from(config.sync_interval_minutes)),
    }
}

/// The sheets currently due, ordered most-starved first: ascending
/// `last_sync_time` with never-synced sheets ahead of everything, then by
/// owner id (Master, having no owner, sorts first), then by sheet type for
/// full determinism.
#[must_use]
pub fn select_due(now: DateTime<Utc>, entries: &[DueEntry]) -> Vec<SheetConfig> {
    let mut due: Vec<&DueEntry> = entries
        .iter()
        .filter(|entry| is_due(now, &entry.config, entry.last_sync_time))
        .collect();
    // Option<DateTime> orders None first, which is exactly the
    // starvation-freedom rule.
    due.sort_by_key(|entry| {
        (
            entry.last_sync_time,
            entry.config.owner_id.unwrap_or(0),
            entry.config.sheet_type,
        )
    });
    due.into_iter().map(|entry| entry.config.clone()).collect()
}
