//! Account-to-infrastructure mapping types
//!
//! Each eBay account is pinned to one VPS host and one browser-automation
//! profile, and owns exactly one external spreadsheet. These records are
//! loaded once from static configuration and are immutable at runtime;
//! changing them requires a controlled restart of the scheduler.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// The closed set of supported browser-automation profile providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserProfileKind {
    Hidemyacc,
    Multilogin,
}

impl BrowserProfileKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hidemyacc => "hidemyacc",
            Self::Multilogin => "multilogin",
        }
    }
}

impl fmt::Display for BrowserProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrowserProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hidemyacc" => Ok(Self::Hidemyacc),
            "multilogin" => Ok(Self::Multilogin),
            other => Err(format!("unknown browser profile kind: {other}")),
        }
    }
}

/// A browser-automation profile bound 1:1 to an eBay account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserProfile {
    pub id: String,
    pub kind: BrowserProfileKind,
}

/// One entry of the static account -> VPS -> profile -> sheet mapping.
///
/// Invariants (enforced by `AccountRegistry` at load time):
/// - `account_id` is unique across the whole table
/// - `external_sheet_id` is unique across the whole table
/// - `sync_interval_minutes` is strictly positive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSheetMapping {
    pub account_id: u32,
    pub vps_id: u32,
    pub browser_profile: BrowserProfile,
    pub external_sheet_id: String,
    pub sheet_display_name: String,
    pub sync_interval_minutes: u32,
    /// Ordered times-of-day at which full collection passes are preferred.
    #[serde(default)]
    pub collection_schedule: Vec<NaiveTime>,
}

/// Per-host configuration: which accounts live on the host and how many
/// browser profiles it can run simultaneously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpsConfig {
    pub vps_id: u32,
    pub account_ids: BTreeSet<u32>,
    #[serde(default = "VpsConfig::default_max_concurrent_profiles")]
    pub max_concurrent_profiles: usize,
}

impl VpsConfig {
    pub(crate) const fn default_max_concurrent_profiles() -> usize {
        6
    }
}

/// Expected browser-profile split used by the load-time mapping validation.
///
/// The original deployment asserted fixed counts; here the expected totals
/// come from configuration so the assertion follows whatever is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSplit {
    pub hidemyacc: usize,
    pub multilogin: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_profile_kind_round_trips_through_str() {
        for kind in [BrowserProfileKind::Hidemyacc, BrowserProfileKind::Multilogin] {
            assert_eq!(kind.as_str().parse::<BrowserProfileKind>().unwrap(), kind);
        }
        assert!("chrome".parse::<BrowserProfileKind>().is_err());
    }
}
