//! Sheet configuration types
//!
//! A sheet is identified by its (tier, type, owner) triple. Sheets are never
//! deleted while referencing data exists; deactivation sets `auto_sync` to
//! false and the scheduler stops considering the sheet.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three output shapes of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetTier {
    /// Admin aggregate: one row per account.
    Master,
    /// Per-eBay-account detail: one row per order.
    Account,
    /// Per-fulfillment-user workflow: one row per assigned order.
    Staff,
}

impl SheetTier {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Account => "account",
            Self::Staff => "staff",
        }
    }
}

impl fmt::Display for SheetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of sheet types the back-office provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetType {
    OrdersImport,
    OrdersProcessing,
    TrackingExport,
    PerformanceReport,
    BlacklistCheck,
    StaffWorkload,
}

impl SheetType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OrdersImport => "orders_import",
            Self::OrdersProcessing => "orders_processing",
            Self::TrackingExport => "tracking_export",
            Self::PerformanceReport => "performance_report",
            Self::BlacklistCheck => "blacklist_check",
            Self::StaffWorkload => "staff_workload",
        }
    }
}

impl fmt::Display for SheetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SheetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orders_import" => Ok(Self::OrdersImport),
            "orders_processing" => Ok(Self::OrdersProcessing),
            "tracking_export" => Ok(Self::TrackingExport),
            "performance_report" => Ok(Self::PerformanceReport),
            "blacklist_check" => Ok(Self::BlacklistCheck),
            "staff_workload" => Ok(Self::StaffWorkload),
            other => Err(format!("unknown sheet type: {other}")),
        }
    }
}

/// One configured sheet: what shape it has, who owns it and how often it syncs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetConfig {
    pub tier: SheetTier,
    pub sheet_type: SheetType,
    /// Owning account (Account tier) or fulfillment user (Staff tier).
    /// Absent for the Master tier.
    pub owner_id: Option<u32>,
    pub auto_sync: bool,
    pub sync_interval_minutes: u32,
}

impl SheetConfig {
    #[must_use]
    pub fn key(&self) -> SheetKey {
        SheetKey {
            tier: self.tier,
            sheet_type: self.sheet_type,
            owner_id: self.owner_id,
        }
    }
}

/// Stable identity of a sheet, used as the key of the sync-state map and of
/// the persisted state table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SheetKey {
    pub tier: SheetTier,
    pub sheet_type: SheetType,
    pub owner_id: Option<u32>,
}

impl fmt::Display for SheetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner_id {
            Some(owner) => write!(f, "{}:{}:{}", self.tier, owner, self.sheet_type),
            None => write!(f, "{}:{}", self.tier, self.sheet_type),
        }
    }
}

impl FromStr for SheetKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            ["master", sheet_type] => Ok(Self {
                tier: SheetTier::Master,
                sheet_type: sheet_type.parse()?,
                owner_id: None,
            }),
            [tier, owner, sheet_type] => {
                let tier = match *tier {
                    "account" => SheetTier::Account,
                    "staff" => SheetTier::Staff,
                    other => return Err(format!("unknown sheet tier: {other}")),
                };
                let owner: u32 = owner
                    .parse()
                    .map_err(|_| format!("invalid owner id in sheet key: {s}"))?;
                Ok(Self {
                    tier,
                    sheet_type: sheet_type.parse()?,
                    owner_id: Some(owner),
                })
            }
            _ => Err(format!("malformed sheet key: {s}")),
        }
    }
}

impl Serialize for SheetKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SheetKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_key_display_and_parse_round_trip() {
        let keys = [
            SheetKey {
                tier: SheetTier::Master,
                sheet_type: SheetType::PerformanceReport,
                owner_id: None,
            },
            SheetKey {
                tier: SheetTier::Account,
                sheet_type: SheetType::OrdersProcessing,
                owner_id: Some(12),
            },
            SheetKey {
                tier: SheetTier::Staff,
                sheet_type: SheetType::StaffWorkload,
                owner_id: Some(3),
            },
        ];
        for key in keys {
            let parsed: SheetKey = key.to_string().parse().unwrap();
            assert_eq!(parsed, key);
        }
    }

    #[test]
    fn malformed_sheet_keys_are_rejected() {
        assert!("".parse::<SheetKey>().is_err());
        assert!("master".parse::<SheetKey>().is_err());
        assert!("account:x:orders_import".parse::<SheetKey>().is_err());
        assert!("account:1:unknown_type".parse::<SheetKey>().is_err());
    }
}
