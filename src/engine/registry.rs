//! Account registry
//!
//! Pure lookup over the immutable account -> VPS -> profile -> sheet table.
//! All uniqueness and coverage invariants are checked once at construction;
//! a violation keeps the process from starting. Lookups fail loudly for
//! unknown ids, never silently return defaults.

use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::domain::{AccountSheetMapping, BrowserProfileKind, ProfileSplit, VpsConfig};
use crate::engine::error::{ConfigError, SyncError};

#[derive(Debug)]
pub struct AccountRegistry {
    mappings: BTreeMap<u32, AccountSheetMapping>,
    vps: BTreeMap<u32, VpsConfig>,
}

impl AccountRegistry {
    /// Build and validate the registry from loaded configuration.
    ///
    /// `expected_profiles` generalizes the fixed profile-count assertion of
    /// the original deployment: when present, the actual hidemyacc/multilogin
    /// split must match whatever is configured.
    pub fn from_config(
        accounts: Vec<AccountSheetMapping>,
        vps: Vec<VpsConfig>,
        expected_profiles: Option<ProfileSplit>,
    ) -> Result<Self, ConfigError> {
        let mut mappings = BTreeMap::new();
        let mut sheet_ids = BTreeSet::new();
        for account in accounts {
            if account.sync_interval_minutes == 0 {
                return Err(ConfigError::InvalidInterval {
                    account_id: account.account_id,
                });
            }
            if !sheet_ids.insert(account.external_sheet_id.clone()) {
                return Err(ConfigError::DuplicateSheetId {
                    sheet_id: account.external_sheet_id,
                });
            }
            if mappings
                .insert(account.account_id, account.clone())
                .is_some()
            {
                return Err(ConfigError::DuplicateAccount {
                    account_id: account.account_id,
                });
            }
        }

        let vps: BTreeMap<u32, VpsConfig> =
            vps.into_iter().map(|v| (v.vps_id, v)).collect();

        Self::validate_account_mapping(&mappings, &vps, expected_profiles)?;

        info!(
            accounts = mappings.len(),
            hosts = vps.len(),
            "account registry validated"
        );
        Ok(Self { mappings, vps })
    }

    /// Enforce the structural invariants between the mapping table and the
    /// VPS rosters, plus the optional browser-profile split assertion.
    fn validate_account_mapping(
        mappings: &BTreeMap<u32, AccountSheetMapping>,
        vps: &BTreeMap<u32, VpsConfig>,
        expected_profiles: Option<ProfileSplit>,
    ) -> Result<(), ConfigError> {
        // Every account must reference an existing VPS.
        for account in mappings.values() {
            if !vps.contains_key(&account.vps_id) {
                return Err(ConfigError::UnknownVps {
                    account_id: account.account_id,
                    vps_id: account.vps_id,
                });
            }
        }

        // Rosters must be consistent with the per-account vps_id, disjoint
        // across hosts, and jointly cover every account exactly once.
        let mut seen: BTreeMap<u32, u32> = BTreeMap::new();
        let mut covered = 0usize;
        for host in vps.values() {
            for &account_id in &host.account_ids {
                let Some(account) = mappings.get(&account_id) else {
                    return Err(ConfigError::UnknownRosterAccount {
                        vps_id: host.vps_id,
                        account_id,
                    });
                };
                if account.vps_id != host.vps_id {
                    return Err(ConfigError::RosterMismatch {
                        vps_id: host.vps_id,
                        account_id,
                        mapped_vps_id: account.vps_id,
                    });
                }
                if let Some(&first) = seen.get(&account_id) {
                    return Err(ConfigError::OverlappingRosters {
                        account_id,
                        first,
                        second: host.vps_id,
                    });
                }
                seen.insert(account_id, host.vps_id);
                covered += 1;
            }
        }
        if covered != mappings.len() {
            if let Some(account_id) = mappings.keys().find(|id| !seen.contains_key(id)) {
                return Err(ConfigError::UncoveredAccount {
                    account_id: *account_id,
                });
            }
            return Err(ConfigError::CoverageMismatch {
                covered,
                configured: mappings.len(),
            });
        }

        if let Some(split) = expected_profiles {
            let count = |kind: BrowserProfileKind| {
                mappings
                    .values()
                    .filter(|a| a.browser_profile.kind == kind)
                    .count()
            };
            let hidemyacc = count(BrowserProfileKind::Hidemyacc);
            if hidemyacc != split.hidemyacc {
                return Err(ConfigError::ProfileSplitMismatch {
                    kind: "hidemyacc",
                    expected: split.hidemyacc,
                    actual: hidemyacc,
                });
            }
            let multilogin = count(BrowserProfileKind::Multilogin);
            if multilogin != split.multilogin {
                return Err(ConfigError::ProfileSplitMismatch {
                    kind: "multilogin",
                    expected: split.multilogin,
                    actual: multilogin,
                });
            }
        }

        Ok(())
    }

    pub fn resolve(&self, account_id: u32) -> Result<&AccountSheetMapping, SyncError> {
        self.mappings
            .get(&account_id)
            .ok_or(SyncError::AccountNotFound { account_id })
    }

    /// All configured account ids, in ascending order.
    #[must_use]
    pub fn all_accounts(&self) -> Vec<u32> {
        self.mappings.keys().copied().collect()
    }

    #[must_use]
    pub fn accounts_for_vps(&self, vps_id: u32) -> BTreeSet<u32> {
        self.vps
            .get(&vps_id)
            .map(|v| v.account_ids.clone())
            .unwrap_or_default()
    }

    pub fn vps_for_account(&self, account_id: u32) -> Result<u32, SyncError> {
        self.resolve(account_id).map(|a| a.vps_id)
    }

    pub fn vps_configs(&self) -> impl Iterator<Item = &VpsConfig> {
        self.vps.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}
