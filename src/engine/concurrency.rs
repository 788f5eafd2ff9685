//! Concurrency manager
//!
//! Bounds simultaneous sync executions with three nested limits: a global
//! cap, a per-VPS cap modeling the finite browser-profile slots of one host,
//! and per-owner mutual exclusion so two passes can never race on the same
//! sheet's row positions.
//!
//! Admission is strictly non-blocking: when any limit is exhausted the
//! candidate gets `Busy` and simply stays due for the next tick. Falling
//! behind schedule is preferred over queue growth during sustained overload.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::domain::{SheetConfig, SheetTier, VpsConfig};
use crate::engine::error::{BusyReason, SyncError};

/// Exclusion key of one lease: which owner's row positions it protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaseKey {
    Master,
    Account(u32),
    Staff(u32),
}

impl LeaseKey {
    #[must_use]
    pub fn for_sheet(config: &SheetConfig) -> Self {
        match (config.tier, config.owner_id) {
            (SheetTier::Account, Some(owner)) => Self::Account(owner),
            (SheetTier::Staff, Some(owner)) => Self::Staff(owner),
            _ => Self::Master,
        }
    }
}

impl std::fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Master => f.write_str("master"),
            Self::Account(id) => write!(f, "account {id}"),
            Self::Staff(id) => write!(f, "staff {id}"),
        }
    }
}

type InFlight = Arc<Mutex<HashSet<LeaseKey>>>;

fn lock_in_flight(in_flight: &InFlight) -> std::sync::MutexGuard<'_, HashSet<LeaseKey>> {
    in_flight.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Permission to run exactly one sync execution. Dropping the lease releases
/// every limit it holds, so release happens exactly once on every exit path.
#[derive(Debug)]
pub struct Lease {
    id: Uuid,
    key: LeaseKey,
    _global: OwnedSemaphorePermit,
    _vps: Option<OwnedSemaphorePermit>,
    in_flight: InFlight,
}

impl Lease {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn key(&self) -> LeaseKey {
        self.key
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        lock_in_flight(&self.in_flight).remove(&self.key);
    }
}

pub struct ConcurrencyManager {
    global: Arc<Semaphore>,
    global_cap: usize,
    per_vps: HashMap<u32, Arc<Semaphore>>,
    in_flight: InFlight,
}

impl ConcurrencyManager {
    #[must_use]
    pub fn new<'a>(global_cap: usize, vps: impl IntoIterator<Item = &'a VpsConfig>) -> Self {
        let per_vps = vps
            .into_iter()
            .map(|v| {
                (
                    v.vps_id,
                    Arc::new(Semaphore::new(v.max_concurrent_profiles)),
                )
            })
            .collect();
        Self {
            global: Arc::new(Semaphore::new(global_cap)),
            global_cap,
            per_vps,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Try to admit one execution. Non-blocking: returns `Busy` immediately
    /// when any limit is exhausted. `vps_id` is `None` for Master/Staff
    /// sheets, which consume no browser-profile slot.
    pub fn admit(&self, key: LeaseKey, vps_id: Option<u32>) -> Result<Lease, SyncError> {
        let vps_semaphore = match vps_id {
            Some(id) => Some(
                self.per_vps
                    .get(&id)
                    .ok_or(SyncError::VpsNotConfigured { vps_id: id })?
                    .clone(),
            ),
            None => None,
        };

        // Per-owner exclusion first: it is the cheapest check and the one
        // that protects row-position integrity.
        {
            let mut in_flight = lock_in_flight(&self.in_flight);
            if !in_flight.insert(key) {
                let reason = match key {
                    LeaseKey::Account(account_id) | LeaseKey::Staff(account_id) => {
                        BusyReason::Account { account_id }
                    }
                    LeaseKey::Master => BusyReason::Account { account_id: 0 },
                };
                return Err(SyncError::Busy { reason });
            }
        }

        let global = match self.global.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                lock_in_flight(&self.in_flight).remove(&key);
                return Err(SyncError::Busy {
                    reason: BusyReason::Global,
                });
            }
        };

        let vps_permit = match (vps_semaphore, vps_id) {
            (Some(semaphore), Some(id)) => match semaphore.try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    lock_in_flight(&self.in_flight).remove(&key);
                    drop(global);
                    return Err(SyncError::Busy {
                        reason: BusyReason::Vps { vps_id: id },
                    });
                }
            },
            _ => None,
        };

        Ok(Lease {
            id: Uuid::new_v4(),
            key,
            _global: global,
            _vps: vps_permit,
            in_flight: self.in_flight.clone(),
        })
    }

    /// Convenience wrapper for account-owned sheets.
    pub fn admit_account(&self, account_id: u32, vps_id: u32) -> Result<Lease, SyncError> {
        self.admit(LeaseKey::Account(account_id), Some(vps_id))
    }

    /// Number of executions currently holding a lease.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.global_cap - self.global.available_permits()
    }

    /// Owners currently in flight, for status reporting.
    #[must_use]
    pub fn in_flight_keys(&self) -> Vec<LeaseKey> {
        lock_in_flight(&self.in_flight).iter().copied().collect()
    }
}
