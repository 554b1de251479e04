//! Single-flight registry: at most one run per account at a time.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

/// Accounts with a run in progress. Clones share one registry.
#[derive(Debug, Clone, Default)]
pub struct InFlightAccounts {
    accounts: Arc<Mutex<HashSet<String>>>,
}

impl InFlightAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim an account, failing with [`Error::SyncInProgress`] if it is already claimed.
    pub fn acquire(&self, account: &str) -> Result<FlightGuard> {
        if !self.lock().insert(account.to_string()) {
            return Err(Error::SyncInProgress(account.to_string()));
        }
        Ok(FlightGuard {
            registry: self.clone(),
            account: account.to_string(),
        })
    }

    pub fn contains(&self, account: &str) -> bool {
        self.lock().contains(account)
    }
}

/// Releases the account when dropped
#[derive(Debug)]
pub struct FlightGuard {
    registry: InFlightAccounts,
    account: String,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.account);
    }
}
