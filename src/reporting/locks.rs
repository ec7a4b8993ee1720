use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per issuing store.
///
/// Reporting reads the issuer's last reported hash and writes the next one,
/// so two invoices of the same store must never be in flight together.
/// Different stores do not contend.
#[derive(Debug, Default)]
pub struct IssuerLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl IssuerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the store's lock. Released when the guard is dropped.
    pub async fn lock(&self, store_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(store_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

}
