//! Per-account mutual exclusion for checkpoint and label-create sequences.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Map from account email to that account's lock. Label resolution and
/// checkpoint read-then-write sequences hold the account's lock so two
/// concurrent units of work cannot interleave writes for the same account.
///
/// Entries are never evicted: the map holds one `Arc<Mutex<()>>` per
/// account ever seen, bounded by the registered account count.
#[derive(Clone, Default)]
pub struct AccountLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `account_email`, creating it on first use.
    pub async fn acquire(&self, account_email: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(account_email.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
