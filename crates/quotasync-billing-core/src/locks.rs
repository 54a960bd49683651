//! Per-user write serialization

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use quotasync_types::UserId;

/// One async mutex per user.
///
/// Settlement, reconciliation, binding and re-sync of a user's rows hold the
/// guard for their whole read-modify-write.
#[derive(Debug, Clone, Default)]
pub struct UserLocks {
    locks: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`'s rows
    pub async fn lock(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Number of users that have been locked at least once
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no user has been locked yet
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
