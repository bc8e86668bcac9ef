//! Named locks serializing operations on a shared parent object.
//!
//! ARM rejects concurrent writes to children of the same namespace or
//! Digital Twins instance with `409 Conflict`, so writers take the lock for
//! the parent's `(kind, name)` first.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// A registry of async mutexes keyed by `(kind, name)`.
#[derive(Debug, Clone, Default)]
pub struct NameLocks {
    locks: Arc<Mutex<HashMap<(String, String), Arc<Mutex<()>>>>>,
}

impl NameLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock on `name` of the given `kind`.
    ///
    /// The lock is held until the returned guard is dropped.
    pub async fn lock(&self, kind: &str, name: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().await;
            locks
                .entry((kind.to_string(), name.to_string()))
                .or_default()
                .clone()
        };
        tracing::trace!(kind, name, "Waiting for lock");
        entry.lock_owned().await
    }
}
