use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// The verifier-facing record of an authorization request, keyed by the same
/// id as the holder-facing transaction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestSession {
    pub id: String,
    pub nonce: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub issued_at: u64,
    pub expired_in: u64,
    /// Epoch seconds of consumption; 0 means unconsumed. Once positive the
    /// request is terminally consumed.
    pub consumed_at: u64,
}

impl RequestSession {
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.issued_at.saturating_add(self.expired_in)
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_at > 0
    }
}

/// Per-request-id mutexes serializing the consumption read-then-write, so
/// two concurrent consumers cannot both observe `consumed_at == 0`.
#[derive(Debug, Default, Clone)]
pub(crate) struct SessionLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
    pub(crate) async fn acquire(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .await
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Remove the id's entry once no guard or waiter references it anymore.
    /// Guards and waiters each hold a clone of the `Arc`, so a strong count
    /// of one means only the map itself does.
    pub(crate) async fn prune(&self, id: &str) {
        let mut locks = self.locks.lock().await;
        if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(id);
        }
    }
}
