use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as Json;
use tokio::sync::Mutex;

/// Key-value storage for protocol state.
///
/// Keys are namespaced per record kind by the callers, so a single store can
/// back both the response endpoint and the verifier. Expiry is evaluated at
/// read time by the callers; the store never evicts.
#[async_trait]
pub trait Datastore: Debug {
    /// Store a record under the given key, replacing any existing value.
    async fn put(&self, key: &str, value: Json) -> Result<()>;

    /// Get a record from the store.
    async fn get(&self, key: &str) -> Result<Option<Json>>;
}

/// A local in-memory store. Not for production use!
///
/// # Warning
/// This in-memory store should only be used for test purposes, it will not
/// work for a distributed deployment.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    store: Arc<Mutex<BTreeMap<String, Json>>>,
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn put(&self, key: &str, value: Json) -> Result<()> {
        self.store.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Json>> {
        Ok(self.store.lock().await.get(key).cloned())
    }
}
