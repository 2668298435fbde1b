use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RemoteError;
use crate::models::{RemoteKey, RemotePatch, RemoteSnapshot};

/// Remote show document store shared with other writers.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// `Ok(None)` when no record exists for the key yet.
    async fn find(&self, key: &RemoteKey) -> Result<Option<RemoteSnapshot>, RemoteError>;

    /// Writes only the fields present in `patch`.
    async fn partial_update(&self, key: &RemoteKey, patch: &RemotePatch)
        -> Result<(), RemoteError>;
}

/// Document map used offline and in tests. Updates merge top-level fields
/// into the existing document the way a column update would.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    records: Mutex<HashMap<RemoteKey, Value>>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: RemoteKey, document: Value) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(key, document);
        }
    }

    pub fn record(&self, key: &RemoteKey) -> Option<Value> {
        self.records
            .lock()
            .ok()
            .and_then(|records| records.get(key).cloned())
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes every call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), RemoteError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(RemoteError::Unavailable("simulated outage".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn find(&self, key: &RemoteKey) -> Result<Option<RemoteSnapshot>, RemoteError> {
        self.check_available()?;
        let records = self
            .records
            .lock()
            .map_err(|_| RemoteError::Unavailable("record map poisoned".into()))?;

        Ok(records.get(key).map(|document| RemoteSnapshot {
            id: document.get("id").cloned().unwrap_or(Value::Null),
            metadata: document.get("metadata").cloned(),
        }))
    }

    async fn partial_update(
        &self,
        key: &RemoteKey,
        patch: &RemotePatch,
    ) -> Result<(), RemoteError> {
        self.check_available()?;
        let fields = match serde_json::to_value(patch) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => return Err(RemoteError::Decode("patch is not an object".into())),
            Err(err) => return Err(RemoteError::Decode(err.to_string())),
        };

        let mut records = self
            .records
            .lock()
            .map_err(|_| RemoteError::Unavailable("record map poisoned".into()))?;

        // Filtered update: zero matching rows is not an error.
        if let Some(Value::Object(document)) = records.get_mut(key) {
            for (field, value) in fields {
                document.insert(field, value);
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn update_merges_into_existing_document() {
        let store = MemoryRemoteStore::new();
        let key = RemoteKey::new("show", "host");
        store.insert(key.clone(), json!({ "id": 3, "title": "keep me", "plan_effectiveness": 0.1 }));

        let patch = RemotePatch {
            plan_effectiveness: Some(Some(0.9)),
            ..RemotePatch::default()
        };
        store.partial_update(&key, &patch).await.unwrap();

        let document = store.record(&key).unwrap();
        assert_eq!(document["title"], "keep me");
        assert_eq!(document["plan_effectiveness"], 0.9);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn update_of_missing_record_creates_nothing() {
        let store = MemoryRemoteStore::new();
        let key = RemoteKey::new("show", "host");

        assert_eq!(store.find(&key).await.unwrap(), None);
        store
            .partial_update(&key, &RemotePatch::default())
            .await
            .unwrap();
        assert!(store.is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let store = MemoryRemoteStore::new();
        store.set_unavailable(true);
        let key = RemoteKey::new("show", "host");

        assert!(matches!(
            store.find(&key).await,
            Err(RemoteError::Unavailable(_))
        ));
    }
}
