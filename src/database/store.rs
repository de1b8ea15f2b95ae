//! Durable key-value-by-group storage.
//!
//! A backend only moves opaque blobs around; the schema lives entirely in
//! [`GroupConfig`](super::GroupConfig).

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::StoreError;
use crate::moderation::GroupId;

/// A raw persisted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredGroup {
    pub group_id: GroupId,
    pub data: String,
}

/// Durable storage of per-group settings blobs.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Read every stored record.
    async fn load_all(&self) -> Result<Vec<StoredGroup>, StoreError>;

    /// Insert or replace the blob of a group.
    async fn save(&self, group_id: GroupId, data: &str) -> Result<(), StoreError>;

    /// Remove the record of a group (no-op if absent).
    async fn delete(&self, group_id: GroupId) -> Result<(), StoreError>;

    /// Release the underlying connection.
    async fn close(&self) {}
}

/// In-process store, used when no database is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryGroupStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    records: BTreeMap<GroupId, String>,
    closed: bool,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with raw records.
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (GroupId, String)>,
    {
        Self {
            inner: Mutex::new(MemoryInner {
                records: records.into_iter().collect(),
                closed: false,
            }),
        }
    }

    /// Raw blob of a group, if stored.
    pub fn raw(&self, group_id: GroupId) -> Option<String> {
        self.inner.lock().records.get(&group_id).cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

#[async_trait]
impl GroupStore for MemoryGroupStore {
    async fn load_all(&self) -> Result<Vec<StoredGroup>, StoreError> {
        let inner = self.inner.lock();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        Ok(inner
            .records
            .iter()
            .map(|(group_id, data)| StoredGroup {
                group_id: *group_id,
                data: data.clone(),
            })
            .collect())
    }

    async fn save(&self, group_id: GroupId, data: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        inner.records.insert(group_id, data.to_string());
        Ok(())
    }

    async fn delete(&self, group_id: GroupId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        inner.records.remove(&group_id);
        Ok(())
    }

    async fn close(&self) {
        self.inner.lock().closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip_and_close() {
        let store = MemoryGroupStore::new();
        store.save(-100, "{}").await.unwrap();
        assert_eq!(store.raw(-100).as_deref(), Some("{}"));

        store.delete(-100).await.unwrap();
        assert!(store.raw(-100).is_none());

        store.close().await;
        assert!(matches!(store.save(-100, "{}").await, Err(StoreError::Closed)));
    }
}
