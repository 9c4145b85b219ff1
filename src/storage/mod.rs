// Key/value stores for encoded state blobs

pub mod blob;
pub mod sqlite;

use std::collections::HashMap;

use tokio::sync::RwLock;

pub use sqlite::SqliteStorage;

#[async_trait::async_trait]
pub trait BlobStorage: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Process-lifetime store; everything in it is gone once the owner is dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BlobStorage for MemoryStorage {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("syncState").await.unwrap(), None);

        storage.set("syncState", "abc").await.unwrap();
        storage.set("syncState", "def").await.unwrap();
        assert_eq!(
            storage.get("syncState").await.unwrap().as_deref(),
            Some("def")
        );

        storage.remove("syncState").await.unwrap();
        assert_eq!(storage.get("syncState").await.unwrap(), None);
        // removing a missing key is not an error
        storage.remove("syncState").await.unwrap();
    }
}
