//! Backend-agnostic blob storage port, in the shape of `riptide-types`'s
//! `CacheStorage` port: an async trait over opaque bytes keyed by string,
//! with default-implemented batch helpers so a minimal backend only needs
//! to provide the primitive operations.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("blob backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), BlobError>;
    async fn download(&self, key: &str) -> Result<Vec<u8>, BlobError>;
    async fn delete(&self, key: &str) -> Result<(), BlobError>;
    async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError>;
    async fn signed_url(&self, key: &str) -> Result<String, BlobError>;

    /// Deletes every key under `prefix` in parallel. Partial failures are
    /// reported but never undo deletions that already succeeded
    /// (spec.md §4.8's `deleteArtifacts`).
    async fn delete_prefix(&self, prefix: &str) -> Result<Vec<String>, Vec<(String, BlobError)>> {
        let keys = match self.list(prefix).await {
            Ok(keys) => keys,
            Err(err) => return Err(vec![(prefix.to_string(), err)]),
        };

        let results = futures::future::join_all(
            keys.into_iter()
                .map(|key| async move { (key.clone(), self.delete(&key).await) }),
        )
        .await;

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for (key, result) in results {
            match result {
                Ok(()) => deleted.push(key),
                Err(err) => failed.push((key, err)),
            }
        }

        if failed.is_empty() {
            Ok(deleted)
        } else {
            Err(failed)
        }
    }
}

/// In-memory blob store, used by tests and as a local-dev fallback when no
/// object storage is configured.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), BlobError> {
        self.blobs
            .lock()
            .expect("blob store mutex poisoned")
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        self.blobs
            .lock()
            .expect("blob store mutex poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.blobs
            .lock()
            .expect("blob store mutex poisoned")
            .remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        Ok(self
            .blobs
            .lock()
            .expect("blob store mutex poisoned")
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn signed_url(&self, key: &str) -> Result<String, BlobError> {
        if self
            .blobs
            .lock()
            .expect("blob store mutex poisoned")
            .contains_key(key)
        {
            Ok(format!("memory://{key}"))
        } else {
            Err(BlobError::NotFound(key.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delete_prefix_removes_every_matching_key() {
        let store = InMemoryBlobStore::new();
        store.upload("artifacts/t1/e1/Screenshot/1.png", vec![1]).await.unwrap();
        store.upload("artifacts/t1/e1/Screenshot/2.png", vec![2]).await.unwrap();
        store.upload("artifacts/t1/e2/Screenshot/1.png", vec![3]).await.unwrap();

        let deleted = store.delete_prefix("artifacts/t1/e1/").await.unwrap();
        assert_eq!(deleted.len(), 2);
        assert_eq!(store.list("artifacts/t1/").await.unwrap().len(), 1);
    }
}
