//! The raw namespaced key/value contract every storage backend satisfies.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};

/// A namespaced, async key/value store.
///
/// Every key lives inside a namespace (e.g. `"sessions"`, `"keys"`,
/// `"operators"`) so that unrelated subsystems never collide on key space.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a value, or `None` if the key does not exist.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Write a value, overwriting any existing value for the key.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()>;

    /// List every key currently stored in a namespace.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;
}

/// An in-process, in-memory [`KvStore`]. Used for tests and for runs that
/// don't need cross-restart durability.
#[derive(Debug, Default, Clone)]
pub struct MemoryKvStore {
    data: Arc<RwLock<HashMap<(String, String), Vec<u8>>>>,
}

impl MemoryKvStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("key must not be empty".into()));
        }
        let guard = self.data.read().await;
        Ok(guard.get(&(namespace.to_owned(), key.to_owned())).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("key must not be empty".into()));
        }
        let mut guard = self.data.write().await;
        guard.insert((namespace.to_owned(), key.to_owned()), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        let mut guard = self.data.write().await;
        guard.remove(&(namespace.to_owned(), key.to_owned()));
        Ok(())
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        let guard = self.data.read().await;
        Ok(guard
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, k)| k.clone())
            .collect())
    }
}

/// Bridge a synchronous call site to an async [`KvStore`] call.
///
/// Lets a sync call site drive an async storage call to completion: if a
/// tokio runtime is already running on this thread, the future is driven to
/// completion on a scoped OS thread (calling `block_on` directly on the
/// current runtime thread would panic); otherwise a fresh current-thread
/// runtime is built for the call.
///
/// # Panics
///
/// Panics if a fresh current-thread runtime cannot be constructed.
pub fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => std::thread::scope(|scope| scope.spawn(|| handle.block_on(fut)).join())
            .unwrap_or_else(|_| panic!("block_on worker thread panicked")),
        Err(_) => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build current-thread runtime for block_on")
            .block_on(fut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryKvStore::new();
        store.set("sessions", "s1", b"hello".to_vec()).await.unwrap();
        assert_eq!(
            store.get("sessions", "s1").await.unwrap(),
            Some(b"hello".to_vec())
        );
    }

    #[tokio::test]
    async fn missing_key_returns_none() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("sessions", "nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let store = MemoryKvStore::new();
        store.set("keys", "k1", b"v".to_vec()).await.unwrap();
        store.delete("keys", "k1").await.unwrap();
        assert_eq!(store.get("keys", "k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let store = MemoryKvStore::new();
        store.set("a", "k", b"1".to_vec()).await.unwrap();
        store.set("b", "k", b"2".to_vec()).await.unwrap();
        assert_eq!(store.get("a", "k").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get("b", "k").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn list_keys_scoped_to_namespace() {
        let store = MemoryKvStore::new();
        store.set("ns", "a", vec![]).await.unwrap();
        store.set("ns", "b", vec![]).await.unwrap();
        store.set("other", "c", vec![]).await.unwrap();
        let mut keys = store.list_keys("ns").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn block_on_works_outside_a_runtime() {
        let value = block_on(async { 1 + 1 });
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn block_on_works_inside_a_runtime() {
        let value = tokio::task::spawn_blocking(|| block_on(async { 21 * 2 }))
            .await
            .unwrap();
        assert_eq!(value, 42);
    }
}
