//! Durable, embedded-engine-backed [`KvStore`] implementation.
//!
//! Wraps `surrealdb::Surreal<surrealdb::engine::any::Any>`, exposing only
//! the flat key/value surface this control plane needs: records are stored
//! as single-field documents keyed by `namespace:key`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;

use crate::error::{StorageError, StorageResult};
use crate::kv::KvStore;

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    value: Vec<u8>,
}

/// A [`KvStore`] backed by an embedded SurrealDB instance (`surrealkv` or
/// in-memory engine).
pub struct SurrealKvStore {
    db: Surreal<Any>,
}

impl std::fmt::Debug for SurrealKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealKvStore").finish_non_exhaustive()
    }
}

impl SurrealKvStore {
    /// Connect to an embedded, file-backed SurrealKV instance at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the engine cannot be opened.
    pub async fn connect_embedded(path: &str) -> StorageResult<Self> {
        let db = surrealdb::engine::any::connect(format!("surrealkv://{path}"))
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Self::init(db).await
    }

    /// Connect to a transient in-memory instance, useful for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the engine cannot be opened.
    pub async fn connect_memory() -> StorageResult<Self> {
        let db = surrealdb::engine::any::connect("mem://")
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Self::init(db).await
    }

    async fn init(db: Surreal<Any>) -> StorageResult<Self> {
        db.use_ns("weave")
            .use_db("control_plane")
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self { db })
    }

    fn record_id(namespace: &str, key: &str) -> StorageResult<(String, String)> {
        if key.is_empty() || key.contains(':') {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        Ok((namespace.to_owned(), key.to_owned()))
    }
}

#[async_trait]
impl KvStore for SurrealKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let (table, id) = Self::record_id(namespace, key)?;
        let record: Option<Record> = self
            .db
            .select((table, id))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(record.map(|r| r.value))
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let (table, id) = Self::record_id(namespace, key)?;
        let _: Option<Record> = self
            .db
            .upsert((table, id))
            .content(Record { value })
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        let (table, id) = Self::record_id(namespace, key)?;
        let _: Option<Record> = self
            .db
            .delete((table, id))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        let mut response = self
            .db
            .query("SELECT id FROM type::table($table)")
            .bind(("table", namespace.to_owned()))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let ids: Vec<surrealdb::sql::Thing> = response
            .take("id")
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(ids.into_iter().map(|t| t.id.to_raw()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = SurrealKvStore::connect_memory().await.unwrap();
        store.set("sessions", "s1", b"hello".to_vec()).await.unwrap();
        assert_eq!(
            store.get("sessions", "s1").await.unwrap(),
            Some(b"hello".to_vec())
        );
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let store = SurrealKvStore::connect_memory().await.unwrap();
        store.set("keys", "k1", b"v".to_vec()).await.unwrap();
        store.delete("keys", "k1").await.unwrap();
        assert_eq!(store.get("keys", "k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejects_empty_key() {
        let store = SurrealKvStore::connect_memory().await.unwrap();
        let err = store.set("keys", "", b"v".to_vec()).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
