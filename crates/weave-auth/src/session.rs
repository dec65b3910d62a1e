//! TTL-bound sessions, backed by a KV interface.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weave_core::SessionId;
use weave_storage::KvStore;

use crate::error::AuthResult;

const NS_SESSIONS: &str = "auth:sessions";
const DEFAULT_TTL_SECS: i64 = 3600;

/// A user session tracked between authenticated requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque identifier, carrying at least 128 bits of entropy.
    pub session_id: SessionId,
    /// The key this session was created under.
    pub key_id: String,
    /// The owning principal.
    pub owner_id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Absolute expiry; refreshed by [`SessionManager::touch`]/`extend`.
    pub expires_at: DateTime<Utc>,
    /// Last time the session was touched.
    pub last_activity: DateTime<Utc>,
    /// Free-form session-scoped key/value data.
    pub data: HashMap<String, Value>,
    /// Number of requests served under this session.
    pub request_count: u64,
}

impl Session {
    /// Has this session passed its expiry?
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    fn touch_mut(&mut self) {
        self.last_activity = Utc::now();
        self.request_count = self.request_count.saturating_add(1);
    }
}

/// Manages session lifecycle: creation, lookup, activity tracking, expiry.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<DashMap<SessionId, Session>>,
    store: Option<Arc<dyn KvStore>>,
    default_ttl_secs: i64,
}

impl SessionManager {
    /// An in-memory-only manager with the default one-hour TTL.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            store: None,
            default_ttl_secs: DEFAULT_TTL_SECS,
        }
    }

    /// A manager backed by `store`, with a configurable default TTL.
    #[must_use]
    pub fn with_store(store: Arc<dyn KvStore>, default_ttl_secs: i64) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            store: Some(store),
            default_ttl_secs,
        }
    }

    /// Create a new session for `key_id`/`owner_id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if persistence fails.
    pub async fn create_session(
        &self,
        key_id: impl Into<String>,
        owner_id: impl Into<String>,
        ttl_secs: Option<i64>,
    ) -> AuthResult<Session> {
        let ttl = ttl_secs.unwrap_or(self.default_ttl_secs);
        let now = Utc::now();
        let session = Session {
            session_id: SessionId::new(),
            key_id: key_id.into(),
            owner_id: owner_id.into(),
            created_at: now,
            expires_at: now + Duration::seconds(ttl),
            last_activity: now,
            data: HashMap::new(),
            request_count: 0,
        };

        self.persist(&session).await?;
        self.sessions.insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    /// Fetch a session, evicting it if expired.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a backing-store read fails.
    pub async fn get_session(&self, session_id: &SessionId) -> AuthResult<Option<Session>> {
        if let Some(session) = self.sessions.get(session_id) {
            if session.is_expired() {
                drop(session);
                self.sessions.remove(session_id);
                return Ok(None);
            }
            return Ok(Some(session.clone()));
        }

        let Some(store) = &self.store else {
            return Ok(None);
        };
        let Some(bytes) = store.get(NS_SESSIONS, session_id.as_str()).await? else {
            return Ok(None);
        };
        let session: Session = serde_json::from_slice(&bytes)?;
        if session.is_expired() {
            let _ = store.delete(NS_SESSIONS, session_id.as_str()).await;
            return Ok(None);
        }
        self.sessions.insert(session.session_id.clone(), session.clone());
        Ok(Some(session))
    }

    /// Record activity against a session, bumping its request counter.
    ///
    /// # Errors
    ///
    /// Returns a storage error on persistence failure.
    pub async fn touch(&self, session_id: &SessionId) -> AuthResult<bool> {
        let Some(mut session) = self.get_session(session_id).await? else {
            return Ok(false);
        };
        session.touch_mut();
        self.persist(&session).await?;
        self.sessions.insert(session.session_id.clone(), session);
        Ok(true)
    }

    /// Push the session's expiry out by `extra_ttl_secs` (or the default TTL).
    ///
    /// # Errors
    ///
    /// Returns a storage error on persistence failure.
    pub async fn extend(&self, session_id: &SessionId, extra_ttl_secs: Option<i64>) -> AuthResult<bool> {
        let Some(mut session) = self.get_session(session_id).await? else {
            return Ok(false);
        };
        let ttl = extra_ttl_secs.unwrap_or(self.default_ttl_secs);
        session.expires_at = Utc::now() + Duration::seconds(ttl);
        session.touch_mut();
        self.persist(&session).await?;
        self.sessions.insert(session.session_id.clone(), session);
        Ok(true)
    }

    /// Delete a session outright.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backing-store delete fails.
    pub async fn delete(&self, session_id: &SessionId) -> AuthResult<()> {
        self.sessions.remove(session_id);
        if let Some(store) = &self.store {
            store.delete(NS_SESSIONS, session_id.as_str()).await?;
        }
        Ok(())
    }

    /// Set a key in a session's free-form data map.
    ///
    /// # Errors
    ///
    /// Returns a storage error on persistence failure.
    pub async fn set_data(&self, session_id: &SessionId, key: impl Into<String>, value: Value) -> AuthResult<bool> {
        let Some(mut session) = self.get_session(session_id).await? else {
            return Ok(false);
        };
        session.data.insert(key.into(), value);
        self.persist(&session).await?;
        self.sessions.insert(session.session_id.clone(), session);
        Ok(true)
    }

    /// Read a key from a session's data map.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a backing-store read fails.
    pub async fn get_data(&self, session_id: &SessionId, key: &str) -> AuthResult<Option<Value>> {
        Ok(self
            .get_session(session_id)
            .await?
            .and_then(|session| session.data.get(key).cloned()))
    }

    /// List non-expired cached sessions, optionally filtered by owner.
    #[must_use]
    pub fn list_sessions(&self, owner_id: Option<&str>) -> Vec<Session> {
        self.sessions
            .iter()
            .filter(|entry| !entry.is_expired())
            .filter(|entry| owner_id.is_none_or(|owner| entry.owner_id == owner))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Drop expired sessions from the in-memory cache, returning how many
    /// were removed. Storage-side expiry is handled by the KV layer's own
    /// TTL where supported.
    #[must_use]
    pub fn cleanup_expired(&self) -> usize {
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| entry.is_expired())
            .map(|entry| entry.key().clone())
            .collect();
        let count = expired.len();
        for id in expired {
            self.sessions.remove(&id);
        }
        count
    }

    async fn persist(&self, session: &Session) -> AuthResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(session)?;
        store.set(NS_SESSIONS, session.session_id.as_str(), bytes).await?;
        Ok(())
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_fetch_round_trips() {
        let manager = SessionManager::in_memory();
        let session = manager.create_session("key_1", "alice", None).await.unwrap();
        let fetched = manager.get_session(&session.session_id).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn expired_session_is_evicted_on_read() {
        let manager = SessionManager::in_memory();
        let session = manager.create_session("key_1", "alice", Some(-1)).await.unwrap();
        assert!(manager.get_session(&session.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn touch_increments_request_count() {
        let manager = SessionManager::in_memory();
        let session = manager.create_session("key_1", "alice", None).await.unwrap();
        manager.touch(&session.session_id).await.unwrap();
        manager.touch(&session.session_id).await.unwrap();
        let fetched = manager.get_session(&session.session_id).await.unwrap().unwrap();
        assert_eq!(fetched.request_count, 2);
    }

    #[tokio::test]
    async fn data_map_round_trips() {
        let manager = SessionManager::in_memory();
        let session = manager.create_session("key_1", "alice", None).await.unwrap();
        manager
            .set_data(&session.session_id, "role", serde_json::json!("admin"))
            .await
            .unwrap();
        let value = manager.get_data(&session.session_id, "role").await.unwrap();
        assert_eq!(value, Some(serde_json::json!("admin")));
    }

    #[tokio::test]
    async fn delete_removes_session() {
        let manager = SessionManager::in_memory();
        let session = manager.create_session("key_1", "alice", None).await.unwrap();
        manager.delete(&session.session_id).await.unwrap();
        assert!(manager.get_session(&session.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cleanup_expired_drops_only_expired_entries() {
        let manager = SessionManager::in_memory();
        let live = manager.create_session("key_1", "alice", None).await.unwrap();
        let dead = manager.create_session("key_1", "alice", Some(-1)).await.unwrap();
        manager.sessions.insert(dead.session_id.clone(), dead.clone());

        let removed = manager.cleanup_expired();
        assert_eq!(removed, 1);
        assert!(manager.sessions.contains_key(&live.session_id));
    }
}
