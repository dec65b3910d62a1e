//! API key lifecycle: creation, verification, rotation, status transitions.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use weave_core::{KeyId, KeyScope, PolicyId};
use weave_crypto::{generate_raw_secret, hash_secret, verify_secret};
use weave_policy::PolicyEngine;
use weave_storage::KvStore;

use crate::error::{AuthError, AuthResult};

const NS_KEYS: &str = "auth:keys";

/// Lifecycle state of an [`ApiKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    /// Usable.
    Active,
    /// Temporarily disabled; can be reactivated.
    Suspended,
    /// Permanently disabled; terminal.
    Revoked,
    /// Past `expires_at`; treated like revoked for verification purposes.
    Expired,
}

/// An API key record. The raw secret is never stored, only its sha-256 hash
/// and a 16-character prefix for display/identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    /// Stable identifier for this key.
    pub key_id: KeyId,
    /// Hex sha-256 hash of the raw secret.
    pub key_hash: String,
    /// First 16 characters of the raw secret, safe to display.
    pub key_prefix: String,
    /// Owning principal, e.g. a user or service name.
    pub owner_id: String,
    /// Optional contact email for the owner.
    pub owner_email: Option<String>,
    /// The policy this key's requests are evaluated against.
    pub policy_id: PolicyId,
    /// The coarse scope this key was minted at.
    pub scope: KeyScope,
    /// Current lifecycle state.
    pub status: KeyStatus,
    /// When the key was created.
    pub created_at: DateTime<Utc>,
    /// Optional absolute expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Last time this key was used to authenticate, if ever.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Number of successful authentications.
    pub use_count: u64,
    /// Human-readable label.
    pub name: String,
    /// Longer free-text description.
    pub description: String,
}

impl ApiKey {
    /// Is this key currently usable? Checks status and expiry, not existence.
    #[must_use]
    pub fn is_valid(&self) -> (bool, &'static str) {
        match self.status {
            KeyStatus::Revoked => (false, "Key has been revoked"),
            KeyStatus::Suspended => (false, "Key is suspended"),
            KeyStatus::Expired => (false, "Key has expired"),
            KeyStatus::Active => {
                if self.expires_at.is_some_and(|exp| Utc::now() > exp) {
                    (false, "Key has expired")
                } else {
                    (true, "OK")
                }
            },
        }
    }
}

/// Manages the full lifecycle of API keys: creation, verification, rotation
/// and status transitions. Keys are cached in memory and optionally mirrored
/// to a [`KvStore`] for persistence across restarts.
#[derive(Clone)]
pub struct KeyManager {
    keys: Arc<DashMap<KeyId, ApiKey>>,
    by_hash: Arc<DashMap<String, KeyId>>,
    store: Option<Arc<dyn KvStore>>,
    policies: PolicyEngine,
}

impl KeyManager {
    /// An in-memory-only manager; keys do not survive a restart.
    #[must_use]
    pub fn in_memory(policies: PolicyEngine) -> Self {
        Self {
            keys: Arc::new(DashMap::new()),
            by_hash: Arc::new(DashMap::new()),
            store: None,
            policies,
        }
    }

    /// A manager backed by `store` for persistence.
    #[must_use]
    pub fn with_store(policies: PolicyEngine, store: Arc<dyn KvStore>) -> Self {
        Self {
            keys: Arc::new(DashMap::new()),
            by_hash: Arc::new(DashMap::new()),
            store: Some(store),
            policies,
        }
    }

    /// Mint a new key for `owner_id` under `policy_id`/`scope`.
    ///
    /// Returns the stored record and the raw secret. The raw secret is
    /// returned exactly once and is not recoverable afterward.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::PolicyNotFound`] if `policy_id` does not exist,
    /// or a storage error if persistence fails.
    pub async fn create_key(
        &self,
        owner_id: impl Into<String>,
        policy_id: PolicyId,
        scope: KeyScope,
        owner_email: Option<String>,
        expires_in_days: Option<i64>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> AuthResult<(ApiKey, String)> {
        if self.policies.get_policy(&policy_id).await.is_none() {
            return Err(AuthError::PolicyNotFound(policy_id.to_string()));
        }

        let raw = generate_raw_secret(&scope.to_string());
        let key_hash = hash_secret(&raw);
        let key_prefix: String = raw.chars().take(16).collect();
        let expires_at = expires_in_days.map(|days| Utc::now() + Duration::days(days));

        let key = ApiKey {
            key_id: KeyId::new(),
            key_hash: key_hash.clone(),
            key_prefix,
            owner_id: owner_id.into(),
            owner_email,
            policy_id,
            scope,
            status: KeyStatus::Active,
            created_at: Utc::now(),
            expires_at,
            last_used_at: None,
            use_count: 0,
            name: name.into(),
            description: description.into(),
        };

        self.persist(&key).await?;
        self.keys.insert(key.key_id.clone(), key.clone());
        self.by_hash.insert(key_hash, key.key_id.clone());

        tracing::info!(key_id = %key.key_id, scope = %key.scope, owner = %key.owner_id, "created API key");

        Ok((key, raw))
    }

    /// Verify a raw secret, returning the matching key if it is valid.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKeyFormat`], [`AuthError::KeyNotFound`], or
    /// a status error wrapped as [`AuthError::InvalidToken`] if the key
    /// exists but is not currently usable.
    pub async fn verify_key(&self, raw: &str) -> AuthResult<ApiKey> {
        if raw.is_empty() {
            return Err(AuthError::InvalidKeyFormat);
        }
        let key_hash = hash_secret(raw);

        let key = match self.lookup_by_hash(&key_hash).await? {
            Some(key) => key,
            None => return Err(AuthError::KeyNotFound),
        };

        // Constant-time re-check against the stored hash, defending against
        // any future lookup path that does not already hash-compare.
        if !verify_secret(raw, &key.key_hash) {
            return Err(AuthError::KeyNotFound);
        }

        let (valid, reason) = key.is_valid();
        if !valid {
            return Err(AuthError::InvalidToken(reason.to_owned()));
        }

        Ok(key)
    }

    async fn lookup_by_hash(&self, key_hash: &str) -> AuthResult<Option<ApiKey>> {
        if let Some(key_id) = self.by_hash.get(key_hash) {
            if let Some(key) = self.keys.get(key_id.value()) {
                return Ok(Some(key.clone()));
            }
        }

        let Some(store) = &self.store else {
            return Ok(None);
        };
        let keys = store.list_keys(NS_KEYS).await?;
        for raw_key_id in keys {
            let Some(bytes) = store.get(NS_KEYS, &raw_key_id).await? else {
                continue;
            };
            let key: ApiKey = serde_json::from_slice(&bytes)?;
            if key.key_hash == key_hash {
                self.keys.insert(key.key_id.clone(), key.clone());
                self.by_hash.insert(key.key_hash.clone(), key.key_id.clone());
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    /// Fetch a key by id, consulting the backing store on a cache miss.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backing store read fails.
    pub async fn get_key(&self, key_id: &KeyId) -> AuthResult<Option<ApiKey>> {
        if let Some(key) = self.keys.get(key_id) {
            return Ok(Some(key.clone()));
        }
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let Some(bytes) = store.get(NS_KEYS, key_id.as_str()).await? else {
            return Ok(None);
        };
        let key: ApiKey = serde_json::from_slice(&bytes)?;
        self.keys.insert(key.key_id.clone(), key.clone());
        self.by_hash.insert(key.key_hash.clone(), key.key_id.clone());
        Ok(Some(key))
    }

    /// List keys, optionally filtered by owner.
    #[must_use]
    pub fn list_keys(&self, owner_id: Option<&str>) -> Vec<ApiKey> {
        self.keys
            .iter()
            .filter(|entry| owner_id.is_none_or(|owner| entry.owner_id == owner))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Issue a successor key with the same owner/policy/scope, then revoke
    /// the predecessor. Atomic from the caller's perspective: either both
    /// steps succeed or the predecessor is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyNotFound`] if `key_id` does not exist, or a
    /// storage error.
    pub async fn rotate_key(&self, key_id: &KeyId) -> AuthResult<(ApiKey, String)> {
        let old = self.get_key(key_id).await?.ok_or(AuthError::KeyNotFound)?;

        let (new_key, raw) = self
            .create_key(
                old.owner_id.clone(),
                old.policy_id.clone(),
                old.scope,
                old.owner_email.clone(),
                None,
                format!("{} (rotated)", old.name),
                old.description.clone(),
            )
            .await?;

        self.revoke_key(key_id).await?;
        tracing::info!(old_key_id = %key_id, new_key_id = %new_key.key_id, "rotated API key");

        Ok((new_key, raw))
    }

    /// Revoke a key. Terminal: a revoked key can never be reactivated.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyNotFound`] or a storage error.
    pub async fn revoke_key(&self, key_id: &KeyId) -> AuthResult<()> {
        self.transition(key_id, KeyStatus::Revoked).await
    }

    /// Suspend a key. Reversible via [`Self::reactivate_key`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyNotFound`] or a storage error.
    pub async fn suspend_key(&self, key_id: &KeyId) -> AuthResult<()> {
        self.transition(key_id, KeyStatus::Suspended).await
    }

    /// Reactivate a suspended key. A revoked key cannot be reactivated.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyNotFound`] if missing, or
    /// [`AuthError::InvalidToken`] if the key is revoked.
    pub async fn reactivate_key(&self, key_id: &KeyId) -> AuthResult<()> {
        let key = self.get_key(key_id).await?.ok_or(AuthError::KeyNotFound)?;
        if key.status == KeyStatus::Revoked {
            return Err(AuthError::InvalidToken("cannot reactivate a revoked key".to_owned()));
        }
        self.transition(key_id, KeyStatus::Active).await
    }

    async fn transition(&self, key_id: &KeyId, status: KeyStatus) -> AuthResult<()> {
        let mut key = self.get_key(key_id).await?.ok_or(AuthError::KeyNotFound)?;
        key.status = status;
        if status == KeyStatus::Revoked {
            self.by_hash.remove(&key.key_hash);
        }
        self.persist(&key).await?;
        self.keys.insert(key.key_id.clone(), key);
        Ok(())
    }

    /// Record a successful authentication against `key_id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if persistence fails. A missing key is not
    /// an error here; usage recording is best-effort.
    pub async fn record_usage(&self, key_id: &KeyId) -> AuthResult<()> {
        let Some(mut key) = self.get_key(key_id).await? else {
            return Ok(());
        };
        key.last_used_at = Some(Utc::now());
        key.use_count = key.use_count.saturating_add(1);
        self.persist(&key).await?;
        self.keys.insert(key.key_id.clone(), key);
        Ok(())
    }

    /// Reassign the policy a key is evaluated against.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyNotFound`] or [`AuthError::PolicyNotFound`].
    pub async fn update_policy(&self, key_id: &KeyId, policy_id: PolicyId) -> AuthResult<()> {
        if self.policies.get_policy(&policy_id).await.is_none() {
            return Err(AuthError::PolicyNotFound(policy_id.to_string()));
        }
        let mut key = self.get_key(key_id).await?.ok_or(AuthError::KeyNotFound)?;
        key.policy_id = policy_id;
        self.persist(&key).await?;
        self.keys.insert(key.key_id.clone(), key);
        Ok(())
    }

    async fn persist(&self, key: &ApiKey) -> AuthResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(key)?;
        store.set(NS_KEYS, key.key_id.as_str(), bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_policy::seed_default_policies;
    use weave_storage::MemoryKvStore;

    async fn manager() -> KeyManager {
        let policies = PolicyEngine::new();
        seed_default_policies(&policies).await;
        KeyManager::in_memory(policies)
    }

    #[tokio::test]
    async fn create_and_verify_round_trips() {
        let manager = manager().await;
        let (key, raw) = manager
            .create_key(
                "alice",
                PolicyId::from_raw(weave_policy::DEFAULT_USER_POLICY_ID),
                KeyScope::User,
                None,
                None,
                "alice's key",
                "",
            )
            .await
            .unwrap();

        let verified = manager.verify_key(&raw).await.unwrap();
        assert_eq!(verified.key_id, key.key_id);
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let manager = manager().await;
        manager
            .create_key(
                "alice",
                PolicyId::from_raw(weave_policy::DEFAULT_USER_POLICY_ID),
                KeyScope::User,
                None,
                None,
                "",
                "",
            )
            .await
            .unwrap();

        assert!(manager.verify_key("wv_user_not-a-real-secret").await.is_err());
    }

    #[tokio::test]
    async fn revoked_key_fails_verification() {
        let manager = manager().await;
        let (key, raw) = manager
            .create_key(
                "alice",
                PolicyId::from_raw(weave_policy::DEFAULT_USER_POLICY_ID),
                KeyScope::User,
                None,
                None,
                "",
                "",
            )
            .await
            .unwrap();

        manager.revoke_key(&key.key_id).await.unwrap();
        assert!(manager.verify_key(&raw).await.is_err());
    }

    #[tokio::test]
    async fn suspend_then_reactivate_restores_access() {
        let manager = manager().await;
        let (key, raw) = manager
            .create_key(
                "alice",
                PolicyId::from_raw(weave_policy::DEFAULT_USER_POLICY_ID),
                KeyScope::User,
                None,
                None,
                "",
                "",
            )
            .await
            .unwrap();

        manager.suspend_key(&key.key_id).await.unwrap();
        assert!(manager.verify_key(&raw).await.is_err());

        manager.reactivate_key(&key.key_id).await.unwrap();
        assert!(manager.verify_key(&raw).await.is_ok());
    }

    #[tokio::test]
    async fn revoked_key_cannot_be_reactivated() {
        let manager = manager().await;
        let (key, _raw) = manager
            .create_key(
                "alice",
                PolicyId::from_raw(weave_policy::DEFAULT_USER_POLICY_ID),
                KeyScope::User,
                None,
                None,
                "",
                "",
            )
            .await
            .unwrap();

        manager.revoke_key(&key.key_id).await.unwrap();
        assert!(manager.reactivate_key(&key.key_id).await.is_err());
    }

    #[tokio::test]
    async fn rotate_key_issues_successor_and_revokes_predecessor() {
        let manager = manager().await;
        let (old_key, old_raw) = manager
            .create_key(
                "alice",
                PolicyId::from_raw(weave_policy::DEFAULT_USER_POLICY_ID),
                KeyScope::User,
                None,
                None,
                "",
                "",
            )
            .await
            .unwrap();

        let (new_key, new_raw) = manager.rotate_key(&old_key.key_id).await.unwrap();
        assert_eq!(new_key.owner_id, old_key.owner_id);
        assert!(manager.verify_key(&old_raw).await.is_err());
        assert!(manager.verify_key(&new_raw).await.is_ok());
    }

    #[tokio::test]
    async fn persistent_store_survives_cache_eviction() {
        let policies = PolicyEngine::new();
        seed_default_policies(&policies).await;
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let manager = KeyManager::with_store(policies.clone(), Arc::clone(&store));

        let (key, _raw) = manager
            .create_key(
                "bob",
                PolicyId::from_raw(weave_policy::DEFAULT_USER_POLICY_ID),
                KeyScope::User,
                None,
                None,
                "",
                "",
            )
            .await
            .unwrap();

        let manager2 = KeyManager::with_store(policies, store);
        let fetched = manager2.get_key(&key.key_id).await.unwrap();
        assert!(fetched.is_some());
    }
}
