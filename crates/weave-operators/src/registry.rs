//! The operator catalog: registration, lookup, invocation and persistence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use weave_core::{OperatorId, OperatorType};
use weave_storage::KvStore;

use crate::dispatch::{build_request, dispatch, extract_outputs};
use crate::enforcement::EnforcementContext;
use crate::error::{OperatorError, OperatorResult};
use crate::types::{OperatorInvocation, OperatorSignature};

const STORAGE_NAMESPACE: &str = "operators";
const CATALOG_KEY: &str = "catalog";
const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// Default per-invocation dispatch timeout, used by callers that have no
/// more specific timeout configured.
pub const DEFAULT_INVOKE_TIMEOUT_SECS: u64 = 30;

/// EMA smoothing factor for latency.
const LATENCY_ALPHA: f64 = 0.2;
/// EMA smoothing factor for success rate.
const SUCCESS_ALPHA: f64 = 0.05;

#[derive(Serialize, Deserialize)]
struct CatalogSnapshot {
    operators: Vec<OperatorSignature>,
}

/// The registry of known operators: lookup, behavior-aware invocation, and
/// the invocation history ring used for introspection.
pub struct OperatorRegistry {
    operators: DashMap<OperatorId, OperatorSignature>,
    by_type: DashMap<OperatorType, Vec<OperatorId>>,
    history: Arc<RwLock<Vec<OperatorInvocation>>>,
    history_capacity: usize,
    store: Option<Arc<dyn KvStore>>,
}

impl OperatorRegistry {
    /// A registry with no persistence; state lives only in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            operators: DashMap::new(),
            by_type: DashMap::new(),
            history: Arc::new(RwLock::new(Vec::new())),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            store: None,
        }
    }

    /// A registry backed by `store`; [`Self::load`] restores any
    /// previously-persisted catalog.
    #[must_use]
    pub fn with_store(store: Arc<dyn KvStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::in_memory()
        }
    }

    /// Load a previously-persisted catalog snapshot, if one exists.
    ///
    /// An operator type that no longer deserializes to a known
    /// [`OperatorType`] variant is not possible here (the enum has no
    /// `#[serde(other)]` catch-all) — a corrupt record instead fails the
    /// whole load, surfaced as [`OperatorError::Serialization`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store read or the snapshot deserialization
    /// fails.
    pub async fn load(&self) -> OperatorResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let Some(bytes) = store.get(STORAGE_NAMESPACE, CATALOG_KEY).await? else {
            return Ok(());
        };
        let snapshot: CatalogSnapshot = serde_json::from_slice(&bytes)?;
        for operator in snapshot.operators {
            self.insert(operator);
        }
        Ok(())
    }

    /// Register a new operator, overwriting any existing entry with the
    /// same id.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence is configured and the write fails.
    pub async fn register(&self, operator: OperatorSignature) -> OperatorResult<OperatorId> {
        let id = operator.operator_id.clone();
        self.insert(operator);
        self.persist().await?;
        Ok(id)
    }

    fn insert(&self, operator: OperatorSignature) {
        let id = operator.operator_id.clone();
        let kind = operator.operator_type;
        self.operators.insert(id.clone(), operator);
        self.by_type.entry(kind).or_insert_with(Vec::new).push(id);
    }

    /// Fetch an operator's current signature.
    #[must_use]
    pub fn get(&self, operator_id: &OperatorId) -> Option<OperatorSignature> {
        self.operators.get(operator_id).map(|entry| entry.value().clone())
    }

    /// List every registered operator of a given type.
    #[must_use]
    pub fn get_by_type(&self, operator_type: OperatorType) -> Vec<OperatorSignature> {
        self.by_type
            .get(&operator_type)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// List every registered operator.
    #[must_use]
    pub fn list_all(&self) -> Vec<OperatorSignature> {
        self.operators.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Remove an operator from the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence is configured and the write fails.
    pub async fn unregister(&self, operator_id: &OperatorId) -> OperatorResult<()> {
        if let Some((_, operator)) = self.operators.remove(operator_id) {
            if let Some(mut ids) = self.by_type.get_mut(&operator.operator_type) {
                ids.retain(|id| id != operator_id);
            }
        }
        self.persist().await
    }

    /// Invoke `operator_id` with `inputs`, bounding the dispatch call by
    /// `timeout`.
    ///
    /// Runs the full pipeline: lookup, mandatory kernel enforcement, request
    /// construction, dispatch, success classification, output extraction,
    /// rolling-statistics update, and history recording. Enforcement is
    /// mandatory — `enforcement` is not optional, so this can never silently
    /// skip the kernel check.
    ///
    /// # Errors
    ///
    /// Returns [`OperatorError::NotFound`] if no operator is registered
    /// under `operator_id`. Dispatch failures, timeouts, and persistence
    /// failures are recorded as failed invocations rather than returned as
    /// `Err` — the caller always gets back an [`OperatorInvocation`]
    /// describing what happened, successful or not.
    pub async fn invoke(
        &self,
        operator_id: &OperatorId,
        inputs: HashMap<String, Value>,
        timeout: Duration,
        enforcement: EnforcementContext<'_>,
    ) -> OperatorResult<OperatorInvocation> {
        let Some(mut operator) = self.get(operator_id) else {
            return Err(OperatorError::NotFound(operator_id.to_string()));
        };

        let decision = enforcement
            .kernel
            .enforce_operator_invoke(
                operator_id.as_str(),
                &operator.endpoint_url,
                &operator.method,
                enforcement.actor,
                enforcement.caller_policies,
            )
            .await;

        if !decision.allowed {
            let record = OperatorInvocation::failure(operator_id.clone(), inputs, decision.reason);
            self.record_invocation(record.clone()).await;
            return Ok(record);
        }

        let request = build_request(&operator, &inputs);
        let started = Instant::now();
        let outcome = match tokio::time::timeout(timeout, dispatch(&operator, &request, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(OperatorError::Timeout),
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let record = match outcome {
            Ok(result) if result.success => {
                let outputs = extract_outputs(&operator, &result.body);
                OperatorInvocation {
                    invocation_id: weave_core::InvocationId::new(),
                    operator_id: operator_id.clone(),
                    inputs,
                    outputs: Some(outputs),
                    success: true,
                    latency_ms,
                    timestamp: chrono::Utc::now(),
                    error: None,
                }
            },
            Ok(result) => {
                let mut record = OperatorInvocation::failure(operator_id.clone(), inputs, "non-success response");
                record.latency_ms = latency_ms;
                record.outputs = Some(extract_outputs(&operator, &result.body));
                record
            },
            Err(err) => {
                let mut record = OperatorInvocation::failure(operator_id.clone(), inputs, err.to_string());
                record.latency_ms = latency_ms;
                record
            },
        };

        self.update_stats(&mut operator, &record);
        self.operators.insert(operator_id.clone(), operator);
        self.persist().await?;
        self.record_invocation(record.clone()).await;

        Ok(record)
    }

    fn update_stats(&self, operator: &mut OperatorSignature, record: &OperatorInvocation) {
        operator.invocation_count = operator.invocation_count.saturating_add(1);
        operator.last_used = Some(record.timestamp);

        operator.avg_latency_ms = if operator.invocation_count <= 1 {
            record.latency_ms
        } else {
            LATENCY_ALPHA.mul_add(record.latency_ms, (1.0 - LATENCY_ALPHA) * operator.avg_latency_ms)
        };

        let signal = if record.success { 1.0 } else { 0.0 };
        operator.success_rate = SUCCESS_ALPHA.mul_add(signal, (1.0 - SUCCESS_ALPHA) * operator.success_rate);

        let confidence = if operator.invocation_count <= 5 { 0.5 } else { 1.0 };
        operator.consistency_score = operator.success_rate * confidence;
    }

    async fn record_invocation(&self, record: OperatorInvocation) {
        let mut history = self.history.write().await;
        history.push(record);
        let overflow = history.len().saturating_sub(self.history_capacity);
        if overflow > 0 {
            history.drain(0..overflow);
        }
    }

    /// The most recent invocation records, oldest first, bounded by the
    /// configured history capacity.
    pub async fn recent_invocations(&self) -> Vec<OperatorInvocation> {
        self.history.read().await.clone()
    }

    async fn persist(&self) -> OperatorResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let snapshot = CatalogSnapshot { operators: self.list_all() };
        let bytes = serde_json::to_vec(&snapshot)?;
        store.set(STORAGE_NAMESPACE, CATALOG_KEY, bytes).await?;
        Ok(())
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_kernel::{ActorContext, KernelEnforcer, seed_default_kernel_policy};
    use weave_policy::{PolicyEngine, seed_default_policies};

    fn sample_operator(url: &str) -> OperatorSignature {
        OperatorSignature::new(OperatorId::new(), OperatorType::Compute, url, "GET")
    }

    async fn enforcer_and_caller() -> (KernelEnforcer, PolicyEngine, weave_core::PolicyId) {
        let kernel_engine = PolicyEngine::new();
        seed_default_kernel_policy(&kernel_engine).await;
        let caller = PolicyEngine::new();
        seed_default_policies(&caller).await;
        (
            KernelEnforcer::new(kernel_engine),
            caller,
            weave_core::PolicyId::from_raw(weave_policy::DEFAULT_MASTER_POLICY_ID),
        )
    }

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let registry = OperatorRegistry::in_memory();
        let operator = sample_operator("https://example.com/x");
        let id = registry.register(operator.clone()).await.unwrap();
        let fetched = registry.get(&id).unwrap();
        assert_eq!(fetched.endpoint_url, operator.endpoint_url);
    }

    #[tokio::test]
    async fn invoke_missing_operator_returns_not_found() {
        let registry = OperatorRegistry::in_memory();
        let (enforcer, caller, policy_id) = enforcer_and_caller().await;
        let actor = ActorContext::new(policy_id);
        let ctx = EnforcementContext::new(&enforcer, &actor, &caller);

        let result = registry
            .invoke(&OperatorId::new(), HashMap::new(), Duration::from_secs(DEFAULT_INVOKE_TIMEOUT_SECS), ctx)
            .await;
        assert!(matches!(result, Err(OperatorError::NotFound(_))));
    }

    #[tokio::test]
    async fn invoke_denies_insecure_transport_without_dispatching() {
        let registry = OperatorRegistry::in_memory();
        let operator = sample_operator("http://example.com/insecure");
        let id = registry.register(operator).await.unwrap();

        let (enforcer, caller, policy_id) = enforcer_and_caller().await;
        let actor = ActorContext::new(policy_id);
        let ctx = EnforcementContext::new(&enforcer, &actor, &caller);

        let record = registry
            .invoke(&id, HashMap::new(), Duration::from_secs(DEFAULT_INVOKE_TIMEOUT_SECS), ctx)
            .await
            .unwrap();
        assert!(!record.success);
        assert!(record.error.unwrap().to_lowercase().contains("insecure"));

        let unchanged = registry.get(&id).unwrap();
        assert_eq!(unchanged.invocation_count, 0);
    }

    #[test]
    fn update_stats_applies_ema_formulas() {
        let registry = OperatorRegistry::in_memory();
        let mut operator = sample_operator("https://example.com/x");

        let first = OperatorInvocation {
            invocation_id: weave_core::InvocationId::new(),
            operator_id: operator.operator_id.clone(),
            inputs: HashMap::new(),
            outputs: None,
            success: true,
            latency_ms: 100.0,
            timestamp: chrono::Utc::now(),
            error: None,
        };
        registry.update_stats(&mut operator, &first);
        assert_eq!(operator.invocation_count, 1);
        assert!((operator.avg_latency_ms - 100.0).abs() < f64::EPSILON);
        assert!(operator.consistency_score < 1.0);

        let mut second = first.clone();
        second.latency_ms = 200.0;
        second.success = false;
        registry.update_stats(&mut operator, &second);
        assert_eq!(operator.invocation_count, 2);
        assert!((operator.avg_latency_ms - 120.0).abs() < 1e-9);
        assert!(operator.success_rate < 1.0);
    }

    #[tokio::test]
    async fn history_ring_is_bounded() {
        let registry = OperatorRegistry {
            history_capacity: 2,
            ..OperatorRegistry::in_memory()
        };
        for i in 0..5 {
            registry
                .record_invocation(OperatorInvocation::failure(OperatorId::new(), HashMap::new(), format!("err-{i}")))
                .await;
        }
        let history = registry.recent_invocations().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history.last().unwrap().error.as_deref(), Some("err-4"));
    }

    #[tokio::test]
    async fn persisted_catalog_reloads_into_a_fresh_registry() {
        let store: Arc<dyn KvStore> = Arc::new(weave_storage::MemoryKvStore::new());
        let registry = OperatorRegistry::with_store(store.clone());
        let operator = sample_operator("https://example.com/reload");
        let id = registry.register(operator).await.unwrap();

        let reloaded = OperatorRegistry::with_store(store);
        reloaded.load().await.unwrap();
        assert!(reloaded.get(&id).is_some());
    }
}
