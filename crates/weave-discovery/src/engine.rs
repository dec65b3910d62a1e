//! The discovery engine: owns registered sources and the capability
//! catalog found by probing them.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use weave_core::{CapabilityId, PermissionLevel, ResourceType, SourceId};
use weave_kernel::{ActorContext, KernelEnforcer};
use weave_policy::{AccessContext, PolicyEngine};

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::probers;
use crate::promotion::DiscoveryHook;
use crate::types::{Capability, CapabilityType, DiscoverySource};

const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;

/// Aggregate counts over the current catalog, for introspection.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryStats {
    /// Total registered sources.
    pub sources: usize,
    /// Total known capabilities.
    pub capabilities: usize,
    /// Capabilities currently considered healthy.
    pub healthy_capabilities: usize,
    /// Capability count grouped by [`CapabilityType`].
    pub by_type: std::collections::HashMap<String, usize>,
}

/// Finds and tracks capabilities exposed by external sources, and promotes
/// the ones that clear kernel enforcement into whatever hooks are
/// registered (typically the operator catalog).
pub struct DiscoveryEngine {
    sources: DashMap<SourceId, DiscoverySource>,
    capabilities: DashMap<CapabilityId, Capability>,
    hooks: std::sync::RwLock<Vec<Arc<dyn DiscoveryHook>>>,
    kernel: Arc<KernelEnforcer>,
    actor: ActorContext,
    caller_policies: Arc<PolicyEngine>,
}

impl DiscoveryEngine {
    /// Build an engine that enforces every promotion through `kernel`.
    #[must_use]
    pub fn new(kernel: Arc<KernelEnforcer>, actor: ActorContext, caller_policies: Arc<PolicyEngine>) -> Self {
        Self {
            sources: DashMap::new(),
            capabilities: DashMap::new(),
            hooks: std::sync::RwLock::new(Vec::new()),
            kernel,
            actor,
            caller_policies,
        }
    }

    /// Register a source to be discovered against.
    ///
    /// Records whether the registering caller held MASTER, since an MCP
    /// stdio operator backed by this source may only be dispatched when it
    /// was.
    pub async fn register_source(&self, mut source: DiscoverySource) -> SourceId {
        let mut ctx = AccessContext::new();
        if let Some(ip) = &self.actor.ip {
            ctx = ctx.with_ip(ip.clone());
        }
        let decision = self
            .caller_policies
            .check_access(&self.actor.caller_policy_id, ResourceType::Discovery, None, PermissionLevel::Master, &ctx)
            .await;
        source.registered_by_master = decision.allowed;

        let id = source.source_id.clone();
        self.sources.insert(id.clone(), source);
        id
    }

    /// Register a hook to run for every capability that is promoted.
    pub fn on_discovery(&self, hook: Arc<dyn DiscoveryHook>) {
        if let Ok(mut hooks) = self.hooks.write() {
            hooks.push(hook);
        }
    }

    /// Run discovery against every active source.
    pub async fn discover_all(&self) -> Vec<Capability> {
        let source_ids: Vec<SourceId> = self
            .sources
            .iter()
            .filter(|entry| entry.value().is_active)
            .map(|entry| entry.key().clone())
            .collect();

        let mut found = Vec::new();
        for source_id in source_ids {
            match self.discover_from_source(&source_id).await {
                Ok(capabilities) => found.extend(capabilities),
                Err(error) => tracing::warn!(source = %source_id.as_str(), %error, "discovery run failed"),
            }
        }
        found
    }

    /// Run discovery against a single source, promoting whatever passes
    /// kernel enforcement.
    pub async fn discover_from_source(&self, source_id: &SourceId) -> DiscoveryResult<Vec<Capability>> {
        let source = self
            .sources
            .get(source_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DiscoveryError::SourceNotFound(source_id.as_str().to_owned()))?;

        let candidates = probers::discover(&source).await?;
        let mut promoted = Vec::new();

        for mut capability in candidates {
            capability.source_registered_by_master = source.registered_by_master;
            let decision = self
                .kernel
                .enforce_discovery_register(
                    capability_type_label(capability.capability_type),
                    &capability.endpoint,
                    &capability.method,
                    &self.actor,
                    &self.caller_policies,
                )
                .await;

            if !decision.allowed {
                tracing::debug!(capability = %capability.name, reason = %decision.reason, "capability discovery denied by kernel");
                continue;
            }

            self.capabilities.insert(capability.capability_id.clone(), capability.clone());
            let hooks = self.hooks.read().map(|hooks| hooks.clone()).unwrap_or_default();
            for hook in &hooks {
                hook.on_capability(&capability).await;
            }
            promoted.push(capability);
        }

        if let Some(mut entry) = self.sources.get_mut(source_id) {
            entry.last_discovery = Some(Utc::now());
            entry.capabilities_found = promoted.len();
        }

        Ok(promoted)
    }

    /// Probe a single capability's endpoint and record health/latency.
    pub async fn health_check(&self, capability_id: &CapabilityId) -> DiscoveryResult<bool> {
        let endpoint = self
            .capabilities
            .get(capability_id)
            .map(|entry| entry.endpoint.clone())
            .ok_or_else(|| DiscoveryError::CapabilityNotFound(capability_id.as_str().to_owned()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
            .build()?;
        let started = Instant::now();
        let result = client.get(&endpoint).send().await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let healthy = result.is_ok_and(|response| response.status().is_success());

        if let Some(mut entry) = self.capabilities.get_mut(capability_id) {
            entry.last_health_check = Some(Utc::now());
            entry.is_healthy = healthy;
            entry.response_time_ms = latency_ms;
            entry.call_count = entry.call_count.saturating_add(1);
            if healthy {
                entry.success_count = entry.success_count.saturating_add(1);
            }
        }
        Ok(healthy)
    }

    /// Health-check every known capability, sequentially.
    pub async fn health_check_all(&self) {
        let ids: Vec<CapabilityId> = self.capabilities.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            if let Err(error) = self.health_check(&id).await {
                tracing::warn!(capability = %id.as_str(), %error, "health check failed");
            }
        }
    }

    /// Look up a capability by id.
    #[must_use]
    pub fn get_capability(&self, capability_id: &CapabilityId) -> Option<Capability> {
        self.capabilities.get(capability_id).map(|entry| entry.value().clone())
    }

    /// Search the catalog by name substring, type, tag intersection, and
    /// health.
    #[must_use]
    pub fn search_capabilities(
        &self,
        name_contains: Option<&str>,
        capability_type: Option<CapabilityType>,
        tags: &[String],
        healthy_only: bool,
    ) -> Vec<Capability> {
        let required_tags: HashSet<&String> = tags.iter().collect();
        self.capabilities
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|capability| {
                name_contains.is_none_or(|needle| capability.name.to_ascii_lowercase().contains(&needle.to_ascii_lowercase()))
            })
            .filter(|capability| capability_type.is_none_or(|wanted| capability.capability_type == wanted))
            .filter(|capability| required_tags.iter().all(|tag| capability.tags.contains(*tag)))
            .filter(|capability| !healthy_only || capability.is_healthy)
            .collect()
    }

    /// Aggregate counts over the current catalog.
    #[must_use]
    pub fn stats(&self) -> DiscoveryStats {
        let mut by_type = std::collections::HashMap::new();
        let mut healthy = 0;
        for entry in &self.capabilities {
            let capability = entry.value();
            let count = by_type.entry(format!("{:?}", capability.capability_type)).or_insert(0usize);
            *count = count.saturating_add(1);
            if capability.is_healthy {
                healthy = healthy.saturating_add(1);
            }
        }
        DiscoveryStats {
            sources: self.sources.len(),
            capabilities: self.capabilities.len(),
            healthy_capabilities: healthy,
            by_type,
        }
    }
}

fn capability_type_label(capability_type: CapabilityType) -> &'static str {
    match capability_type {
        CapabilityType::RestApi => "rest_api",
        CapabilityType::GraphQl => "graphql",
        CapabilityType::Websocket => "websocket",
        CapabilityType::Function => "function",
        CapabilityType::Tool => "tool",
        CapabilityType::Model => "model",
        CapabilityType::Database => "database",
        CapabilityType::Storage => "storage",
        CapabilityType::Queue => "queue",
        CapabilityType::Stream => "stream",
        CapabilityType::Unknown => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::PolicyId;
    use weave_kernel::seed_default_kernel_policy;
    use weave_policy::{seed_default_policies, DEFAULT_MASTER_POLICY_ID};

    async fn engine() -> DiscoveryEngine {
        let kernel_engine = PolicyEngine::new();
        seed_default_kernel_policy(&kernel_engine).await;
        let caller = PolicyEngine::new();
        seed_default_policies(&caller).await;
        let actor = ActorContext::new(PolicyId::from_raw(DEFAULT_MASTER_POLICY_ID));
        DiscoveryEngine::new(Arc::new(KernelEnforcer::new(kernel_engine)), actor, Arc::new(caller))
    }

    #[tokio::test]
    async fn register_source_is_retrievable_through_discover_from_source_errors() {
        let engine = engine().await;
        let source = DiscoverySource::new("svc", "https://example.invalid", crate::types::DiscoveryMethod::Probe);
        let id = engine.register_source(source).await;
        // No live server; discover_from_source still exercises the full
        // pipeline up to (and including) the network call failing.
        let result = engine.discover_from_source(&id).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn register_source_records_master_registration() {
        let engine = engine().await;
        let source = DiscoverySource::new("svc", "mcp-tool --flag", crate::types::DiscoveryMethod::Mcp);
        let id = engine.register_source(source).await;
        assert!(engine.sources.get(&id).unwrap().registered_by_master);
    }

    #[tokio::test]
    async fn register_source_does_not_mark_non_master_caller() {
        let kernel_engine = PolicyEngine::new();
        seed_default_kernel_policy(&kernel_engine).await;
        let caller = PolicyEngine::new();
        seed_default_policies(&caller).await;
        let actor = ActorContext::new(PolicyId::from_raw(weave_policy::DEFAULT_USER_POLICY_ID));
        let engine = DiscoveryEngine::new(Arc::new(KernelEnforcer::new(kernel_engine)), actor, Arc::new(caller));

        let source = DiscoverySource::new("svc", "mcp-tool --flag", crate::types::DiscoveryMethod::Mcp);
        let id = engine.register_source(source).await;
        assert!(!engine.sources.get(&id).unwrap().registered_by_master);
    }

    #[tokio::test]
    async fn discover_from_source_errors_for_unknown_source() {
        let engine = engine().await;
        let unknown = SourceId::new();
        let result = engine.discover_from_source(&unknown).await;
        assert!(matches!(result, Err(DiscoveryError::SourceNotFound(_))));
    }

    #[tokio::test]
    async fn search_capabilities_filters_by_tag_intersection() {
        let engine = engine().await;
        let mut a = Capability::new(
            CapabilityId::new(),
            "alpha",
            CapabilityType::Tool,
            "https://x/a",
            "GET",
            crate::types::DiscoveryMethod::Probe,
            "src",
        );
        a.tags = ["search", "docs"].into_iter().map(str::to_owned).collect();
        let mut b = Capability::new(
            CapabilityId::new(),
            "beta",
            CapabilityType::Tool,
            "https://x/b",
            "GET",
            crate::types::DiscoveryMethod::Probe,
            "src",
        );
        b.tags = ["search"].into_iter().map(str::to_owned).collect();

        engine.capabilities.insert(a.capability_id.clone(), a);
        engine.capabilities.insert(b.capability_id.clone(), b);

        let found = engine.search_capabilities(None, None, &["search".to_owned(), "docs".to_owned()], false);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "alpha");
    }

    #[tokio::test]
    async fn stats_counts_by_type_and_health() {
        let engine = engine().await;
        let mut capability = Capability::new(
            CapabilityId::new(),
            "alpha",
            CapabilityType::RestApi,
            "https://x/a",
            "GET",
            crate::types::DiscoveryMethod::Probe,
            "src",
        );
        capability.is_healthy = false;
        engine.capabilities.insert(capability.capability_id.clone(), capability);

        let stats = engine.stats();
        assert_eq!(stats.capabilities, 1);
        assert_eq!(stats.healthy_capabilities, 0);
        assert_eq!(stats.by_type.get("RestApi"), Some(&1));
    }
}
