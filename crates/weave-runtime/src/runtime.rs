//! The composition root: builds every subsystem exactly once per process.

use std::sync::Arc;

use weave_auth::{AuthGateway, KeyManager};
use weave_config::Config;
use weave_discovery::DiscoveryEngine;
use weave_dispatcher::Dispatcher;
use weave_kernel::{ActorContext, KernelEnforcer, seed_default_kernel_policy};
use weave_memory::MemoryStore;
use weave_network::EmergentNetwork;
use weave_operators::OperatorRegistry;
use weave_policy::{DEFAULT_MASTER_POLICY_ID, PolicyEngine, seed_default_policies};
use weave_storage::MemoryKvStore;

use crate::error::RuntimeResult;

/// Every subsystem the control plane needs, constructed once and handed
/// out as `Arc`-shared handles. There are no module-level singletons
/// anywhere in this workspace; a process that wants the control plane
/// builds exactly one `Runtime` and passes it (or its handles) down to
/// whatever serves requests.
pub struct Runtime {
    /// Resolved process configuration.
    pub config: Config,
    /// Per-key policy engine, evaluated for every caller-facing request.
    pub caller_policies: Arc<PolicyEngine>,
    /// Global kernel policy engine, evaluated for every sensitive
    /// operation regardless of caller policy.
    pub kernel: Arc<KernelEnforcer>,
    /// API key / session / JWT authentication gateway.
    pub auth: Arc<AuthGateway>,
    /// The operator catalog and invocation pipeline.
    pub operators: Arc<OperatorRegistry>,
    /// The reactive slot network.
    pub network: Arc<EmergentNetwork>,
    /// The content-addressed memory store.
    pub memory: Arc<MemoryStore>,
    /// The capability discovery engine.
    pub discovery: Arc<DiscoveryEngine>,
    /// The thought router tying the four subsystems above together.
    pub dispatcher: Arc<Dispatcher>,
}

impl Runtime {
    /// Assemble every subsystem from a resolved [`Config`].
    ///
    /// Uses in-memory backing stores throughout; a deployment that needs
    /// durable storage constructs its own [`weave_storage::SurrealKvStore`]
    /// (behind the `db` feature) and swaps it in before calling this, or
    /// extends this constructor to accept one.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::RuntimeError`] if any subsystem fails to
    /// initialize (e.g. a configured catalog snapshot fails to load).
    pub async fn build(config: Config) -> RuntimeResult<Self> {
        let kernel_policies = PolicyEngine::new();
        seed_default_kernel_policy(&kernel_policies).await;
        let kernel = Arc::new(KernelEnforcer::new(kernel_policies));

        let caller_engine = PolicyEngine::new();
        seed_default_policies(&caller_engine).await;
        let caller_policies = Arc::new(caller_engine);

        let actor = ActorContext::new(weave_core::PolicyId::from_raw(DEFAULT_MASTER_POLICY_ID));

        let jwt_secret = config
            .jwt_secret
            .clone()
            .unwrap_or_else(|| "development-only-insecure-secret-not-for-prod".to_owned())
            .into_bytes();
        let keys = KeyManager::in_memory((*caller_policies).clone());
        let auth = Arc::new(AuthGateway::new(keys, (*caller_policies).clone(), jwt_secret));

        let operators = OperatorRegistry::with_store(Arc::new(MemoryKvStore::new()));
        operators.load().await.map_err(anyhow::Error::from)?;
        let operators = Arc::new(operators);

        let network = Arc::new(EmergentNetwork::new(
            Arc::clone(&operators),
            Arc::clone(&kernel),
            Arc::clone(&caller_policies),
            actor.clone(),
        ));

        let memory = Arc::new(MemoryStore::in_memory());

        let discovery = Arc::new(DiscoveryEngine::new(Arc::clone(&kernel), actor.clone(), Arc::clone(&caller_policies)));

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&operators),
            Arc::clone(&network),
            Arc::clone(&memory),
            Arc::clone(&discovery),
            Arc::clone(&kernel),
            actor,
            Arc::clone(&caller_policies),
        ));

        Ok(Self {
            config,
            caller_policies,
            kernel,
            auth,
            operators,
            network,
            memory,
            discovery,
            dispatcher,
        })
    }

    /// Register the default operator-promotion hook and start the
    /// dispatcher (network loops, initial discovery, core slots).
    pub async fn start(&self) {
        self.discovery
            .on_discovery(Arc::new(weave_discovery::DefaultPromotionHook::new(Arc::clone(&self.operators))));
        self.dispatcher.initialize().await;
    }

    /// Stop the network loops, leaving all state intact.
    pub async fn shutdown(&self) {
        self.dispatcher.suspend().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_constructs_every_subsystem_once() {
        let runtime = Runtime::build(Config::default()).await.unwrap();
        runtime.start().await;
        assert_eq!(runtime.network.get_state().await.slots, 3);
        runtime.shutdown().await;
    }
}
