//! Promotion hooks: what happens to a [`Capability`] once it has cleared
//! kernel enforcement and been stored.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use weave_core::OperatorType;
use weave_operators::{OperatorRegistry, OperatorSignature};

use crate::types::{Capability, CapabilityType};

/// Reacts to a newly-registered capability. Implementations should not
/// assume they run before or after any other hook.
#[async_trait]
pub trait DiscoveryHook: Send + Sync {
    /// Called once per capability that passed kernel enforcement and was
    /// stored in the engine's catalog.
    async fn on_capability(&self, capability: &Capability);
}

/// Promotes every discovered capability into the operator catalog so it
/// becomes callable the same way a hand-registered operator is.
pub struct DefaultPromotionHook {
    registry: Arc<OperatorRegistry>,
}

impl DefaultPromotionHook {
    /// Promote discoveries into `registry`.
    #[must_use]
    pub fn new(registry: Arc<OperatorRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl DiscoveryHook for DefaultPromotionHook {
    async fn on_capability(&self, capability: &Capability) {
        if !matches!(
            capability.capability_type,
            CapabilityType::Tool | CapabilityType::Function | CapabilityType::RestApi
        ) {
            return;
        }

        let operator_type = OperatorType::classify_lexically(&capability.name);

        let mut headers = HashMap::new();
        headers.insert("x-source".to_owned(), capability.source.clone());
        headers.insert(
            "x-discovery-method".to_owned(),
            format!("{:?}", capability.discovery_method).to_ascii_lowercase(),
        );
        headers.insert("x-tool-name".to_owned(), capability.name.clone());

        let mut signature = OperatorSignature::new(
            weave_core::OperatorId::from_raw(capability.capability_id.as_str().replace("cap_", "op_")),
            operator_type,
            capability.endpoint.clone(),
            capability.method.clone(),
        );
        signature.headers = headers;
        signature.response_schema = capability.output_schema.clone();
        signature.source_registered_by_master = capability.source_registered_by_master;

        if let Err(error) = self.registry.register(signature).await {
            tracing::warn!(capability = %capability.name, %error, "failed to promote discovered capability");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CapabilityType, DiscoveryMethod};
    use weave_core::CapabilityId;

    #[tokio::test]
    async fn promoting_a_capability_registers_an_operator() {
        let registry = Arc::new(OperatorRegistry::in_memory());
        let hook = DefaultPromotionHook::new(Arc::clone(&registry));

        let capability = Capability::new(
            CapabilityId::from_raw("cap_abc123"),
            "search_documents",
            CapabilityType::RestApi,
            "https://example.com/search",
            "GET",
            DiscoveryMethod::Probe,
            "src_1",
        );
        hook.on_capability(&capability).await;

        let promoted = registry.get(&weave_core::OperatorId::from_raw("op_abc123"));
        assert!(promoted.is_some());
        assert_eq!(promoted.unwrap().operator_type, OperatorType::Search);
    }

    #[tokio::test]
    async fn non_executable_capability_types_are_not_promoted() {
        let registry = Arc::new(OperatorRegistry::in_memory());
        let hook = DefaultPromotionHook::new(Arc::clone(&registry));

        let capability = Capability::new(
            CapabilityId::from_raw("cap_stream1"),
            "tick_stream",
            CapabilityType::Stream,
            "https://example.com/stream",
            "GET",
            DiscoveryMethod::Probe,
            "src_1",
        );
        hook.on_capability(&capability).await;

        assert!(registry.get(&weave_core::OperatorId::from_raw("op_stream1")).is_none());
    }

    #[tokio::test]
    async fn master_registered_source_flag_is_propagated_to_operator() {
        let registry = Arc::new(OperatorRegistry::in_memory());
        let hook = DefaultPromotionHook::new(Arc::clone(&registry));

        let mut capability = Capability::new(
            CapabilityId::from_raw("cap_tool1"),
            "run_tool",
            CapabilityType::Tool,
            "some-cmd --flag",
            "MCP",
            DiscoveryMethod::Mcp,
            "src_1",
        );
        capability.source_registered_by_master = true;
        hook.on_capability(&capability).await;

        let promoted = registry.get(&weave_core::OperatorId::from_raw("op_tool1")).unwrap();
        assert!(promoted.source_registered_by_master);
    }
}
