//! Chains multiple operators together, feeding each step's outputs into the
//! next step's inputs, short-circuiting on the first failure.

use std::collections::HashMap;
use std::sync::Arc;

use std::time::Duration;

use serde_json::Value;
use weave_core::OperatorId;

use crate::enforcement::EnforcementContext;
use crate::error::OperatorResult;
use crate::registry::{DEFAULT_INVOKE_TIMEOUT_SECS, OperatorRegistry};
use crate::types::OperatorInvocation;

/// A transform applied to the running input map before a pipeline step runs.
pub type StepTransform = Arc<dyn Fn(HashMap<String, Value>) -> HashMap<String, Value> + Send + Sync>;

struct Step {
    operator_id: OperatorId,
    transform: Option<StepTransform>,
}

/// The outcome of running a whole pipeline.
pub struct PipelineOutcome {
    /// Whether every step succeeded.
    pub success: bool,
    /// The step index the pipeline stopped at, if it failed.
    pub failed_at_step: Option<usize>,
    /// The final step's outputs, present only on success.
    pub final_output: Option<HashMap<String, Value>>,
    /// Every step's invocation record, in order, up to and including the
    /// failing step.
    pub results: Vec<OperatorInvocation>,
}

/// Compose operators into a pipeline: higher-order behavior built from
/// primitive operators.
pub struct OperatorPipeline {
    registry: Arc<OperatorRegistry>,
    steps: Vec<Step>,
}

impl OperatorPipeline {
    /// Build an empty pipeline against `registry`.
    #[must_use]
    pub fn new(registry: Arc<OperatorRegistry>) -> Self {
        Self { registry, steps: Vec::new() }
    }

    /// Append a step, builder-style. `transform`, if given, is applied to
    /// the running input map immediately before this step is invoked.
    #[must_use]
    pub fn add(mut self, operator_id: OperatorId, transform: Option<StepTransform>) -> Self {
        self.steps.push(Step { operator_id, transform });
        self
    }

    /// Run every step in order. Each step's invocation borrows a fresh
    /// [`EnforcementContext`] built from `enforcement_for` so kernel
    /// enforcement runs per-step, not once for the whole pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error only if a step's underlying registry call errors
    /// (e.g. an unknown operator id); an operator that runs but fails is
    /// reported via [`PipelineOutcome::success`], not as an `Err`.
    pub async fn execute<'a, F>(&self, initial_inputs: HashMap<String, Value>, mut enforcement_for: F) -> OperatorResult<PipelineOutcome>
    where
        F: FnMut(usize, &OperatorId) -> EnforcementContext<'a>,
    {
        let mut current_inputs = initial_inputs;
        let mut results = Vec::with_capacity(self.steps.len());

        for (idx, step) in self.steps.iter().enumerate() {
            if let Some(transform) = &step.transform {
                current_inputs = transform(current_inputs);
            }

            let enforcement = enforcement_for(idx, &step.operator_id);
            let timeout = Duration::from_secs(DEFAULT_INVOKE_TIMEOUT_SECS);
            let invocation = self.registry.invoke(&step.operator_id, current_inputs.clone(), timeout, enforcement).await?;
            let succeeded = invocation.success;
            let outputs = invocation.outputs.clone();
            results.push(invocation);

            if !succeeded {
                return Ok(PipelineOutcome {
                    success: false,
                    failed_at_step: Some(idx),
                    final_output: None,
                    results,
                });
            }

            current_inputs = outputs.unwrap_or_default();
        }

        Ok(PipelineOutcome {
            success: true,
            failed_at_step: None,
            final_output: Some(current_inputs),
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::OperatorType;
    use weave_kernel::{ActorContext, KernelEnforcer, seed_default_kernel_policy};
    use weave_policy::{PolicyEngine, seed_default_policies};

    async fn harness() -> (Arc<OperatorRegistry>, KernelEnforcer, PolicyEngine, weave_core::PolicyId) {
        let registry = Arc::new(OperatorRegistry::in_memory());
        let kernel_engine = PolicyEngine::new();
        seed_default_kernel_policy(&kernel_engine).await;
        let caller = PolicyEngine::new();
        seed_default_policies(&caller).await;
        (
            registry,
            KernelEnforcer::new(kernel_engine),
            caller,
            weave_core::PolicyId::from_raw(weave_policy::DEFAULT_MASTER_POLICY_ID),
        )
    }

    #[tokio::test]
    async fn pipeline_short_circuits_on_first_failure() {
        let (registry, enforcer, caller, policy_id) = harness().await;
        let actor = ActorContext::new(policy_id);

        let insecure_op = registry
            .register(weave_operators_test_sig("http://example.com/bad"))
            .await
            .unwrap();
        let never_reached = registry
            .register(weave_operators_test_sig("https://example.com/good"))
            .await
            .unwrap();

        let pipeline = OperatorPipeline::new(registry.clone())
            .add(insecure_op, None)
            .add(never_reached, None);

        let outcome = pipeline
            .execute(HashMap::new(), |_, _| EnforcementContext::new(&enforcer, &actor, &caller))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.failed_at_step, Some(0));
        assert_eq!(outcome.results.len(), 1);
    }

    fn weave_operators_test_sig(url: &str) -> crate::types::OperatorSignature {
        crate::types::OperatorSignature::new(weave_core::OperatorId::new(), OperatorType::Compute, url, "GET")
    }
}
