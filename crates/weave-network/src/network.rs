//! The emergent network: not a controller, just the substrate slots react
//! within. Intelligence emerges from collective slot behavior, not from
//! anything this struct decides on its own.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use weave_core::{OperatorId, SlotId};
use weave_kernel::{ActorContext, KernelEnforcer};
use weave_operators::{EnforcementContext, OperatorRegistry};
use weave_policy::PolicyEngine;

use crate::error::{NetworkError, NetworkResult};
use crate::types::{BindingAction, ReactiveBinding, ReactiveSlot, Signal, SlotState, TriggerPattern};

/// Signals are re-evaluated against every slot's queue on this cadence.
const SCHEDULER_TICK: Duration = Duration::from_millis(10);
/// Slot health is swept on this cadence.
const HEALTH_TICK: Duration = Duration::from_secs(10);
/// A slot in `Error` for longer than this self-heals back to `Listening`.
const ERROR_RECOVERY_SECS: i64 = 60;
/// A slot in `Listening` with no activity for this long falls to `Idle`.
const IDLE_TIMEOUT_SECS: i64 = 300;

/// The outcome of [`EmergentNetwork::invoke_operator`].
#[derive(Debug, Clone)]
pub struct InvokeOutcome {
    /// Whether the operator call succeeded.
    pub success: bool,
    /// Extracted outputs, present on success.
    pub outputs: Option<HashMap<String, Value>>,
    /// Observed latency in milliseconds.
    pub latency_ms: f64,
    /// Failure reason, present when `success` is `false`.
    pub error: Option<String>,
}

/// Aggregate state of the network, returned by [`EmergentNetwork::get_state`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct NetworkState {
    /// Whether the scheduler and health loops are running.
    pub running: bool,
    /// Total number of slots.
    pub slots: usize,
    /// Total number of symmetric connections (each pair counted once).
    pub connections: usize,
    /// Count of slots per [`SlotState`].
    pub states: HashMap<String, usize>,
}

/// The reactive slot network: a bounded graph of cooperatively scheduled
/// micro-agents. Cloning an [`EmergentNetwork`] shares the same underlying
/// state — every clone is a handle, not an independent network.
#[derive(Clone)]
pub struct EmergentNetwork {
    registry: Arc<OperatorRegistry>,
    kernel: Arc<KernelEnforcer>,
    caller_policies: Arc<PolicyEngine>,
    actor: ActorContext,
    slots: Arc<RwLock<HashMap<SlotId, ReactiveSlot>>>,
    running: Arc<AtomicBool>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl EmergentNetwork {
    /// Build a network that invokes operators through `registry`, gated by
    /// `kernel` using `actor`'s identity and `caller_policies` for the
    /// break-glass check.
    #[must_use]
    pub fn new(registry: Arc<OperatorRegistry>, kernel: Arc<KernelEnforcer>, caller_policies: Arc<PolicyEngine>, actor: ActorContext) -> Self {
        Self {
            registry,
            kernel,
            caller_policies,
            actor,
            slots: Arc::new(RwLock::new(HashMap::new())),
            running: Arc::new(AtomicBool::new(false)),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Start the scheduler and health-check loops. Idempotent.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let scheduler = self.clone();
        let health = self.clone();
        let mut tasks = self.tasks.lock().await;
        tasks.push(tokio::spawn(async move { scheduler.scheduler_loop().await }));
        tasks.push(tokio::spawn(async move { health.health_loop().await }));

        tracing::info!("emergent network started");
    }

    /// Stop both background loops and wait for them to exit.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
        tracing::info!("emergent network stopped");
    }

    /// Create and register a new slot, returning its id.
    pub async fn create_slot(&self, slot_type: impl Into<String>, operator_ids: Vec<OperatorId>, data: HashMap<String, Value>) -> SlotId {
        let slot = ReactiveSlot::new(slot_type, operator_ids, data);
        let slot_id = slot.slot_id.clone();
        self.slots.write().await.insert(slot_id.clone(), slot);
        slot_id
    }

    /// Connect two slots symmetrically. No-op if either id is unknown.
    pub async fn connect_slots(&self, slot_a: &SlotId, slot_b: &SlotId) {
        let mut slots = self.slots.write().await;
        if slots.contains_key(slot_a) && slots.contains_key(slot_b) {
            slots.get_mut(slot_a).expect("checked above").connections.insert(slot_b.clone());
            slots.get_mut(slot_b).expect("checked above").connections.insert(slot_a.clone());
        }
    }

    /// Attach a reactive binding to a slot. Returns `None` if the slot
    /// doesn't exist.
    pub async fn add_binding(
        &self,
        slot_id: &SlotId,
        trigger_pattern: TriggerPattern,
        action: BindingAction,
        throttle_ms: i64,
        max_invocations: i64,
    ) -> Option<ReactiveBinding> {
        let binding = ReactiveBinding::new(trigger_pattern, action, throttle_ms, max_invocations);
        let mut slots = self.slots.write().await;
        let slot = slots.get_mut(slot_id)?;
        slot.bindings.push(binding.clone());
        Some(binding)
    }

    /// Send a signal into the network: delivered directly if it has a
    /// target, otherwise broadcast to the source's neighbors.
    pub async fn send_signal(&self, signal: Signal) {
        let mut slots = self.slots.write().await;

        if let Some(target) = &signal.target_slot {
            if let Some(slot) = slots.get_mut(target) {
                slot.signal_queue.push(signal);
            }
            return;
        }

        let Some(source) = slots.get(&signal.source_slot) else {
            return;
        };
        let neighbors: Vec<SlotId> = source.connections.iter().cloned().collect();
        let decremented_ttl = signal.ttl.saturating_sub(1);

        if decremented_ttl <= 0 {
            return;
        }

        for neighbor in neighbors {
            let Some(target_slot) = slots.get_mut(&neighbor) else {
                continue;
            };
            let mut path = signal.path.clone();
            path.push(signal.source_slot.clone());
            target_slot.signal_queue.push(Signal {
                signal_id: signal.signal_id.clone(),
                signal_type: signal.signal_type,
                source_slot: signal.source_slot.clone(),
                target_slot: Some(neighbor),
                payload: signal.payload.clone(),
                timestamp: signal.timestamp,
                ttl: decremented_ttl,
                path,
            });
        }
    }

    /// Invoke an operator on behalf of `slot_id`, transitioning its state
    /// around the call the way the scheduler does for binding-triggered
    /// invocations.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::SlotNotFound`] if `slot_id` is unknown, or
    /// [`NetworkError::Operator`] if the underlying invocation errors
    /// outright (not merely unsuccessful).
    pub async fn invoke_operator(&self, slot_id: &SlotId, operator_id: &OperatorId, inputs: HashMap<String, Value>) -> NetworkResult<InvokeOutcome> {
        {
            let mut slots = self.slots.write().await;
            let slot = slots.get_mut(slot_id).ok_or_else(|| NetworkError::SlotNotFound(slot_id.to_string()))?;
            if !slot.operator_ids.contains(operator_id) {
                slot.operator_ids.push(operator_id.clone());
            }
            slot.state = SlotState::Executing;
            slot.last_activity = chrono::Utc::now();
        }

        let enforcement = EnforcementContext::new(&self.kernel, &self.actor, &self.caller_policies);
        let timeout = std::time::Duration::from_secs(weave_operators::DEFAULT_INVOKE_TIMEOUT_SECS);
        let result = self.registry.invoke(operator_id, inputs, timeout, enforcement).await;

        let mut slots = self.slots.write().await;
        let Some(slot) = slots.get_mut(slot_id) else {
            return result.map(invocation_to_outcome).map_err(NetworkError::from);
        };

        match result {
            Ok(invocation) => {
                slot.state = SlotState::Listening;
                Ok(invocation_to_outcome(invocation))
            },
            Err(err) => {
                slot.state = SlotState::Error;
                slot.error_count = slot.error_count.saturating_add(1);
                Err(NetworkError::from(err))
            },
        }
    }

    async fn scheduler_loop(self) {
        let mut ticker = tokio::time::interval(SCHEDULER_TICK);
        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;

            let schedulable: Vec<SlotId> = {
                let slots = self.slots.read().await;
                slots.values().filter(|s| s.is_schedulable()).map(|s| s.slot_id.clone()).collect()
            };

            for slot_id in schedulable {
                self.process_one_signal(&slot_id).await;
            }
        }
    }

    async fn process_one_signal(&self, slot_id: &SlotId) {
        let Some(signal) = ({
            let mut slots = self.slots.write().await;
            let Some(slot) = slots.get_mut(slot_id) else {
                return;
            };
            if slot.signal_queue.is_empty() {
                return;
            }
            slot.state = SlotState::Processing;
            slot.signal_count = slot.signal_count.saturating_add(1);
            slot.last_activity = chrono::Utc::now();
            Some(slot.signal_queue.remove(0))
        }) else {
            return;
        };

        let bindings: Vec<ReactiveBinding> = {
            let slots = self.slots.read().await;
            slots.get(slot_id).map(|s| s.bindings.clone()).unwrap_or_default()
        };

        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut errored = false;

        for (idx, binding) in bindings.iter().enumerate() {
            if !binding.matches(&signal) || !binding.can_invoke(now_ms) {
                continue;
            }

            if let Err(err) = self.execute_binding(slot_id, binding, &signal).await {
                tracing::error!(slot = %slot_id, error = %err, "binding execution failed");
                errored = true;
            }

            let mut slots = self.slots.write().await;
            if let Some(slot) = slots.get_mut(slot_id) {
                if let Some(b) = slot.bindings.get_mut(idx) {
                    b.invocation_count = b.invocation_count.saturating_add(1);
                    b.last_invocation_ms = Some(now_ms);
                }
            }
        }

        let mut slots = self.slots.write().await;
        if let Some(slot) = slots.get_mut(slot_id) {
            if errored {
                slot.state = SlotState::Error;
                slot.error_count = slot.error_count.saturating_add(1);
            } else if slot.state == SlotState::Processing {
                slot.state = SlotState::Listening;
            }
        }
    }

    async fn execute_binding(&self, slot_id: &SlotId, binding: &ReactiveBinding, signal: &Signal) -> NetworkResult<()> {
        match &binding.action {
            BindingAction::InvokeOperator { operator_id, extra_inputs } => {
                let mut inputs = signal.payload.clone();
                inputs.extend(extra_inputs.clone());
                self.invoke_operator(slot_id, operator_id, inputs).await?;
            },
            BindingAction::Forward { target_slot } => {
                let forwarded = Signal {
                    signal_id: weave_core::SignalId::from_raw(format!("fwd_{}", signal.signal_id)),
                    signal_type: signal.signal_type,
                    source_slot: slot_id.clone(),
                    target_slot: Some(target_slot.clone()),
                    payload: signal.payload.clone(),
                    timestamp: signal.timestamp,
                    ttl: signal.ttl.saturating_sub(1),
                    path: {
                        let mut path = signal.path.clone();
                        path.push(slot_id.clone());
                        path
                    },
                };
                self.send_signal(forwarded).await;
            },
            BindingAction::Transform { transform } => {
                tracing::debug!(%transform, "transform action has no built-in effect; payload left unchanged");
            },
        }
        Ok(())
    }

    async fn health_loop(self) {
        let mut ticker = tokio::time::interval(HEALTH_TICK);
        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;
            let now = chrono::Utc::now();
            let mut slots = self.slots.write().await;
            for slot in slots.values_mut() {
                let idle_secs = (now - slot.last_activity).num_seconds();
                if slot.state == SlotState::Error && idle_secs > ERROR_RECOVERY_SECS {
                    slot.state = SlotState::Listening;
                    slot.error_count = 0;
                }
                if slot.state == SlotState::Listening && idle_secs > IDLE_TIMEOUT_SECS {
                    slot.state = SlotState::Idle;
                }
            }
        }
    }

    /// A snapshot of the network's current aggregate state.
    pub async fn get_state(&self) -> NetworkState {
        let slots = self.slots.read().await;
        let mut states = HashMap::new();
        for slot in slots.values() {
            *states.entry(slot_state_label(slot.state).to_owned()).or_insert(0usize) += 1;
        }
        let total_connections: usize = slots.values().map(|s| s.connections.len()).sum::<usize>() / 2;

        NetworkState {
            running: self.running.load(Ordering::SeqCst),
            slots: slots.len(),
            connections: total_connections,
            states,
        }
    }
}

fn slot_state_label(state: SlotState) -> &'static str {
    match state {
        SlotState::Idle => "idle",
        SlotState::Listening => "listening",
        SlotState::Processing => "processing",
        SlotState::Executing => "executing",
        SlotState::Waiting => "waiting",
        SlotState::Error => "error",
        SlotState::Stopped => "stopped",
    }
}

fn invocation_to_outcome(invocation: weave_operators::OperatorInvocation) -> InvokeOutcome {
    InvokeOutcome {
        success: invocation.success,
        outputs: invocation.outputs,
        latency_ms: invocation.latency_ms,
        error: invocation.error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::PolicyId;
    use weave_kernel::seed_default_kernel_policy;
    use weave_operators::OperatorSignature;
    use weave_policy::{DEFAULT_MASTER_POLICY_ID, seed_default_policies};

    async fn network() -> EmergentNetwork {
        let kernel_engine = PolicyEngine::new();
        seed_default_kernel_policy(&kernel_engine).await;
        let caller = PolicyEngine::new();
        seed_default_policies(&caller).await;
        let actor = ActorContext::new(PolicyId::from_raw(DEFAULT_MASTER_POLICY_ID));

        EmergentNetwork::new(Arc::new(OperatorRegistry::in_memory()), Arc::new(KernelEnforcer::new(kernel_engine)), Arc::new(caller), actor)
    }

    #[tokio::test]
    async fn connect_slots_is_symmetric() {
        let net = network().await;
        let a = net.create_slot("generic", Vec::new(), HashMap::new()).await;
        let b = net.create_slot("generic", Vec::new(), HashMap::new()).await;
        net.connect_slots(&a, &b).await;

        let state = net.get_state().await;
        assert_eq!(state.connections, 1);
    }

    #[tokio::test]
    async fn send_signal_with_target_enqueues_directly() {
        let net = network().await;
        let a = net.create_slot("generic", Vec::new(), HashMap::new()).await;
        let signal = Signal::new(crate::types::SignalType::Heartbeat, a.clone(), Some(a.clone()), HashMap::new());
        net.send_signal(signal).await;

        let slots = net.slots.read().await;
        assert_eq!(slots.get(&a).unwrap().signal_queue.len(), 1);
    }

    #[tokio::test]
    async fn broadcast_drops_when_ttl_would_reach_zero() {
        let net = network().await;
        let a = net.create_slot("generic", Vec::new(), HashMap::new()).await;
        let b = net.create_slot("generic", Vec::new(), HashMap::new()).await;
        net.connect_slots(&a, &b).await;

        let signal = Signal::new(crate::types::SignalType::Broadcast, a.clone(), None, HashMap::new()).with_ttl(1);
        net.send_signal(signal).await;

        let slots = net.slots.read().await;
        assert!(slots.get(&b).unwrap().signal_queue.is_empty());
    }

    #[tokio::test]
    async fn broadcast_delivers_decremented_clone_to_neighbors() {
        let net = network().await;
        let a = net.create_slot("generic", Vec::new(), HashMap::new()).await;
        let b = net.create_slot("generic", Vec::new(), HashMap::new()).await;
        net.connect_slots(&a, &b).await;

        let signal = Signal::new(crate::types::SignalType::Broadcast, a.clone(), None, HashMap::new()).with_ttl(3);
        net.send_signal(signal).await;

        let slots = net.slots.read().await;
        let delivered = &slots.get(&b).unwrap().signal_queue[0];
        assert_eq!(delivered.ttl, 2);
        assert_eq!(delivered.path, vec![a]);
    }

    #[tokio::test]
    async fn invoke_operator_transitions_to_error_on_missing_operator() {
        let net = network().await;
        let slot = net.create_slot("generic", Vec::new(), HashMap::new()).await;

        // No operator is registered under this id, so the registry call
        // itself returns `NotFound` rather than a failed-but-recorded
        // invocation, which is the only way `invoke_operator` returns `Err`.
        let result = net.invoke_operator(&slot, &OperatorId::new(), HashMap::new()).await;
        assert!(result.is_err());

        let slots = net.slots.read().await;
        assert_eq!(slots.get(&slot).unwrap().state, SlotState::Error);
    }

    #[tokio::test]
    async fn invoke_operator_transitions_back_to_listening_on_success() {
        let net = network().await;
        let slot = net.create_slot("generic", Vec::new(), HashMap::new()).await;
        let mut operator = OperatorSignature::new(OperatorId::new(), weave_core::OperatorType::Compute, "cat", "MCP");
        operator.source_registered_by_master = true;
        let op_id = net.registry.register(operator).await.unwrap();

        // A stdio MCP operator backed by `cat` echoes the JSON-RPC request
        // straight back, so dispatch succeeds with no live server involved.
        let result = net.invoke_operator(&slot, &op_id, HashMap::new()).await.unwrap();
        assert!(result.success);

        let slots = net.slots.read().await;
        assert_eq!(slots.get(&slot).unwrap().state, SlotState::Listening);
    }

    #[tokio::test]
    async fn invoke_operator_unknown_slot_errors() {
        let net = network().await;
        let result = net.invoke_operator(&SlotId::new(), &OperatorId::new(), HashMap::new()).await;
        assert!(matches!(result, Err(NetworkError::SlotNotFound(_))));
    }
}
