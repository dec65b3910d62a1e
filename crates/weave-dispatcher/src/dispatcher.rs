//! The dispatcher: routes thoughts to the subsystem each type needs and
//! folds the result back into memory. Holds no domain intelligence beyond
//! this routing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;
use weave_core::{GoalId, OperatorId, SlotId, ThoughtId};
use weave_discovery::DiscoveryEngine;
use weave_kernel::{ActorContext, KernelEnforcer};
use weave_memory::MemoryStore;
use weave_network::{EmergentNetwork, Signal, SignalType};
use weave_operators::{EnforcementContext, OperatorRegistry};
use weave_policy::PolicyEngine;

use crate::error::DispatcherResult;
use crate::types::{BrainState, Goal, Thought, ThoughtType};

const RECENT_THOUGHT_WINDOW: usize = 10;
const ADAPT_FORGET_THRESHOLD: f64 = 0.1;
const LEARNING_IMPORTANCE: f64 = 0.8;
const OBSERVATION_IMPORTANCE: f64 = 0.6;
const THOUGHT_PATTERN_IMPORTANCE: f64 = 0.4;
const THOUGHT_MEMORY_IMPORTANCE: f64 = 0.5;
const PLANNING_RECALL_LIMIT: usize = 5;
const QUERY_RECALL_LIMIT: usize = 5;
const QUERY_PREVIEW_LIMIT: usize = 3;
const ADAPT_PATTERN_RECALL_LIMIT: usize = 100;
const INPUT_SUMMARY_CHARS: usize = 100;

/// Central coordinator: wires operators, network, memory and discovery
/// together behind one `think(thought)` entry point.
pub struct Dispatcher {
    operators: Arc<OperatorRegistry>,
    network: Arc<EmergentNetwork>,
    memory: Arc<MemoryStore>,
    discovery: Arc<DiscoveryEngine>,
    kernel: Arc<KernelEnforcer>,
    actor: ActorContext,
    caller_policies: Arc<PolicyEngine>,
    state: RwLock<BrainState>,
    thoughts: RwLock<HashMap<ThoughtId, Thought>>,
    goals: RwLock<HashMap<GoalId, Goal>>,
    total_thoughts: AtomicU64,
    successful_thoughts: AtomicU64,
    started_at: Instant,
    query_slot: RwLock<Option<SlotId>>,
    command_slot: RwLock<Option<SlotId>>,
    learning_slot: RwLock<Option<SlotId>>,
}

/// Aggregate counters reported by [`Dispatcher::stats`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatcherStats {
    /// Current operational state.
    pub state: BrainState,
    /// Seconds since the dispatcher was constructed.
    pub uptime_seconds: f64,
    /// Total thoughts submitted.
    pub total_thoughts: u64,
    /// Thoughts that processed without error.
    pub successful_thoughts: u64,
    /// `successful_thoughts / total_thoughts`, or `1.0` with none yet.
    pub success_rate: f64,
    /// Goals not yet marked complete.
    pub active_goals: usize,
    /// Goals marked complete.
    pub completed_goals: usize,
}

impl Dispatcher {
    /// Wire the four subsystems together behind one router.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        operators: Arc<OperatorRegistry>,
        network: Arc<EmergentNetwork>,
        memory: Arc<MemoryStore>,
        discovery: Arc<DiscoveryEngine>,
        kernel: Arc<KernelEnforcer>,
        actor: ActorContext,
        caller_policies: Arc<PolicyEngine>,
    ) -> Self {
        Self {
            operators,
            network,
            memory,
            discovery,
            kernel,
            actor,
            caller_policies,
            state: RwLock::new(BrainState::Initializing),
            thoughts: RwLock::new(HashMap::new()),
            goals: RwLock::new(HashMap::new()),
            total_thoughts: AtomicU64::new(0),
            successful_thoughts: AtomicU64::new(0),
            started_at: Instant::now(),
            query_slot: RwLock::new(None),
            command_slot: RwLock::new(None),
            learning_slot: RwLock::new(None),
        }
    }

    fn enforcement(&self) -> EnforcementContext<'_> {
        EnforcementContext::new(&self.kernel, &self.actor, &self.caller_policies)
    }

    /// Start the network, run an initial discovery pass, and create the
    /// three core processing slots.
    pub async fn initialize(&self) {
        tracing::info!("dispatcher initializing");
        self.network.start().await;
        self.discovery.discover_all().await;
        self.create_core_slots().await;
        *self.state.write().await = BrainState::Ready;
        tracing::info!("dispatcher ready");
    }

    async fn create_core_slots(&self) {
        let query = self.network.create_slot("brain_query", Vec::new(), HashMap::new()).await;
        let command = self.network.create_slot("brain_command", Vec::new(), HashMap::new()).await;
        let learning = self.network.create_slot("brain_learning", Vec::new(), HashMap::new()).await;

        self.network.connect_slots(&query, &learning).await;
        self.network.connect_slots(&command, &learning).await;

        *self.query_slot.write().await = Some(query);
        *self.command_slot.write().await = Some(command);
        *self.learning_slot.write().await = Some(learning);
    }

    /// Route a thought to the handler its type calls for, storing it (and,
    /// on success, a `thought_pattern` memory) as a side effect.
    pub async fn think(&self, mut thought: Thought) -> Value {
        self.total_thoughts.fetch_add(1, Ordering::Relaxed);
        *self.state.write().await = BrainState::Processing;

        let tags: std::collections::HashSet<String> = ["thought".to_owned(), thought.thought_type.label().to_owned()].into_iter().collect();
        let _ = self
            .memory
            .store(
                serde_json::json!({
                    "type": "thought",
                    "thought_type": thought.thought_type.label(),
                    "content": thought.content,
                }),
                "thought",
                THOUGHT_MEMORY_IMPORTANCE,
                tags,
                std::collections::HashSet::new(),
            )
            .await;

        let result = match thought.thought_type {
            ThoughtType::Query => self.process_query(&thought).await,
            ThoughtType::Command => self.process_command(&thought).await,
            ThoughtType::Observation => self.process_observation(&thought).await,
            ThoughtType::Reflection => self.process_reflection().await,
            ThoughtType::Planning => self.process_planning(&thought).await,
            ThoughtType::Learning => self.process_learning(&thought).await,
        };

        let now = chrono::Utc::now();
        thought.processed_at = Some(now);
        thought.result = Some(result.clone());

        let succeeded = !result.get("error").is_some_and(|_| true);
        if succeeded {
            self.successful_thoughts.fetch_add(1, Ordering::Relaxed);
            self.learn_from_thought(&thought).await;
        }

        self.thoughts.write().await.insert(thought.thought_id.clone(), thought);
        *self.state.write().await = BrainState::Ready;
        result
    }

    async fn process_query(&self, thought: &Thought) -> Value {
        let query_str = thought.content.as_str();
        let memories = self.memory.recall(None, query_str, None, None, QUERY_RECALL_LIMIT).await.unwrap_or_default();
        let capabilities = self.discovery.search_capabilities(query_str, None, &[], true);

        let query_slot = self.query_slot.read().await.clone();
        if let Some(source) = query_slot {
            let mut payload = HashMap::new();
            payload.insert("query".to_owned(), thought.content.clone());
            payload.insert(
                "memories".to_owned(),
                serde_json::to_value(&memories).unwrap_or(Value::Null),
            );
            self.network.send_signal(Signal::new(SignalType::Query, source, None, payload)).await;
        }

        serde_json::json!({
            "query": thought.content,
            "memory_results": memories.len(),
            "capabilities_found": capabilities.len(),
            "memories": memories.iter().take(QUERY_PREVIEW_LIMIT).map(|memory| memory.content.clone()).collect::<Vec<_>>(),
        })
    }

    async fn process_command(&self, thought: &Thought) -> Value {
        let command = thought.content.clone();
        let inputs = value_to_inputs(&command);

        let timeout = Duration::from_secs(weave_operators::DEFAULT_INVOKE_TIMEOUT_SECS);

        if let Some(_validate) = self.operators.get(&OperatorId::from_raw("validate")) {
            match self
                .operators
                .invoke(&OperatorId::from_raw("validate"), inputs.clone(), timeout, self.enforcement())
                .await
            {
                Ok(invocation) if !invocation.success => {
                    return serde_json::json!({"error": "command validation failed", "details": invocation.error});
                },
                Ok(invocation) => {
                    let valid = invocation
                        .outputs
                        .as_ref()
                        .and_then(|outputs| outputs.get("valid"))
                        .and_then(Value::as_bool)
                        .unwrap_or(true);
                    if !valid {
                        return serde_json::json!({"error": "command validation failed", "details": invocation.outputs});
                    }
                },
                Err(error) => return serde_json::json!({"error": error.to_string()}),
            }
        }

        if self.operators.get(&OperatorId::from_raw("execute")).is_some() {
            return match self.operators.invoke(&OperatorId::from_raw("execute"), inputs, timeout, self.enforcement()).await {
                Ok(invocation) => serde_json::to_value(&invocation).unwrap_or(Value::Null),
                Err(error) => serde_json::json!({"error": error.to_string()}),
            };
        }

        serde_json::json!({"status": "command_received", "command": command})
    }

    async fn process_observation(&self, thought: &Thought) -> Value {
        let tags: std::collections::HashSet<String> = ["observation".to_owned()].into_iter().collect();
        let memory = self
            .memory
            .store(thought.content.clone(), "observation", OBSERVATION_IMPORTANCE, tags, std::collections::HashSet::new())
            .await;

        let mut context = HashMap::new();
        context.insert("type".to_owned(), serde_json::json!("observation"));
        context.insert("content".to_owned(), thought.content.clone());
        let patterns = self.memory.match_patterns(&context).await;

        if let Ok(memory) = &memory {
            let command_slot = self.command_slot.read().await.clone();
            if let Some(source) = command_slot {
                let mut payload = HashMap::new();
                payload.insert("observation".to_owned(), thought.content.clone());
                self.network.send_signal(Signal::new(SignalType::Broadcast, source, None, payload)).await;
            }
            serde_json::json!({
                "observed": true,
                "memory_id": memory.memory_id.as_str(),
                "patterns_matched": patterns.len(),
            })
        } else {
            serde_json::json!({"observed": false, "error": "failed to store observation"})
        }
    }

    async fn process_reflection(&self) -> Value {
        let thoughts = self.thoughts.read().await;
        let mut recent: Vec<&Thought> = thoughts.values().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(RECENT_THOUGHT_WINDOW);

        let mut distribution: HashMap<String, usize> = HashMap::new();
        for thought in &recent {
            *distribution.entry(thought.thought_type.label().to_owned()).or_insert(0) = distribution.get(thought.thought_type.label()).copied().unwrap_or(0).saturating_add(1);
        }
        drop(thoughts);

        let total = self.total_thoughts.load(Ordering::Relaxed);
        let successful = self.successful_thoughts.load(Ordering::Relaxed);
        let success_rate = if total > 0 { successful as f64 / total as f64 } else { 1.0 };
        let memory_stats = self.memory.stats().await;

        serde_json::json!({
            "total_thoughts": total,
            "success_rate": success_rate,
            "thought_distribution": distribution,
            "memory_stats": memory_stats,
            "uptime_seconds": self.started_at.elapsed().as_secs_f64(),
        })
    }

    async fn process_planning(&self, thought: &Thought) -> Value {
        let active_goals = self.goals.read().await.values().filter(|goal| !goal.is_complete).count();
        let capabilities = self.discovery.search_capabilities(None, None, &[], true);
        let tags: std::collections::HashSet<String> = ["plan".to_owned(), "goal".to_owned()].into_iter().collect();
        let memories = self.memory.recall(None, None, Some(&tags), None, PLANNING_RECALL_LIMIT).await.unwrap_or_default();

        serde_json::json!({
            "planning_context": thought.content,
            "active_goals": active_goals,
            "available_capabilities": capabilities.len(),
            "relevant_memories": memories.len(),
        })
    }

    async fn process_learning(&self, thought: &Thought) -> Value {
        *self.state.write().await = BrainState::Learning;

        let trigger_conditions = thought
            .content
            .get("trigger")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .collect::<HashMap<_, _>>();
        let response_template = thought.content.get("response").and_then(Value::as_str).map(str::to_owned);

        let pattern = self.memory.recognize_pattern("learned", trigger_conditions, response_template).await;
        let tags: std::collections::HashSet<String> = ["learning".to_owned(), "pattern".to_owned()].into_iter().collect();
        let memory = self
            .memory
            .store(thought.content.clone(), "learning", LEARNING_IMPORTANCE, tags, std::collections::HashSet::new())
            .await;

        *self.state.write().await = BrainState::Ready;

        match (pattern, memory) {
            (Ok(pattern), Ok(memory)) => serde_json::json!({
                "learned": true,
                "pattern_id": pattern.pattern_id.as_str(),
                "memory_id": memory.memory_id.as_str(),
            }),
            _ => serde_json::json!({"learned": false, "error": "failed to register pattern or memory"}),
        }
    }

    async fn learn_from_thought(&self, thought: &Thought) {
        let Some(processed_at) = thought.processed_at else { return };
        let processing_time = (processed_at - thought.created_at).num_milliseconds() as f64 / 1000.0;
        let input_summary: String = thought.content.to_string().chars().take(INPUT_SUMMARY_CHARS).collect();

        let tags: std::collections::HashSet<String> = ["thought_pattern".to_owned(), thought.thought_type.label().to_owned()].into_iter().collect();
        let _ = self
            .memory
            .store(
                serde_json::json!({
                    "thought_type": thought.thought_type.label(),
                    "input_summary": input_summary,
                    "processing_time": processing_time,
                    "success": true,
                }),
                "thought_pattern",
                THOUGHT_PATTERN_IMPORTANCE,
                tags,
                std::collections::HashSet::new(),
            )
            .await;
    }

    /// Register a new goal and record it as a low-importance memory.
    pub async fn set_goal(&self, goal: Goal) {
        let tags: std::collections::HashSet<String> = ["goal".to_owned()].into_iter().collect();
        let _ = self
            .memory
            .store(
                serde_json::json!({"goal_id": goal.goal_id.as_str(), "description": goal.description}),
                "goal",
                goal.priority,
                tags,
                std::collections::HashSet::new(),
            )
            .await;
        tracing::info!(goal = %goal.description, "goal set");
        self.goals.write().await.insert(goal.goal_id.clone(), goal);
    }

    /// Mark a goal complete.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DispatcherError::GoalNotFound`] if no such
    /// goal is registered.
    pub async fn complete_goal(&self, goal_id: &GoalId) -> DispatcherResult<()> {
        let mut goals = self.goals.write().await;
        let goal = goals.get_mut(goal_id).ok_or_else(|| crate::error::DispatcherError::GoalNotFound(goal_id.as_str().to_owned()))?;
        goal.is_complete = true;
        goal.completed_at = Some(chrono::Utc::now());
        goal.progress = 1.0;
        tracing::info!(goal = %goal.description, "goal completed");
        Ok(())
    }

    /// Re-run memory decay, forget low-importance memories, and re-trigger
    /// discovery: the only operation that wires those three together.
    pub async fn adapt(&self) {
        *self.state.write().await = BrainState::Adapting;

        let tags: std::collections::HashSet<String> = ["thought_pattern".to_owned()].into_iter().collect();
        let _ = self.memory.recall(None, None, Some(&tags), None, ADAPT_PATTERN_RECALL_LIMIT).await;

        self.memory.apply_decay(1.0).await;
        let forgotten = self.memory.forget(None, Some(ADAPT_FORGET_THRESHOLD)).await;
        self.discovery.discover_all().await;

        tracing::info!(forgotten, "adaptation complete");
        *self.state.write().await = BrainState::Ready;
    }

    /// Stop the network loops.
    pub async fn suspend(&self) {
        *self.state.write().await = BrainState::Suspended;
        self.network.stop().await;
        tracing::info!("dispatcher suspended");
    }

    /// Restart the network loops.
    pub async fn resume(&self) {
        self.network.start().await;
        *self.state.write().await = BrainState::Ready;
        tracing::info!("dispatcher resumed");
    }

    /// The dispatcher's current operational state.
    pub async fn state(&self) -> BrainState {
        *self.state.read().await
    }

    /// Every thought processed so far.
    pub async fn thoughts(&self) -> Vec<Thought> {
        self.thoughts.read().await.values().cloned().collect()
    }

    /// Every goal registered so far.
    pub async fn goals(&self) -> Vec<Goal> {
        self.goals.read().await.values().cloned().collect()
    }

    /// Aggregate counters.
    pub async fn stats(&self) -> DispatcherStats {
        let total = self.total_thoughts.load(Ordering::Relaxed);
        let successful = self.successful_thoughts.load(Ordering::Relaxed);
        let goals = self.goals.read().await;
        DispatcherStats {
            state: *self.state.read().await,
            uptime_seconds: self.started_at.elapsed().as_secs_f64(),
            total_thoughts: total,
            successful_thoughts: successful,
            success_rate: if total > 0 { successful as f64 / total as f64 } else { 1.0 },
            active_goals: goals.values().filter(|goal| !goal.is_complete).count(),
            completed_goals: goals.values().filter(|goal| goal.is_complete).count(),
        }
    }
}

fn value_to_inputs(value: &Value) -> HashMap<String, Value> {
    match value {
        Value::Object(map) => map.clone().into_iter().collect(),
        other => HashMap::from([("command".to_owned(), other.clone())]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::PolicyId;
    use weave_kernel::seed_default_kernel_policy;
    use weave_policy::{seed_default_policies, DEFAULT_MASTER_POLICY_ID};

    async fn dispatcher() -> Dispatcher {
        let kernel_engine = PolicyEngine::new();
        seed_default_kernel_policy(&kernel_engine).await;
        let caller = PolicyEngine::new();
        seed_default_policies(&caller).await;
        let actor = ActorContext::new(PolicyId::from_raw(DEFAULT_MASTER_POLICY_ID));
        let caller = Arc::new(caller);

        let operators = Arc::new(OperatorRegistry::in_memory());
        let kernel = Arc::new(KernelEnforcer::new(kernel_engine));
        let network = Arc::new(EmergentNetwork::new(Arc::clone(&operators), Arc::clone(&kernel), Arc::clone(&caller), actor.clone()));
        let memory = Arc::new(MemoryStore::in_memory());
        let discovery = Arc::new(DiscoveryEngine::new(Arc::clone(&kernel), actor.clone(), Arc::clone(&caller)));

        Dispatcher::new(operators, network, memory, discovery, kernel, actor, caller)
    }

    #[tokio::test]
    async fn initialize_creates_core_slots_and_becomes_ready() {
        let dispatcher = dispatcher().await;
        dispatcher.initialize().await;
        assert_eq!(dispatcher.state().await, BrainState::Ready);
        assert!(dispatcher.query_slot.read().await.is_some());
    }

    #[tokio::test]
    async fn think_observation_stores_memory_and_reports_observed() {
        let dispatcher = dispatcher().await;
        dispatcher.initialize().await;

        let thought = Thought::new(ThoughtType::Observation, serde_json::json!({"event": "sensor_tripped"}));
        let result = dispatcher.think(thought).await;
        assert_eq!(result.get("observed").and_then(Value::as_bool), Some(true));
    }

    #[tokio::test]
    async fn think_command_with_no_operators_registered_reports_received() {
        let dispatcher = dispatcher().await;
        dispatcher.initialize().await;

        let thought = Thought::new(ThoughtType::Command, serde_json::json!({"action": "noop"}));
        let result = dispatcher.think(thought).await;
        assert_eq!(result.get("status").and_then(Value::as_str), Some("command_received"));
    }

    #[tokio::test]
    async fn set_goal_then_complete_goal_round_trips() {
        let dispatcher = dispatcher().await;
        let goal = Goal::new("ship the thing");
        let goal_id = goal.goal_id.clone();
        dispatcher.set_goal(goal).await;

        assert_eq!(dispatcher.goals().await.len(), 1);
        dispatcher.complete_goal(&goal_id).await.unwrap();
        assert!(dispatcher.goals().await[0].is_complete);
    }

    #[tokio::test]
    async fn complete_goal_errors_for_unknown_id() {
        let dispatcher = dispatcher().await;
        let result = dispatcher.complete_goal(&GoalId::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reflection_reports_total_and_success_rate() {
        let dispatcher = dispatcher().await;
        dispatcher.initialize().await;
        dispatcher.think(Thought::new(ThoughtType::Observation, serde_json::json!("x"))).await;

        let result = dispatcher.think(Thought::new(ThoughtType::Reflection, Value::Null)).await;
        assert_eq!(result.get("total_thoughts").and_then(Value::as_u64), Some(2));
    }
}
