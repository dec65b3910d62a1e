//! Slots, bindings and signals: the vocabulary of the reactive network.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weave_core::{BindingId, OperatorId, SignalId, SlotId};

/// The lifecycle state of a [`ReactiveSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// No activity, no queued work; eligible to be garbage collected.
    Idle,
    /// Actively waiting for signals.
    Listening,
    /// Evaluating bindings against a dequeued signal.
    Processing,
    /// Invoking an operator on behalf of a binding.
    Executing,
    /// Waiting on an external event (reserved for future binding actions).
    Waiting,
    /// The last operation raised an error; will self-heal after a timeout.
    Error,
    /// Permanently stopped; never scheduled again.
    Stopped,
}

/// The kind of [`Signal`] being carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// A request for information.
    Query,
    /// A reply to a prior query.
    Response,
    /// A fan-out notification with no single target.
    Broadcast,
    /// A liveness probe.
    Heartbeat,
    /// Notification that a new capability was discovered.
    Discovery,
    /// Notification that an operator was invoked.
    OperatorInvoke,
    /// An error report.
    Error,
}

/// A message passed between slots, with a hop budget that bounds how far a
/// broadcast can travel through the connection graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Unique identifier for this signal.
    pub signal_id: SignalId,
    /// The kind of signal.
    pub signal_type: SignalType,
    /// The slot that produced this signal.
    pub source_slot: SlotId,
    /// The slot this signal is addressed to, or `None` to broadcast to
    /// `source_slot`'s neighbors.
    pub target_slot: Option<SlotId>,
    /// Arbitrary payload data.
    pub payload: HashMap<String, Value>,
    /// When this signal was created.
    pub timestamp: DateTime<Utc>,
    /// Remaining hop budget. Decremented on every broadcast hop; a hop that
    /// would bring this to zero or below is dropped instead of delivered.
    pub ttl: i32,
    /// Slots this signal has already passed through.
    pub path: Vec<SlotId>,
}

impl Signal {
    /// Build a new signal with the default hop budget of 5.
    #[must_use]
    pub fn new(signal_type: SignalType, source_slot: SlotId, target_slot: Option<SlotId>, payload: HashMap<String, Value>) -> Self {
        Self {
            signal_id: SignalId::new(),
            signal_type,
            source_slot,
            target_slot,
            payload,
            timestamp: Utc::now(),
            ttl: 5,
            path: Vec::new(),
        }
    }

    /// Builder method to override the default TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: i32) -> Self {
        self.ttl = ttl;
        self
    }
}

/// A reactive binding: when `trigger_pattern` matches an incoming signal and
/// rate limits allow it, `action` runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactiveBinding {
    /// Unique identifier.
    pub binding_id: BindingId,
    /// What a signal must look like to trigger this binding.
    pub trigger_pattern: TriggerPattern,
    /// What to do when the pattern matches.
    pub action: BindingAction,
    /// Minimum milliseconds between invocations; `0` disables throttling.
    pub throttle_ms: i64,
    /// Maximum number of times this binding may fire; negative means
    /// unbounded.
    pub max_invocations: i64,
    /// How many times this binding has fired so far.
    pub invocation_count: i64,
    /// Wall-clock time (ms since epoch) of the last invocation.
    pub last_invocation_ms: Option<i64>,
}

/// What an incoming [`Signal`] must match for a [`ReactiveBinding`] to fire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerPattern {
    /// If set, the signal's type must be one of these.
    pub signal_types: Vec<SignalType>,
    /// If set, every key must be present in the signal's payload with an
    /// equal value.
    pub payload_contains: HashMap<String, Value>,
}

/// The action a [`ReactiveBinding`] performs once triggered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BindingAction {
    /// Invoke an operator, merging the signal payload with `extra_inputs`.
    InvokeOperator {
        /// The operator to call.
        operator_id: OperatorId,
        /// Additional inputs merged on top of the signal payload.
        extra_inputs: HashMap<String, Value>,
    },
    /// Forward a derived signal to another slot.
    Forward {
        /// The slot to forward to.
        target_slot: SlotId,
    },
    /// Apply a named payload transform (resolved by the caller; the network
    /// itself carries no transform registry).
    Transform {
        /// Name of the transform to apply.
        transform: String,
    },
}

impl ReactiveBinding {
    /// Build a new binding with zero invocations so far.
    #[must_use]
    pub fn new(trigger_pattern: TriggerPattern, action: BindingAction, throttle_ms: i64, max_invocations: i64) -> Self {
        Self {
            binding_id: BindingId::new(),
            trigger_pattern,
            action,
            throttle_ms,
            max_invocations,
            invocation_count: 0,
            last_invocation_ms: None,
        }
    }

    /// Does `signal` satisfy this binding's trigger pattern?
    #[must_use]
    pub fn matches(&self, signal: &Signal) -> bool {
        if !self.trigger_pattern.signal_types.is_empty() && !self.trigger_pattern.signal_types.contains(&signal.signal_type) {
            return false;
        }
        self.trigger_pattern
            .payload_contains
            .iter()
            .all(|(key, value)| signal.payload.get(key) == Some(value))
    }

    /// Would invoking now respect `max_invocations` and `throttle_ms`?
    #[must_use]
    pub fn can_invoke(&self, now_ms: i64) -> bool {
        if self.max_invocations >= 0 && self.invocation_count >= self.max_invocations {
            return false;
        }
        if let Some(last) = self.last_invocation_ms {
            if self.throttle_ms > 0 && now_ms.saturating_sub(last) < self.throttle_ms {
                return false;
            }
        }
        true
    }
}

/// A reactive slot: the fundamental micro-agent of the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactiveSlot {
    /// Unique identifier.
    pub slot_id: SlotId,
    /// A free-form classification (e.g. `"generic"`, `"sensor"`, `"actor"`).
    pub slot_type: String,
    /// Current lifecycle state.
    pub state: SlotState,
    /// Arbitrary slot-local data.
    pub data: HashMap<String, Value>,
    /// Operators this slot is permitted to invoke.
    pub operator_ids: Vec<OperatorId>,
    /// Ids of slots this slot is connected to. Connections are always
    /// symmetric: `a.connections.contains(b) == b.connections.contains(a)`.
    pub connections: HashSet<SlotId>,
    /// Pending signals, processed in FIFO order.
    pub signal_queue: Vec<Signal>,
    /// Bindings evaluated, in declaration order, against every dequeued
    /// signal.
    pub bindings: Vec<ReactiveBinding>,
    /// When this slot was created.
    pub created_at: DateTime<Utc>,
    /// Last time this slot dequeued a signal or invoked an operator.
    pub last_activity: DateTime<Utc>,
    /// Total signals processed.
    pub signal_count: u64,
    /// Total errors encountered.
    pub error_count: u64,
}

impl ReactiveSlot {
    /// Build a new slot in the `Listening` state.
    #[must_use]
    pub fn new(slot_type: impl Into<String>, operator_ids: Vec<OperatorId>, data: HashMap<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            slot_id: SlotId::new(),
            slot_type: slot_type.into(),
            state: SlotState::Listening,
            data,
            operator_ids,
            connections: HashSet::new(),
            signal_queue: Vec::new(),
            bindings: Vec::new(),
            created_at: now,
            last_activity: now,
            signal_count: 0,
            error_count: 0,
        }
    }

    /// Is this slot eligible to dequeue and process a signal right now?
    #[must_use]
    pub fn is_schedulable(&self) -> bool {
        matches!(self.state, SlotState::Listening | SlotState::Idle) && !self.signal_queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(signal_type: SignalType) -> Signal {
        Signal::new(signal_type, SlotId::new(), None, HashMap::new())
    }

    #[test]
    fn binding_matches_by_signal_type() {
        let binding = ReactiveBinding::new(
            TriggerPattern {
                signal_types: vec![SignalType::Heartbeat],
                payload_contains: HashMap::new(),
            },
            BindingAction::Forward { target_slot: SlotId::new() },
            0,
            -1,
        );
        assert!(binding.matches(&signal(SignalType::Heartbeat)));
        assert!(!binding.matches(&signal(SignalType::Query)));
    }

    #[test]
    fn binding_matches_by_payload_content() {
        let mut pattern_payload = HashMap::new();
        pattern_payload.insert("kind".to_owned(), Value::String("alert".to_owned()));
        let binding = ReactiveBinding::new(
            TriggerPattern { signal_types: Vec::new(), payload_contains: pattern_payload },
            BindingAction::Forward { target_slot: SlotId::new() },
            0,
            -1,
        );

        let mut matching = signal(SignalType::Query);
        matching.payload.insert("kind".to_owned(), Value::String("alert".to_owned()));
        assert!(binding.matches(&matching));

        let non_matching = signal(SignalType::Query);
        assert!(!binding.matches(&non_matching));
    }

    #[test]
    fn can_invoke_respects_max_invocations() {
        let mut binding = ReactiveBinding::new(TriggerPattern::default(), BindingAction::Forward { target_slot: SlotId::new() }, 0, 1);
        assert!(binding.can_invoke(0));
        binding.invocation_count = 1;
        assert!(!binding.can_invoke(0));
    }

    #[test]
    fn can_invoke_respects_throttle() {
        let mut binding = ReactiveBinding::new(TriggerPattern::default(), BindingAction::Forward { target_slot: SlotId::new() }, 100, -1);
        binding.last_invocation_ms = Some(1_000);
        assert!(!binding.can_invoke(1_050));
        assert!(binding.can_invoke(1_150));
    }

    #[test]
    fn slot_is_schedulable_only_when_listening_or_idle_with_work() {
        let mut slot = ReactiveSlot::new("generic", Vec::new(), HashMap::new());
        assert!(!slot.is_schedulable());
        slot.signal_queue.push(signal(SignalType::Heartbeat));
        assert!(slot.is_schedulable());
        slot.state = SlotState::Processing;
        assert!(!slot.is_schedulable());
    }
}
