//! Thoughts, goals, and the dispatcher's operational state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weave_core::{GoalId, ThoughtId};

/// What kind of processing a [`Thought`] requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtType {
    /// An information request.
    Query,
    /// An action request.
    Command,
    /// Input observed from the environment.
    Observation,
    /// Internal analysis of recent activity.
    Reflection,
    /// Planning toward a goal.
    Planning,
    /// Pattern recognition / learning.
    Learning,
}

impl ThoughtType {
    /// The `snake_case` label used for tags and signal payloads.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Command => "command",
            Self::Observation => "observation",
            Self::Reflection => "reflection",
            Self::Planning => "planning",
            Self::Learning => "learning",
        }
    }
}

/// A single unit of processing routed through [`crate::dispatcher::Dispatcher::think`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thought {
    /// Unique identifier.
    pub thought_id: ThoughtId,
    /// Which routing path this thought takes.
    pub thought_type: ThoughtType,
    /// The thought's payload.
    pub content: Value,
    /// When the thought was created.
    pub created_at: DateTime<Utc>,
    /// When processing finished, if it has.
    pub processed_at: Option<DateTime<Utc>>,
    /// The routing result, once processed.
    pub result: Option<Value>,
    /// Arbitrary caller-supplied context.
    pub context: HashMap<String, Value>,
    /// Where this thought originated (`"external"` by default).
    pub source: String,
    /// The thought that spawned this one, if any.
    pub parent_thought: Option<ThoughtId>,
    /// Thoughts spawned from this one.
    pub child_thoughts: Vec<ThoughtId>,
}

impl Thought {
    /// Build a new, unprocessed thought.
    #[must_use]
    pub fn new(thought_type: ThoughtType, content: Value) -> Self {
        Self {
            thought_id: ThoughtId::new(),
            thought_type,
            content,
            created_at: Utc::now(),
            processed_at: None,
            result: None,
            context: HashMap::new(),
            source: "external".to_owned(),
            parent_thought: None,
            child_thoughts: Vec::new(),
        }
    }
}

/// A goal the dispatcher is tracking progress toward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    /// Unique identifier.
    pub goal_id: GoalId,
    /// A human-readable description.
    pub description: String,
    /// Relative priority, in `[0, 1]`.
    pub priority: f64,
    /// Fraction complete, in `[0, 1]`.
    pub progress: f64,
    /// Whether this goal has been completed.
    pub is_complete: bool,
    /// Ids of sub-goals.
    pub sub_goals: Vec<GoalId>,
    /// When this goal was created.
    pub created_at: DateTime<Utc>,
    /// When this goal was completed, if it has been.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Goal {
    /// Build a new, incomplete goal with default priority `0.5`.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            goal_id: GoalId::new(),
            description: description.into(),
            priority: 0.5,
            progress: 0.0,
            is_complete: false,
            sub_goals: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// The dispatcher's coarse operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrainState {
    /// Subsystems are being wired up; not yet accepting thoughts.
    Initializing,
    /// Actively processing a `learning` thought.
    Learning,
    /// Idle, accepting thoughts.
    Ready,
    /// Actively processing a thought.
    Processing,
    /// Running [`crate::dispatcher::Dispatcher::adapt`].
    Adapting,
    /// Network loops stopped; not accepting thoughts.
    Suspended,
    /// The last operation failed unrecoverably.
    Error,
}
