//! The memory and pattern record types.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weave_core::MemoryId;

const ACCESS_IMPORTANCE_BOOST: f64 = 0.05;

/// A single stored memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Content-addressed identifier: `sha256(canonical_json(content))`.
    pub memory_id: MemoryId,
    /// The memory's payload.
    pub content: Value,
    /// A free-form category (`"general"`, `"observation"`, `"compressed"`, …).
    pub memory_type: String,
    /// When this memory was first stored.
    pub created_at: DateTime<Utc>,
    /// When this memory was last accessed (via [`Memory::access`] or
    /// creation).
    pub accessed_at: DateTime<Utc>,
    /// Number of times this memory has been recalled.
    pub access_count: u64,
    /// Current importance, in `[0, 1]`.
    pub importance: f64,
    /// Per-tick decay rate subtracted from importance by [`Memory::decay`].
    pub decay_rate: f64,
    /// Ids of memories this one is linked to.
    pub links: HashSet<MemoryId>,
    /// Free-form tags used for recall.
    pub tags: HashSet<String>,
    /// An optional embedding vector for semantic recall.
    pub embedding: Option<Vec<f32>>,
}

impl Memory {
    /// Build a freshly-stored memory with no access history yet.
    #[must_use]
    pub fn new(memory_id: MemoryId, content: Value, memory_type: impl Into<String>, importance: f64, tags: HashSet<String>, links: HashSet<MemoryId>) -> Self {
        let now = Utc::now();
        Self {
            memory_id,
            content,
            memory_type: memory_type.into(),
            created_at: now,
            accessed_at: now,
            access_count: 0,
            importance,
            decay_rate: 0.01,
            links,
            tags,
            embedding: None,
        }
    }

    /// Record a recall: bumps `accessed_at`/`access_count` and nudges
    /// importance up by a small recency boost, capped at `1.0`.
    pub fn access(&mut self) {
        self.accessed_at = Utc::now();
        self.access_count = self.access_count.saturating_add(1);
        self.importance = (self.importance + ACCESS_IMPORTANCE_BOOST).min(1.0);
    }

    /// Apply time-based decay: subtracts `decay_rate * time_delta` from
    /// importance, floored at `0.0`.
    pub fn decay(&mut self, time_delta: f64) {
        self.importance = (self.importance - self.decay_rate * time_delta).max(0.0);
    }
}

/// A recognized trigger/response pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    /// Content-addressed identifier derived from `trigger_conditions`.
    pub pattern_id: weave_core::PatternId,
    /// A free-form category for this pattern.
    pub pattern_type: String,
    /// Conditions a context must satisfy to match. A value shaped as
    /// `{"$regex": "..."}` is matched as a regex against the context
    /// value's string form; anything else requires exact equality.
    pub trigger_conditions: std::collections::HashMap<String, Value>,
    /// An optional template describing how to respond when this pattern
    /// matches.
    pub response_template: Option<String>,
    /// Number of times this pattern has fired or been re-registered.
    pub occurrences: u64,
    /// Last time this pattern matched a context.
    pub last_triggered: Option<DateTime<Utc>>,
    /// Observed success rate of acting on this pattern (not computed here;
    /// maintained by the caller).
    pub success_rate: f64,
    /// Memories associated with this pattern.
    pub memory_ids: HashSet<MemoryId>,
}

impl Pattern {
    /// Build a freshly-registered pattern.
    #[must_use]
    pub fn new(pattern_id: weave_core::PatternId, pattern_type: impl Into<String>, trigger_conditions: std::collections::HashMap<String, Value>, response_template: Option<String>) -> Self {
        Self {
            pattern_id,
            pattern_type: pattern_type.into(),
            trigger_conditions,
            response_template,
            occurrences: 0,
            last_triggered: None,
            success_rate: 0.5,
            memory_ids: HashSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_boosts_importance_and_caps_at_one() {
        let mut memory = Memory::new(MemoryId::from_raw("mem_1"), Value::Null, "general", 0.98, HashSet::new(), HashSet::new());
        memory.access();
        assert!((memory.importance - 1.0).abs() < f64::EPSILON);
        assert_eq!(memory.access_count, 1);
    }

    #[test]
    fn decay_floors_at_zero() {
        let mut memory = Memory::new(MemoryId::from_raw("mem_1"), Value::Null, "general", 0.01, HashSet::new(), HashSet::new());
        memory.decay_rate = 0.05;
        memory.decay(1.0);
        assert!(memory.importance.abs() < f64::EPSILON);
    }
}
