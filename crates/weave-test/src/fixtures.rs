//! Fixtures for common value types.

use weave_core::{OperatorId, PolicyId, Timestamp};

/// The current time, for tests that need a concrete `Timestamp`.
#[must_use]
pub fn now() -> Timestamp {
    chrono::Utc::now()
}

/// A timestamp `secs` seconds in the past relative to now.
#[must_use]
pub fn seconds_ago(secs: i64) -> Timestamp {
    now() - chrono::Duration::seconds(secs)
}

/// A timestamp `secs` seconds in the future relative to now.
#[must_use]
pub fn seconds_from_now(secs: i64) -> Timestamp {
    now() + chrono::Duration::seconds(secs)
}

/// A fresh random test policy id.
#[must_use]
pub fn test_policy_id() -> PolicyId {
    PolicyId::new()
}

/// A fresh random test operator id.
#[must_use]
pub fn test_operator_id() -> OperatorId {
    OperatorId::new()
}

/// A small JSON object useful as an operator/signal payload in tests.
#[must_use]
pub fn test_payload() -> serde_json::Value {
    serde_json::json!({"x": 42, "label": "test"})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_ago_is_in_the_past() {
        assert!(seconds_ago(10) < now());
    }

    #[test]
    fn seconds_from_now_is_in_the_future() {
        assert!(seconds_from_now(10) > now());
    }

    #[test]
    fn fixture_ids_are_distinct() {
        assert_ne!(test_policy_id(), test_policy_id());
    }
}
