//! Execution state threaded through the analysis graph
//!
//! One `ExecutionState` instance exists per run. Nodes never mutate the state
//! they receive; each node returns a [`StateUpdate`] (a partial state) and the
//! coordinator merges updates in a deterministic order. `BTreeMap` keeps key
//! iteration stable so merge results are reproducible across runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A role-tagged entry in the run's conversation log.
///
/// The log is append-only and diagnostic; nothing in the graph reads it back
/// for control flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Message role ("user", "assistant", "system")
    pub role: String,
    /// Message content
    pub content: String,
}

impl LogMessage {
    /// Create a user log entry
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create an assistant log entry
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    /// Create a system log entry
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// The shared state passed through the execution graph
///
/// - `messages` is an append-only conversation log.
/// - `data` is the scratchpad the agents read inputs from and write results
///   into (`query`, `stock_code`, `<kind>_analysis`, `final_report`, ...).
/// - `metadata` holds run diagnostics (executed flags, timestamps, durations)
///   and is never consumed by control flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    /// Ordered conversation log
    #[serde(default)]
    pub messages: Vec<LogMessage>,

    /// Shared scratchpad keyed by string
    #[serde(default)]
    pub data: BTreeMap<String, Value>,

    /// Run diagnostics keyed by string
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl ExecutionState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state seeded with the user query
    pub fn with_query(query: impl Into<String>) -> Self {
        let mut state = Self::default();
        state
            .data
            .insert("query".to_string(), Value::String(query.into()));
        state
    }

    /// Builder-style insert into `data`
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Fetch a `data` value as a string slice
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Check whether a `data` key is present
    pub fn has_data(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Apply a partial update: append its log entries, then merge `data` and
    /// `metadata` with last-writer-wins on overlapping keys.
    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        self.data.extend(update.data);
        self.metadata.extend(update.metadata);
    }

    /// Apply a sequence of updates in order (first to last)
    pub fn apply_all<I: IntoIterator<Item = StateUpdate>>(&mut self, updates: I) {
        for update in updates {
            self.apply(update);
        }
    }
}

/// A partial state produced by one node
///
/// Nodes by contract write disjoint `data` key sets, so merge order is not
/// observable on the golden path; the coordinator still applies updates in
/// node declaration order so a contract violation resolves deterministically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    /// Log entries to append
    #[serde(default)]
    pub messages: Vec<LogMessage>,

    /// `data` keys to merge
    #[serde(default)]
    pub data: BTreeMap<String, Value>,

    /// `metadata` keys to merge
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl StateUpdate {
    /// Create an empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an update carrying a single `<node>_error` data key.
    ///
    /// This is the shape the coordinator synthesizes when a node panics or
    /// times out, and the shape nodes use for their own captured failures.
    pub fn node_error(node_name: &str, message: impl Into<String>) -> Self {
        Self::new().with_data(format!("{node_name}_error"), message.into())
    }

    /// Builder-style insert into `data`
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Builder-style insert into `metadata`
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Builder-style log append
    pub fn with_message(mut self, message: LogMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// True when the update carries nothing
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.data.is_empty() && self.metadata.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_query() {
        let state = ExecutionState::with_query("分析嘉友国际");
        assert_eq!(state.data_str("query"), Some("分析嘉友国际"));
        assert!(state.messages.is_empty());
        assert!(state.metadata.is_empty());
    }

    #[test]
    fn test_apply_merges_and_appends() {
        let mut state = ExecutionState::with_query("q");
        let update = StateUpdate::new()
            .with_data("fundamental_analysis", "text")
            .with_metadata("fundamental_agent_executed", true)
            .with_message(LogMessage::assistant("done"));

        state.apply(update);

        assert_eq!(state.data_str("fundamental_analysis"), Some("text"));
        assert_eq!(
            state.metadata.get("fundamental_agent_executed"),
            Some(&json!(true))
        );
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].role, "assistant");
    }

    #[test]
    fn test_apply_last_writer_wins() {
        let mut state = ExecutionState::new();
        state.apply(StateUpdate::new().with_data("key", "first"));
        state.apply(StateUpdate::new().with_data("key", "second"));
        assert_eq!(state.data_str("key"), Some("second"));
    }

    #[test]
    fn test_apply_all_order() {
        let mut state = ExecutionState::new();
        state.apply_all(vec![
            StateUpdate::new().with_data("key", "a"),
            StateUpdate::new().with_data("key", "b"),
        ]);
        assert_eq!(state.data_str("key"), Some("b"));
    }

    #[test]
    fn test_node_error_shape() {
        let update = StateUpdate::node_error("technical_analyst", "timeout");
        assert_eq!(update.data.len(), 1);
        assert_eq!(
            update.data.get("technical_analyst_error"),
            Some(&json!("timeout"))
        );
        assert!(update.messages.is_empty());
    }

    #[test]
    fn test_serde_round_trip() {
        let state = ExecutionState::with_query("q").with_data("stock_code", "sh.603871");
        let json = serde_json::to_string(&state).expect("serialize");
        let back: ExecutionState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, state);
    }
}
