//! Node-local error taxonomy
//!
//! Every variant here is swallowed at the node boundary: agents convert a
//! `NodeError` into a `<name>_analysis_error` data key and the run continues.
//! The only error class that aborts a run is `finagent_graph::GraphError`,
//! which lives with the coordinator.

use thiserror::Error;

/// Result alias for node-internal fallible steps
pub type NodeResult<T> = std::result::Result<T, NodeError>;

/// Failure classes a node can encounter while doing its work
#[derive(Error, Debug)]
pub enum NodeError {
    /// Required user input absent (e.g. no query in state)
    #[error("missing input: {0}")]
    Input(String),

    /// Required credentials or configuration absent
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An external resource produced nothing usable (e.g. zero tools)
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Any other fault raised while invoking an external collaborator
    #[error("execution fault: {0}")]
    Execution(String),
}

impl NodeError {
    /// Wrap an arbitrary error as an execution fault, preserving its message
    pub fn execution(err: impl std::fmt::Display) -> Self {
        Self::Execution(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            NodeError::Input("user query is missing".to_string()).to_string(),
            "missing input: user query is missing"
        );
        assert_eq!(
            NodeError::ResourceUnavailable("no tools available".to_string()).to_string(),
            "resource unavailable: no tools available"
        );
    }

    #[test]
    fn test_execution_wraps_display() {
        let io = std::io::Error::other("broken pipe");
        let err = NodeError::execution(io);
        assert!(err.to_string().contains("broken pipe"));
    }
}
