//! Error types for the graph coordinator
//!
//! `GraphError` is the fatal class: the only errors in the workspace that
//! abort a run and reach the caller. Everything a node does wrong is captured
//! into the execution state instead.

use thiserror::Error;

/// Result type alias for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Graph misconfiguration or scheduling-infrastructure failure
#[derive(Error, Debug)]
pub enum GraphError {
    /// A node name was registered twice
    #[error("node already registered: {0}")]
    DuplicateNode(String),

    /// An edge references a name that was never registered
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// Adding the edge would make the graph cyclic
    #[error("edge {from} -> {to} would create a cycle")]
    CycleDetected {
        /// Edge source
        from: String,
        /// Edge target
        to: String,
    },

    /// `compile` called without `set_entry_point`
    #[error("entry point not set")]
    MissingEntryPoint,

    /// The declared entry point has incoming edges
    #[error("entry point {0} has incoming edges")]
    EntryHasPredecessors(String),

    /// A node cannot be reached from the entry point
    #[error("node not reachable from entry point: {0}")]
    Unreachable(String),

    /// No node without successors exists
    #[error("graph has no terminal node")]
    NoTerminal,

    /// More than one node without successors exists
    #[error("graph has multiple terminal nodes: {0:?}")]
    MultipleTerminals(Vec<String>),

    /// A node has no path to the terminal node
    #[error("node has no path to the terminal node: {0}")]
    DeadEnd(String),

    /// The scheduling machinery itself failed (task cancelled, join set
    /// drained early). Never produced by a node's own failure.
    #[error("scheduler failure: {0}")]
    Scheduler(String),
}
