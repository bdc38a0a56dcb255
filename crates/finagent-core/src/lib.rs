//! Core abstractions for finagent-rs
//!
//! This crate defines the fundamental types shared across the finagent-rs
//! workspace: the execution state threaded through the analysis graph, the
//! `Node` trait implemented by every unit of work, and the node-local error
//! taxonomy.

pub mod error;
pub mod logging;
pub mod node;
pub mod state;

pub use error::{NodeError, NodeResult};
pub use logging::init_tracing;
pub use node::{FnNode, Node};
pub use state::{ExecutionState, LogMessage, StateUpdate};
