//! Execution graph coordinator for finagent-rs
//!
//! A fixed, statically-declared DAG of named [`finagent_core::Node`]s with
//! fan-out and join semantics:
//!
//! - nodes with satisfied predecessors start concurrently, with no ordering
//!   guarantee between them;
//! - a join node starts only after every declared predecessor has completed
//!   (completed, not necessarily succeeded);
//! - node failures (including panics and timeouts) are captured into the
//!   state as `<name>_error` keys and never abort sibling branches;
//! - only [`GraphError`] (misconfiguration or scheduler failure) propagates
//!   to the caller.
//!
//! # Example
//!
//! ```
//! use finagent_core::{ExecutionState, FnNode, StateUpdate};
//! use finagent_graph::GraphBuilder;
//!
//! # async fn example() -> Result<(), finagent_graph::GraphError> {
//! let graph = GraphBuilder::new()
//!     .add_node(FnNode::new("start", |_| async { StateUpdate::new() }))?
//!     .add_node(FnNode::new("work", |_| async {
//!         StateUpdate::new().with_data("result", "done")
//!     }))?
//!     .add_edge("start", "work")?
//!     .set_entry_point("start")
//!     .compile()?;
//!
//! let terminal = graph.run(ExecutionState::with_query("hello")).await?;
//! assert_eq!(terminal.data_str("result"), Some("done"));
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod error;
pub mod graph;

pub use builder::GraphBuilder;
pub use error::GraphError;
pub use graph::{CompiledGraph, RunOptions};
