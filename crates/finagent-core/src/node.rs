//! The `Node` trait: one named unit of work in the execution graph

use crate::{ExecutionState, StateUpdate};
use async_trait::async_trait;

/// A unit of work in the execution graph
///
/// A node consumes a snapshot of the execution state and produces a partial
/// update. The contract is that `run` never fails at the type level: any
/// failure a node can anticipate is encoded into the returned update as a
/// `<name>_error` data key, so one failed branch never aborts its siblings.
/// (Panics are still caught by the coordinator and converted to the same
/// error shape.)
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute the node against a state snapshot
    async fn run(&self, state: ExecutionState) -> StateUpdate;

    /// The node's registered name
    fn name(&self) -> &str;
}

/// Adapter turning an async closure into a [`Node`]
///
/// Used for pass-through nodes (the graph entry point) and for test doubles.
///
/// # Example
///
/// ```
/// use finagent_core::{FnNode, StateUpdate};
///
/// let start = FnNode::new("start", |_state| async { StateUpdate::new() });
/// ```
pub struct FnNode<F> {
    name: String,
    handler: F,
}

impl<F, Fut> FnNode<F>
where
    F: Fn(ExecutionState) -> Fut + Send + Sync,
    Fut: Future<Output = StateUpdate> + Send + 'static,
{
    /// Wrap an async closure as a node
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

#[async_trait]
impl<F, Fut> Node for FnNode<F>
where
    F: Fn(ExecutionState) -> Fut + Send + Sync,
    Fut: Future<Output = StateUpdate> + Send + 'static,
{
    async fn run(&self, state: ExecutionState) -> StateUpdate {
        (self.handler)(state).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
