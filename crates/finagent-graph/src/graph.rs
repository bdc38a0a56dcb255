//! Compiled graph execution
//!
//! Scheduling model: every node whose predecessors have all completed is
//! spawned immediately onto the runtime, so independent branches overlap
//! their suspension windows. "Completed" includes captured errors, panics,
//! and timeouts; the join node always runs.

use crate::builder::NodeEntry;
use crate::error::{GraphError, Result};
use finagent_core::{ExecutionState, StateUpdate};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Timeout policy for a run
///
/// Node handlers own the timeout policy of their own external calls; these
/// hooks are the coordinator's backstop so one wedged branch cannot stall the
/// whole run. A timed-out node contributes `{"<name>_error": "timeout"}` and
/// the graph proceeds to its join as if the node had completed with an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Per-node deadline, applied to every handler invocation
    pub node_timeout: Option<Duration>,

    /// Whole-run deadline; nodes not yet started when it passes complete
    /// immediately with the timeout error, without invoking their handler
    pub run_timeout: Option<Duration>,
}

impl RunOptions {
    /// No timeouts (the default)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-node timeout
    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = Some(timeout);
        self
    }

    /// Set the per-run timeout
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }
}

/// An executable, validated graph
///
/// Produced by [`crate::GraphBuilder::compile`]. Immutable; `run` may be
/// called any number of times, each call threading its own state.
pub struct CompiledGraph {
    entries: Vec<NodeEntry>,
    entry: usize,
    terminal: usize,
    /// Per-node ancestor sets, sorted by declaration index
    ancestors: Vec<Vec<usize>>,
}

impl CompiledGraph {
    pub(crate) fn new(
        entries: Vec<NodeEntry>,
        entry: usize,
        terminal: usize,
        ancestors: Vec<Vec<usize>>,
    ) -> Self {
        Self {
            entries,
            entry,
            terminal,
            ancestors,
        }
    }

    /// Name of the terminal sink node
    pub fn terminal_name(&self) -> &str {
        &self.entries[self.terminal].name
    }

    /// Execute the graph to completion with default options
    pub async fn run(&self, initial_state: ExecutionState) -> Result<ExecutionState> {
        self.run_with(initial_state, RunOptions::default()).await
    }

    /// Execute the graph to completion
    ///
    /// Returns the terminal state: the initial state plus every node's update
    /// applied in node declaration order. Node-level failures are captured in
    /// the state; only scheduler failures surface as `Err`.
    pub async fn run_with(
        &self,
        initial_state: ExecutionState,
        options: RunOptions,
    ) -> Result<ExecutionState> {
        let node_count = self.entries.len();
        let deadline = options.run_timeout.map(|t| Instant::now() + t);

        let mut updates: Vec<Option<StateUpdate>> = (0..node_count).map(|_| None).collect();
        let mut pending_predecessors: Vec<usize> = self
            .entries
            .iter()
            .map(|e| e.predecessors.len())
            .collect();

        let mut tasks: JoinSet<(usize, StateUpdate)> = JoinSet::new();
        self.spawn_node(self.entry, &initial_state, &updates, options, deadline, &mut tasks);

        let mut completed = 0;
        while completed < node_count {
            let joined = tasks.join_next().await.ok_or_else(|| {
                GraphError::Scheduler("task set drained before all nodes completed".to_string())
            })?;
            let (idx, update) = joined
                .map_err(|e| GraphError::Scheduler(format!("node task failed to join: {e}")))?;

            debug!(node = %self.entries[idx].name, "node completed");
            updates[idx] = Some(update);
            completed += 1;

            // Successors with all predecessors complete become eligible now;
            // simultaneously eligible nodes start concurrently.
            for &succ in &self.entries[idx].successors {
                pending_predecessors[succ] -= 1;
                if pending_predecessors[succ] == 0 {
                    self.spawn_node(succ, &initial_state, &updates, options, deadline, &mut tasks);
                }
            }
        }

        let mut terminal_state = initial_state;
        terminal_state.apply_all(updates.into_iter().flatten());
        Ok(terminal_state)
    }

    /// Assemble a node's input state and spawn its task
    ///
    /// Input = initial state plus the updates of every ancestor, applied in
    /// declaration order. Ancestor updates are all present by the time the
    /// node becomes eligible.
    fn spawn_node(
        &self,
        idx: usize,
        initial_state: &ExecutionState,
        updates: &[Option<StateUpdate>],
        options: RunOptions,
        deadline: Option<Instant>,
        tasks: &mut JoinSet<(usize, StateUpdate)>,
    ) {
        let mut input = initial_state.clone();
        input.apply_all(
            self.ancestors[idx]
                .iter()
                .filter_map(|&a| updates[a].clone()),
        );

        let node = self.entries[idx].node.clone();
        let name = self.entries[idx].name.clone();

        // Remaining budget: the tighter of the per-node timeout and what is
        // left of the run deadline.
        let budget = match (options.node_timeout, deadline) {
            (None, None) => None,
            (node_t, dl) => {
                let until_deadline = dl.map(|d| d.saturating_duration_since(Instant::now()));
                Some(match (node_t, until_deadline) {
                    (Some(n), Some(d)) => n.min(d),
                    (Some(n), None) => n,
                    (None, Some(d)) => d,
                    (None, None) => unreachable!(),
                })
            }
        };

        tasks.spawn(async move {
            if budget == Some(Duration::ZERO) {
                warn!(node = %name, "run deadline passed before node started");
                return (idx, StateUpdate::node_error(&name, "timeout"));
            }

            // A panicking handler is treated as if it had returned a single
            // `<name>_error` update; sibling branches keep running.
            let guarded = AssertUnwindSafe(node.run(input)).catch_unwind();
            let outcome = match budget {
                Some(limit) => match tokio::time::timeout(limit, guarded).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(node = %name, "node timed out after {:?}", limit);
                        return (idx, StateUpdate::node_error(&name, "timeout"));
                    }
                },
                None => guarded.await,
            };

            let update = outcome.unwrap_or_else(|panic| {
                let text = panic_message(panic.as_ref());
                warn!(node = %name, "node panicked: {}", text);
                StateUpdate::node_error(&name, text)
            });
            (idx, update)
        });
    }
}

/// Best-effort extraction of a panic payload's message
fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "node panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GraphBuilder;
    use finagent_core::{FnNode, LogMessage, Node};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn writer(name: &'static str, key: &'static str, value: &'static str) -> impl Node + 'static {
        FnNode::new(name, move |_| async move {
            StateUpdate::new()
                .with_data(key, value)
                .with_message(LogMessage::assistant(format!("{key} written")))
        })
    }

    fn passthrough(name: &'static str) -> impl Node + 'static {
        FnNode::new(name, |_| async { StateUpdate::new() })
    }

    fn fan_out_fan_in() -> CompiledGraph {
        GraphBuilder::new()
            .add_node(passthrough("start"))
            .and_then(|b| b.add_node(writer("fundamental", "fundamental_analysis", "f")))
            .and_then(|b| b.add_node(writer("technical", "technical_analysis", "t")))
            .and_then(|b| b.add_node(writer("value", "value_analysis", "v")))
            .and_then(|b| {
                b.add_node(FnNode::new("summarize", |state: ExecutionState| async move {
                    // The join input must already hold all three results.
                    assert!(state.has_data("fundamental_analysis"));
                    assert!(state.has_data("technical_analysis"));
                    assert!(state.has_data("value_analysis"));
                    StateUpdate::new().with_data("final_report", "report")
                }))
            })
            .and_then(|b| b.add_edge("start", "fundamental"))
            .and_then(|b| b.add_edge("start", "technical"))
            .and_then(|b| b.add_edge("start", "value"))
            .and_then(|b| b.add_edge("fundamental", "summarize"))
            .and_then(|b| b.add_edge("technical", "summarize"))
            .and_then(|b| b.add_edge("value", "summarize"))
            .expect("valid graph")
            .set_entry_point("start")
            .compile()
            .expect("compiles")
    }

    #[tokio::test]
    async fn test_linear_chain() {
        let graph = GraphBuilder::new()
            .add_node(writer("a", "first", "1"))
            .and_then(|b| b.add_node(writer("b", "second", "2")))
            .and_then(|b| b.add_edge("a", "b"))
            .expect("edges")
            .set_entry_point("a")
            .compile()
            .expect("compiles");

        let terminal = graph.run(ExecutionState::new()).await.expect("runs");
        assert_eq!(terminal.data_str("first"), Some("1"));
        assert_eq!(terminal.data_str("second"), Some("2"));
        assert_eq!(terminal.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_join_waits_for_all_predecessors() {
        let graph = fan_out_fan_in();
        let terminal = graph
            .run(ExecutionState::with_query("q"))
            .await
            .expect("runs");

        assert_eq!(terminal.data_str("final_report"), Some("report"));
        assert_eq!(terminal.data_str("fundamental_analysis"), Some("f"));
        assert_eq!(terminal.data_str("technical_analysis"), Some("t"));
        assert_eq!(terminal.data_str("value_analysis"), Some("v"));
    }

    #[tokio::test]
    async fn test_branches_run_concurrently() {
        // Both branch nodes block on the same barrier; the run can only
        // finish if their suspension windows overlap.
        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        let left_barrier = barrier.clone();
        let right_barrier = barrier;

        let graph = GraphBuilder::new()
            .add_node(passthrough("start"))
            .and_then(|b| {
                b.add_node(FnNode::new("left", move |_| {
                    let barrier = left_barrier.clone();
                    async move {
                        barrier.wait().await;
                        StateUpdate::new().with_data("left", "done")
                    }
                }))
            })
            .and_then(|b| {
                b.add_node(FnNode::new("right", move |_| {
                    let barrier = right_barrier.clone();
                    async move {
                        barrier.wait().await;
                        StateUpdate::new().with_data("right", "done")
                    }
                }))
            })
            .and_then(|b| b.add_node(passthrough("join")))
            .and_then(|b| b.add_edge("start", "left"))
            .and_then(|b| b.add_edge("start", "right"))
            .and_then(|b| b.add_edge("left", "join"))
            .and_then(|b| b.add_edge("right", "join"))
            .expect("edges")
            .set_entry_point("start")
            .compile()
            .expect("compiles");

        let terminal = tokio::time::timeout(Duration::from_secs(5), graph.run(ExecutionState::new()))
            .await
            .expect("no deadlock")
            .expect("runs");
        assert_eq!(terminal.data_str("left"), Some("done"));
        assert_eq!(terminal.data_str("right"), Some("done"));
    }

    #[tokio::test]
    async fn test_panicking_node_captured_as_error() {
        let graph = GraphBuilder::new()
            .add_node(passthrough("start"))
            .and_then(|b| {
                b.add_node(FnNode::new("boom", |_| async {
                    panic!("collaborator exploded");
                }))
            })
            .and_then(|b| b.add_node(writer("steady", "steady_result", "ok")))
            .and_then(|b| b.add_node(passthrough("join")))
            .and_then(|b| b.add_edge("start", "boom"))
            .and_then(|b| b.add_edge("start", "steady"))
            .and_then(|b| b.add_edge("boom", "join"))
            .and_then(|b| b.add_edge("steady", "join"))
            .expect("edges")
            .set_entry_point("start")
            .compile()
            .expect("compiles");

        let terminal = graph.run(ExecutionState::new()).await.expect("runs");
        assert_eq!(terminal.data_str("boom_error"), Some("collaborator exploded"));
        assert_eq!(terminal.data_str("steady_result"), Some("ok"));
    }

    #[tokio::test]
    async fn test_node_timeout_captured_as_error() {
        let graph = GraphBuilder::new()
            .add_node(passthrough("start"))
            .and_then(|b| {
                b.add_node(FnNode::new("stuck", |_| async {
                    tokio::time::sleep(Duration::from_secs(600)).await;
                    StateUpdate::new().with_data("stuck_result", "never")
                }))
            })
            .and_then(|b| b.add_node(writer("quick", "quick_result", "ok")))
            .and_then(|b| b.add_node(passthrough("join")))
            .and_then(|b| b.add_edge("start", "stuck"))
            .and_then(|b| b.add_edge("start", "quick"))
            .and_then(|b| b.add_edge("stuck", "join"))
            .and_then(|b| b.add_edge("quick", "join"))
            .expect("edges")
            .set_entry_point("start")
            .compile()
            .expect("compiles");

        let options = RunOptions::new().with_node_timeout(Duration::from_millis(50));
        let terminal = graph
            .run_with(ExecutionState::new(), options)
            .await
            .expect("runs");

        assert_eq!(terminal.data_str("stuck_error"), Some("timeout"));
        assert!(!terminal.has_data("stuck_result"));
        assert_eq!(terminal.data_str("quick_result"), Some("ok"));
    }

    #[tokio::test]
    async fn test_run_deadline_fails_pending_nodes() {
        let graph = GraphBuilder::new()
            .add_node(FnNode::new("slow_start", |_| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                StateUpdate::new()
            }))
            .and_then(|b| b.add_node(writer("after", "after_result", "x")))
            .and_then(|b| b.add_edge("slow_start", "after"))
            .expect("edges")
            .set_entry_point("slow_start")
            .compile()
            .expect("compiles");

        let options = RunOptions::new().with_run_timeout(Duration::from_millis(30));
        let terminal = graph
            .run_with(ExecutionState::new(), options)
            .await
            .expect("runs");

        // The entry node itself times out; the downstream node starts after
        // the deadline and is failed without invoking its handler.
        assert_eq!(terminal.data_str("slow_start_error"), Some("timeout"));
        assert_eq!(terminal.data_str("after_error"), Some("timeout"));
        assert!(!terminal.has_data("after_result"));
    }

    #[tokio::test]
    async fn test_merge_is_deterministic() {
        let graph = fan_out_fan_in();

        let first = graph
            .run(ExecutionState::with_query("q"))
            .await
            .expect("runs");
        let second = graph
            .run(ExecutionState::with_query("q"))
            .await
            .expect("runs");

        assert_eq!(first.data, second.data);
        assert_eq!(
            first.data.keys().collect::<Vec<_>>(),
            second.data.keys().collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_overlapping_keys_resolve_by_declaration_order() {
        // Two branches deliberately violate the disjoint-keys contract; the
        // later-declared node wins because updates merge in declaration order.
        let counter = Arc::new(AtomicUsize::new(0));
        let c1 = counter.clone();
        let c2 = counter;

        let graph = GraphBuilder::new()
            .add_node(passthrough("start"))
            .and_then(|b| {
                b.add_node(FnNode::new("first_declared", move |_| {
                    let c = c1.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        StateUpdate::new().with_data("shared", "from_first")
                    }
                }))
            })
            .and_then(|b| {
                b.add_node(FnNode::new("second_declared", move |_| {
                    let c = c2.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        StateUpdate::new().with_data("shared", "from_second")
                    }
                }))
            })
            .and_then(|b| b.add_node(passthrough("join")))
            .and_then(|b| b.add_edge("start", "first_declared"))
            .and_then(|b| b.add_edge("start", "second_declared"))
            .and_then(|b| b.add_edge("first_declared", "join"))
            .and_then(|b| b.add_edge("second_declared", "join"))
            .expect("edges")
            .set_entry_point("start")
            .compile()
            .expect("compiles");

        for _ in 0..10 {
            let terminal = graph.run(ExecutionState::new()).await.expect("runs");
            assert_eq!(terminal.data_str("shared"), Some("from_second"));
        }
    }
}
