//! Graph construction and validation
//!
//! The builder keeps the graph a DAG at all times: `add_edge` rejects any
//! edge that would close a cycle, and `compile` validates the global shape
//! (single entry, single terminal sink, full reachability both ways) before
//! producing an executable [`CompiledGraph`].

use crate::error::{GraphError, Result};
use crate::graph::CompiledGraph;
use finagent_core::Node;
use std::collections::HashMap;
use std::sync::Arc;

/// One registered node plus its adjacency
pub(crate) struct NodeEntry {
    pub(crate) name: String,
    pub(crate) node: Arc<dyn Node>,
    /// Indices of predecessor nodes, in edge declaration order
    pub(crate) predecessors: Vec<usize>,
    /// Indices of successor nodes, in edge declaration order
    pub(crate) successors: Vec<usize>,
}

/// Builder for an execution graph
///
/// Nodes are identified by the name they report via [`Node::name`]; edges
/// declare "target may not start until source has completed".
#[derive(Default)]
pub struct GraphBuilder {
    entries: Vec<NodeEntry>,
    index: HashMap<String, usize>,
    entry_point: Option<usize>,
}

impl GraphBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under its own name
    ///
    /// Fails with [`GraphError::DuplicateNode`] if the name is taken.
    pub fn add_node(mut self, node: impl Node + 'static) -> Result<Self> {
        self.add_shared_node(Arc::new(node))?;
        Ok(self)
    }

    /// Register an already-shared node
    pub fn add_shared_node(&mut self, node: Arc<dyn Node>) -> Result<()> {
        let name = node.name().to_string();
        if self.index.contains_key(&name) {
            return Err(GraphError::DuplicateNode(name));
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(NodeEntry {
            name,
            node,
            predecessors: Vec::new(),
            successors: Vec::new(),
        });
        Ok(())
    }

    /// Declare that `to` may not start until `from` has completed
    ///
    /// Fails with [`GraphError::UnknownNode`] for unregistered endpoints and
    /// [`GraphError::CycleDetected`] if the edge would close a cycle.
    pub fn add_edge(mut self, from: &str, to: &str) -> Result<Self> {
        let from_idx = self.resolve(from)?;
        let to_idx = self.resolve(to)?;

        if from_idx == to_idx || self.reaches(to_idx, from_idx) {
            return Err(GraphError::CycleDetected {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        self.entries[from_idx].successors.push(to_idx);
        self.entries[to_idx].predecessors.push(from_idx);
        Ok(self)
    }

    /// Declare the node that receives the caller-supplied initial state
    pub fn set_entry_point(mut self, name: &str) -> Self {
        self.entry_point = self.index.get(name).copied();
        if self.entry_point.is_none() {
            // Unknown names surface as MissingEntryPoint at compile time.
            tracing::warn!("entry point references unknown node: {}", name);
        }
        self
    }

    /// Validate the graph and produce an executable handle
    ///
    /// Checks: entry point set and without predecessors; every node reachable
    /// from the entry; exactly one terminal sink; every node reaches the
    /// sink. Cycles are already impossible by construction.
    pub fn compile(self) -> Result<CompiledGraph> {
        let entry = self.entry_point.ok_or(GraphError::MissingEntryPoint)?;

        if !self.entries[entry].predecessors.is_empty() {
            return Err(GraphError::EntryHasPredecessors(
                self.entries[entry].name.clone(),
            ));
        }

        // Every node reachable from the entry point.
        let forward = self.reachable_from(entry, false);
        if let Some(idx) = (0..self.entries.len()).find(|i| !forward[*i]) {
            return Err(GraphError::Unreachable(self.entries[idx].name.clone()));
        }

        // Exactly one terminal sink.
        let sinks: Vec<usize> = (0..self.entries.len())
            .filter(|i| self.entries[*i].successors.is_empty())
            .collect();
        let terminal = match sinks.as_slice() {
            [] => return Err(GraphError::NoTerminal),
            [one] => *one,
            many => {
                return Err(GraphError::MultipleTerminals(
                    many.iter().map(|i| self.entries[*i].name.clone()).collect(),
                ));
            }
        };

        // Every node has a path to the sink.
        let backward = self.reachable_from(terminal, true);
        if let Some(idx) = (0..self.entries.len()).find(|i| !backward[*i]) {
            return Err(GraphError::DeadEnd(self.entries[idx].name.clone()));
        }

        // Ancestor sets in declaration order: the deterministic merge order
        // for each node's input state.
        let ancestors = self.ancestor_sets();

        Ok(CompiledGraph::new(self.entries, entry, terminal, ancestors))
    }

    fn resolve(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode(name.to_string()))
    }

    /// Depth-first reachability: can `from` reach `target` along successors?
    fn reaches(&self, from: usize, target: usize) -> bool {
        let mut stack = vec![from];
        let mut seen = vec![false; self.entries.len()];
        while let Some(idx) = stack.pop() {
            if idx == target {
                return true;
            }
            if std::mem::replace(&mut seen[idx], true) {
                continue;
            }
            stack.extend(&self.entries[idx].successors);
        }
        false
    }

    /// All nodes reachable from `start`, along successors or (reversed)
    /// predecessors.
    fn reachable_from(&self, start: usize, reversed: bool) -> Vec<bool> {
        let mut seen = vec![false; self.entries.len()];
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            if std::mem::replace(&mut seen[idx], true) {
                continue;
            }
            let next = if reversed {
                &self.entries[idx].predecessors
            } else {
                &self.entries[idx].successors
            };
            stack.extend(next);
        }
        seen
    }

    /// For each node, its full ancestor set sorted by declaration index
    fn ancestor_sets(&self) -> Vec<Vec<usize>> {
        (0..self.entries.len())
            .map(|idx| {
                let mut seen = vec![false; self.entries.len()];
                let mut stack = self.entries[idx].predecessors.clone();
                while let Some(pred) = stack.pop() {
                    if std::mem::replace(&mut seen[pred], true) {
                        continue;
                    }
                    stack.extend(&self.entries[pred].predecessors);
                }
                (0..self.entries.len()).filter(|i| seen[*i]).collect()
            })
            .collect()
    }
}
