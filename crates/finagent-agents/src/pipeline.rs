//! Pipeline wiring
//!
//! One fixed fan-out/fan-in shape:
//!
//! ```text
//!              ┌─ fundamental_analyst ─┐
//! start_node ──┼─ technical_analyst  ──┼── summarizer
//!              └─ value_analyst      ──┘
//! ```
//!
//! The analysts run concurrently; the summarizer starts only after all
//! three have completed, whether they succeeded or not.

use crate::analyst::{AnalystAgent, AnalystKind};
use crate::summary::SummaryAgent;
use finagent_core::{FnNode, StateUpdate};
use finagent_graph::{CompiledGraph, GraphBuilder, GraphError};
use finagent_llm::LLMProvider;
use finagent_mcp::ToolProvider;
use std::path::PathBuf;
use std::sync::Arc;

/// Build the stock-analysis execution graph
///
/// `provider` is `None` when LLM configuration was missing at startup; the
/// graph still compiles and runs, with every agent degrading to its error
/// key.
pub fn build_graph(
    provider: Option<Arc<dyn LLMProvider>>,
    tools: Arc<dyn ToolProvider>,
    reports_dir: impl Into<PathBuf>,
) -> Result<CompiledGraph, GraphError> {
    // Pass-through entry point: a clear starting point for the fan-out
    GraphBuilder::new()
        .add_node(FnNode::new("start_node", |_| async { StateUpdate::new() }))?
        .add_node(AnalystAgent::new(
            AnalystKind::Fundamental,
            provider.clone(),
            Arc::clone(&tools),
        ))?
        .add_node(AnalystAgent::new(
            AnalystKind::Technical,
            provider.clone(),
            Arc::clone(&tools),
        ))?
        .add_node(AnalystAgent::new(
            AnalystKind::Value,
            provider.clone(),
            Arc::clone(&tools),
        ))?
        .add_node(SummaryAgent::new(provider, reports_dir))?
        .add_edge("start_node", "fundamental_analyst")?
        .add_edge("start_node", "technical_analyst")?
        .add_edge("start_node", "value_analyst")?
        .add_edge("fundamental_analyst", "summarizer")?
        .add_edge("technical_analyst", "summarizer")?
        .add_edge("value_analyst", "summarizer")?
        .set_entry_point("start_node")
        .compile()
}
