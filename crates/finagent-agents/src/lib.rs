//! Analysis agents for finagent-rs
//!
//! Four LLM-backed agents cooperate on one stock analysis:
//!
//! - three analysts (fundamental, technical, value) run concurrently, each
//!   driving a bounded tool-use loop against the shared MCP toolset;
//! - a summarizer joins their outputs into a single Markdown report and
//!   writes it to disk.
//!
//! [`pipeline::build_graph`] wires them into the execution graph.

pub mod analyst;
pub mod executor;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod summary;

pub use analyst::{AnalystAgent, AnalystKind};
pub use executor::{ToolLoop, ToolLoopConfig};
pub use pipeline::build_graph;
pub use summary::SummaryAgent;
