//! The three analyst agents
//!
//! One `AnalystAgent` type covers the fundamental, technical and value
//! analysts; only the prompt and the state keys differ by kind. Every
//! failure an analyst can anticipate is captured into the returned update
//! as a `<kind>_analysis_error` key so the sibling branches and the
//! summarizer keep running.

use crate::executor::{ToolLoop, ToolLoopConfig};
use crate::prompts::{self, PromptContext};
use finagent_core::{ExecutionState, LogMessage, Node, StateUpdate};
use finagent_llm::{extract_final_text, LLMProvider};
use finagent_mcp::ToolProvider;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Which analysis an [`AnalystAgent`] performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalystKind {
    /// Financial statements, profitability, growth, solvency, dividends
    Fundamental,
    /// Price trends, volume, indicators, support and resistance
    Technical,
    /// Valuation multiples, peer comparison, dividend yield, intrinsic value
    Value,
}

impl AnalystKind {
    /// Node name registered in the graph
    pub fn node_name(self) -> &'static str {
        match self {
            Self::Fundamental => "fundamental_analyst",
            Self::Technical => "technical_analyst",
            Self::Value => "value_analyst",
        }
    }

    /// Data key the analysis text is stored under
    pub fn analysis_key(self) -> &'static str {
        match self {
            Self::Fundamental => "fundamental_analysis",
            Self::Technical => "technical_analysis",
            Self::Value => "value_analysis",
        }
    }

    /// Data key a captured failure is stored under
    pub fn error_key(self) -> &'static str {
        match self {
            Self::Fundamental => "fundamental_analysis_error",
            Self::Technical => "technical_analysis_error",
            Self::Value => "value_analysis_error",
        }
    }

    /// Metadata key prefix ("fundamental_agent", ...)
    fn agent_stem(self) -> &'static str {
        match self {
            Self::Fundamental => "fundamental_agent",
            Self::Technical => "technical_agent",
            Self::Value => "value_agent",
        }
    }

    /// Log message appended on success
    fn completion_note(self) -> &'static str {
        match self {
            Self::Fundamental => "基本面分析已完成",
            Self::Technical => "技术分析已完成",
            Self::Value => "估值分析已完成",
        }
    }

    /// Degraded analysis text substituted after a fault
    fn degraded_text(self, err: &str) -> String {
        let label = match self {
            Self::Fundamental => "基本面",
            Self::Technical => "技术",
            Self::Value => "估值",
        };
        format!("{label}分析过程中出现错误: {err}")
    }

    fn request(self, ctx: &PromptContext<'_>) -> String {
        match self {
            Self::Fundamental => prompts::fundamental_request(ctx),
            Self::Technical => prompts::technical_request(ctx),
            Self::Value => prompts::value_request(ctx),
        }
    }
}

/// One LLM-backed analyst node
///
/// `provider` is `None` when the LLM environment variables were missing at
/// startup; the agent then degrades to an error key without any external
/// call, and the run still produces a (degraded) report.
pub struct AnalystAgent {
    kind: AnalystKind,
    provider: Option<Arc<dyn LLMProvider>>,
    tools: Arc<dyn ToolProvider>,
    loop_config: ToolLoopConfig,
}

impl AnalystAgent {
    /// Create an analyst of the given kind
    pub fn new(
        kind: AnalystKind,
        provider: Option<Arc<dyn LLMProvider>>,
        tools: Arc<dyn ToolProvider>,
    ) -> Self {
        Self {
            kind,
            provider,
            tools,
            loop_config: ToolLoopConfig::default(),
        }
    }

    /// Override the tool loop configuration
    pub fn with_loop_config(mut self, config: ToolLoopConfig) -> Self {
        self.loop_config = config;
        self
    }

    /// Fault capture: error key, degraded analysis text, diagnostic metadata
    fn fault(&self, err: &str) -> StateUpdate {
        error!("{}: {}", self.kind.node_name(), err);
        StateUpdate::new()
            .with_data(
                self.kind.error_key(),
                format!("Error in MCP or agent execution: {err}"),
            )
            .with_data(self.kind.analysis_key(), self.kind.degraded_text(err))
            .with_metadata(format!("{}_error", self.kind.agent_stem()), err.to_string())
    }
}

#[async_trait]
impl Node for AnalystAgent {
    async fn run(&self, state: ExecutionState) -> StateUpdate {
        if state.data_str("query").is_none_or(str::is_empty) {
            error!("{}: user query is missing in state data", self.kind.node_name());
            return StateUpdate::new().with_data(self.kind.error_key(), "User query is missing.");
        }

        let Some(provider) = &self.provider else {
            error!("{}: missing LLM environment variables", self.kind.node_name());
            return StateUpdate::new().with_data(
                self.kind.error_key(),
                "Missing OpenAI environment variables.",
            );
        };

        // Zero tools is a captured error, not a reason to call the model
        match self.tools.list_tools().await {
            Ok(tools) if tools.is_empty() => {
                error!("{}: no MCP tools available", self.kind.node_name());
                return StateUpdate::new()
                    .with_data(self.kind.error_key(), "No MCP tools available.");
            }
            Ok(tools) => {
                info!(
                    "{}: {} tools available",
                    self.kind.node_name(),
                    tools.len()
                );
            }
            Err(e) => return self.fault(&e.to_string()),
        }

        let ctx = PromptContext {
            company_name: state.data_str("company_name").unwrap_or("Unknown"),
            stock_code: state.data_str("stock_code").unwrap_or("Unknown"),
            current_time_info: state.data_str("current_time_info").unwrap_or("未知时间"),
            current_date: state.data_str("current_date").unwrap_or("未知日期"),
        };
        let request = self.kind.request(&ctx);

        let started = Instant::now();
        let tool_loop = ToolLoop::new(
            Arc::clone(provider),
            Arc::clone(&self.tools),
            self.loop_config.clone(),
        );

        let transcript = match tool_loop.run(request).await {
            Ok(transcript) => transcript,
            Err(e) => return self.fault(&e.to_string()),
        };
        let elapsed = started.elapsed();

        let extracted = extract_final_text(&transcript);
        if extracted.was_fallback {
            warn!(
                "{}: no assistant text found, using concatenation fallback",
                self.kind.node_name()
            );
        }
        let analysis = if extracted.text.is_empty() {
            "No analysis generated.".to_string()
        } else {
            extracted.text
        };

        info!(
            "{}: analysis completed in {:.2}s ({} characters)",
            self.kind.node_name(),
            elapsed.as_secs_f64(),
            analysis.len()
        );

        let stem = self.kind.agent_stem();
        StateUpdate::new()
            .with_data(self.kind.analysis_key(), analysis)
            .with_metadata(format!("{stem}_executed"), true)
            .with_metadata(
                format!("{stem}_timestamp"),
                chrono::Local::now().to_rfc3339(),
            )
            .with_metadata(
                format!("{stem}_execution_time"),
                format!("{:.2} seconds", elapsed.as_secs_f64()),
            )
            .with_message(LogMessage::assistant(self.kind.completion_note()))
    }

    fn name(&self) -> &str {
        self.kind.node_name()
    }
}
