//! End-to-end pipeline tests against mocked LLM and tool backends

use async_trait::async_trait;
use finagent_agents::build_graph;
use finagent_core::ExecutionState;
use finagent_llm::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, StopReason, TokenUsage,
};
use finagent_mcp::{MCPContent, MCPToolDefinition, MCPToolResult, ToolProvider};
use std::sync::{Arc, Mutex};

/// Provider that answers each agent from its prompt content and can be
/// told to fail a single branch.
struct RoutedProvider {
    fail_technical: bool,
    summary_requests: Mutex<Vec<String>>,
}

impl RoutedProvider {
    fn new(fail_technical: bool) -> Self {
        Self {
            fail_technical,
            summary_requests: Mutex::new(Vec::new()),
        }
    }

    fn reply(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 1,
                output_tokens: 1,
            },
        }
    }
}

#[async_trait]
impl LLMProvider for RoutedProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> finagent_llm::Result<CompletionResponse> {
        let prompt = request
            .messages
            .first()
            .and_then(Message::text)
            .unwrap_or("")
            .to_string();

        if prompt.contains("基本面情况") {
            return Ok(Self::reply("基本面分析：财务状况良好"));
        }
        if prompt.contains("技术指标") {
            if self.fail_technical {
                return Err(finagent_llm::LLMError::RequestFailed(
                    "connection reset".to_string(),
                ));
            }
            return Ok(Self::reply("技术分析：上升趋势"));
        }
        if prompt.contains("估值情况") {
            return Ok(Self::reply("估值分析：市盈率合理"));
        }

        // Summarization request
        self.summary_requests
            .lock()
            .expect("lock")
            .push(prompt);
        Ok(Self::reply(
            "```markdown\n# 嘉友国际(sh.603871) 综合分析报告\n\n## 执行摘要\n建议关注\n```",
        ))
    }

    fn name(&self) -> &str {
        "routed"
    }

    fn default_model(&self) -> &str {
        "test-model"
    }
}

struct StockTools;

#[async_trait]
impl ToolProvider for StockTools {
    async fn list_tools(&self) -> finagent_mcp::Result<Vec<MCPToolDefinition>> {
        Ok(vec![MCPToolDefinition {
            name: "get_stock_basic".to_string(),
            description: Some("Fetch basic stock data".to_string()),
            input_schema: serde_json::json!({"type": "object"}),
        }])
    }

    async fn call_tool(
        &self,
        _name: &str,
        _arguments: serde_json::Value,
    ) -> finagent_mcp::Result<MCPToolResult> {
        Ok(MCPToolResult {
            content: vec![MCPContent::Text {
                text: "price: 18.50".to_string(),
            }],
            is_error: None,
        })
    }
}

fn initial_state() -> ExecutionState {
    ExecutionState::with_query("分析嘉友国际")
        .with_data("company_name", "嘉友国际")
        .with_data("stock_code", "sh.603871")
        .with_data("current_date", "2025-01-01")
        .with_data(
            "current_time_info",
            "2025年01月01日 (2025-01-01) 星期三 09:30:00",
        )
}

#[tokio::test]
async fn test_golden_path_produces_full_report() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(RoutedProvider::new(false));
    let graph = build_graph(
        Some(Arc::clone(&provider) as Arc<dyn LLMProvider>),
        Arc::new(StockTools),
        dir.path().join("reports"),
    )
    .unwrap();

    let terminal = graph.run(initial_state()).await.unwrap();

    // All three analyses present, no error keys
    assert_eq!(terminal.data_str("fundamental_analysis"), Some("基本面分析：财务状况良好"));
    assert_eq!(terminal.data_str("technical_analysis"), Some("技术分析：上升趋势"));
    assert_eq!(terminal.data_str("value_analysis"), Some("估值分析：市盈率合理"));
    assert!(!terminal.has_data("fundamental_analysis_error"));
    assert!(!terminal.has_data("technical_analysis_error"));
    assert!(!terminal.has_data("value_analysis_error"));

    // Final report carries the stock identifier and no code fences
    let report = terminal.data_str("final_report").unwrap();
    assert!(report.contains("sh.603871"));
    assert!(!report.contains("```"));

    // Report file holds exactly the in-state report text
    let path = terminal.data_str("report_path").unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap(), report);

    // Each analyst appended its completion note
    let notes: Vec<&str> = terminal.messages.iter().map(|m| m.content.as_str()).collect();
    assert!(notes.contains(&"基本面分析已完成"));
    assert!(notes.contains(&"技术分析已完成"));
    assert!(notes.contains(&"估值分析已完成"));
}

#[tokio::test]
async fn test_summarizer_sees_all_three_analyses() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(RoutedProvider::new(false));
    let graph = build_graph(
        Some(Arc::clone(&provider) as Arc<dyn LLMProvider>),
        Arc::new(StockTools),
        dir.path().join("reports"),
    )
    .unwrap();

    graph.run(initial_state()).await.unwrap();

    let requests = provider.summary_requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let prompt = &requests[0];
    assert!(prompt.contains("基本面分析：财务状况良好"));
    assert!(prompt.contains("技术分析：上升趋势"));
    assert!(prompt.contains("估值分析：市盈率合理"));
    assert!(prompt.contains("分析嘉友国际"));
}

#[tokio::test]
async fn test_one_failed_branch_degrades_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(RoutedProvider::new(true));
    let graph = build_graph(
        Some(Arc::clone(&provider) as Arc<dyn LLMProvider>),
        Arc::new(StockTools),
        dir.path().join("reports"),
    )
    .unwrap();

    let terminal = graph.run(initial_state()).await.unwrap();

    // Failed branch captured, both keys present
    let error = terminal.data_str("technical_analysis_error").unwrap();
    assert!(error.contains("connection reset"));
    let degraded = terminal.data_str("technical_analysis").unwrap();
    assert!(degraded.starts_with("技术分析过程中出现错误:"));

    // Siblings unaffected
    assert_eq!(terminal.data_str("fundamental_analysis"), Some("基本面分析：财务状况良好"));
    assert_eq!(terminal.data_str("value_analysis"), Some("估值分析：市盈率合理"));

    // Summarizer still ran and surfaced the issue to the model
    assert!(terminal.has_data("final_report"));
    let requests = provider.summary_requests.lock().unwrap();
    assert!(requests[0].contains("Technical Analysis Error"));
}

#[tokio::test]
async fn test_missing_configuration_still_completes_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let graph = build_graph(None, Arc::new(StockTools), dir.path().join("reports")).unwrap();

    let terminal = graph.run(initial_state()).await.unwrap();

    assert_eq!(
        terminal.data_str("fundamental_analysis_error"),
        Some("Missing OpenAI environment variables.")
    );
    assert_eq!(
        terminal.data_str("summary_error"),
        Some("Missing OpenAI environment variables.")
    );
    assert!(!terminal.has_data("final_report"));
}
