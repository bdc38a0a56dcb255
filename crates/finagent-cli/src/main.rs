//! Command-line interface for finagent-rs
//!
//! Wires the stock-analysis graph to a real OpenAI-compatible endpoint and
//! the MCP servers declared in `mcp.json`, then runs one query taken from
//! `--command` or read interactively.

mod query;

use chrono::{Datelike, Local};
use clap::Parser;
use finagent_core::ExecutionState;
use finagent_graph::RunOptions;
use finagent_llm::providers::OpenAIProvider;
use finagent_llm::LLMProvider;
use finagent_mcp::{MCPConfig, SharedToolset};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const MCP_CONFIG_PATH: &str = "mcp.json";
const REPORTS_DIR: &str = "reports";

#[derive(Parser, Debug)]
#[command(name = "finagent")]
#[command(about = "Multi-agent stock analysis over an execution graph", long_about = None)]
struct Args {
    /// Analysis query to run; prompts interactively when omitted
    #[arg(short, long)]
    command: Option<String>,

    /// Per-node timeout in seconds
    #[arg(long)]
    node_timeout_secs: Option<u64>,

    /// Whole-run timeout in seconds
    #[arg(long)]
    run_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    finagent_core::init_tracing();

    let args = Args::parse();

    let query = match args.command {
        Some(command) => command,
        None => read_query_interactively()?,
    };

    info!("Starting analysis for query: {}", query);

    // A missing LLM configuration does not abort the run; every agent
    // degrades to its error key and the result still reports why.
    let provider: Option<Arc<dyn LLMProvider>> = match OpenAIProvider::from_env() {
        Ok(provider) => Some(Arc::new(provider)),
        Err(e) => {
            warn!("LLM provider unavailable: {}", e);
            None
        }
    };

    let mcp_config = match MCPConfig::from_file(MCP_CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            warn!("no MCP configuration loaded from {}: {}", MCP_CONFIG_PATH, e);
            MCPConfig::default()
        }
    };
    let tools = Arc::new(SharedToolset::from_config(&mcp_config));

    let graph = finagent_agents::build_graph(provider, tools, REPORTS_DIR)?;

    let mut options = RunOptions::new();
    if let Some(secs) = args.node_timeout_secs {
        options = options.with_node_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = args.run_timeout_secs {
        options = options.with_run_timeout(Duration::from_secs(secs));
    }

    let terminal = match graph.run_with(initial_state(&query), options).await {
        Ok(terminal) => terminal,
        Err(e) => {
            eprintln!("\n❌ 工作流执行期间发生错误: {e}");
            std::process::exit(1);
        }
    };

    if let Some(report) = terminal.data_str("final_report") {
        println!("\n{report}");
    }
    if let Some(path) = terminal.data_str("report_path") {
        println!("\n✅ 报告已保存至: {path}");
    }
    if let Some(error) = terminal.data_str("summary_error") {
        eprintln!("\n❌ {error}");
    }

    Ok(())
}

/// Prompt until the user enters a non-empty query
fn read_query_interactively() -> anyhow::Result<String> {
    println!("=== 股票分析助手 ===");
    println!("示例: 分析嘉友国际（603871）");

    loop {
        print!("\n请输入分析需求: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            anyhow::bail!("no query provided");
        }

        let query = line.trim();
        if !query.is_empty() {
            return Ok(query.to_string());
        }
        println!("输入不能为空，请重新输入。");
    }
}

/// Seed the execution state with the query, any extracted stock identity,
/// and the date context the prompts interpolate
fn initial_state(query: &str) -> ExecutionState {
    let now = Local::now();
    let weekday_cn = ["星期一", "星期二", "星期三", "星期四", "星期五", "星期六", "星期日"]
        [now.weekday().num_days_from_monday() as usize];
    let date_en = now.format("%Y-%m-%d").to_string();
    let date_cn = now.format("%Y年%m月%d日").to_string();
    let time = now.format("%H:%M:%S").to_string();

    let mut state = ExecutionState::with_query(query)
        .with_data("current_date", date_en.clone())
        .with_data("current_date_cn", date_cn.clone())
        .with_data("current_time", time.clone())
        .with_data("current_weekday_cn", weekday_cn)
        .with_data(
            "current_time_info",
            format!("{date_cn} ({date_en}) {weekday_cn} {time}"),
        )
        .with_data("analysis_timestamp", now.to_rfc3339());

    let identity = query::extract_identity(query);
    if let Some(company) = identity.company_name {
        info!("extracted company name: {}", company);
        state = state.with_data("company_name", company);
    }
    if let Some(code) = identity.stock_code {
        info!("extracted stock code: {}", code);
        state = state.with_data("stock_code", code);
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_carries_identity_and_dates() {
        let state = initial_state("分析嘉友国际（603871）");
        assert_eq!(state.data_str("query"), Some("分析嘉友国际（603871）"));
        assert_eq!(state.data_str("company_name"), Some("嘉友国际"));
        assert_eq!(state.data_str("stock_code"), Some("sh.603871"));
        assert!(state.has_data("current_date"));
        assert!(state.has_data("current_time_info"));
        assert!(state.has_data("analysis_timestamp"));
    }

    #[test]
    fn test_initial_state_without_identity() {
        let state = initial_state("大盘走势如何");
        assert!(!state.has_data("company_name"));
        assert!(!state.has_data("stock_code"));
    }
}
