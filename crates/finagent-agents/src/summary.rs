//! The summarizer agent
//!
//! Joins the three analyses into one Markdown report. The summarizer always
//! runs once every analyst branch has completed, whether or not the branches
//! succeeded: missing analyses enter the prompt as "Not available" and the
//! captured `*_analysis_error` keys are surfaced to the model as analysis
//! issues. Even its own failure produces a degraded report, so a run always
//! ends with a `final_report` in the state.

use crate::prompts::{self, SummaryInputs};
use crate::report::{self, ReportKind, UNKNOWN_COMPANY, UNKNOWN_STOCK};
use finagent_core::{ExecutionState, Node, StateUpdate};
use finagent_llm::{CompletionRequest, LLMProvider, Message};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

const SUMMARY_TEMPERATURE: f32 = 0.5;
const SUMMARY_MAX_TOKENS: usize = 10_000;

/// The join node that produces the final report
pub struct SummaryAgent {
    provider: Option<Arc<dyn LLMProvider>>,
    reports_dir: PathBuf,
}

impl SummaryAgent {
    /// Create a summarizer writing reports under `reports_dir`
    pub fn new(provider: Option<Arc<dyn LLMProvider>>, reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            reports_dir: reports_dir.into(),
        }
    }

    /// Persist a report, tolerating filesystem failures
    ///
    /// Returns the path when the write succeeded; a failed write costs the
    /// `report_path` key but never the `final_report` content.
    fn save(&self, kind: ReportKind, inputs: &SummaryInputs<'_>, content: &str) -> Option<PathBuf> {
        let file_name = report::report_file_name(
            kind,
            inputs.company_name,
            inputs.stock_code,
            inputs.user_query,
        );
        match report::write_report(&self.reports_dir, &file_name, content) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("failed to save report {}: {}", file_name, e);
                None
            }
        }
    }

    /// Minimal report emitted when summarization itself failed
    fn degraded_report(inputs: &SummaryInputs<'_>, err: &str) -> String {
        let availability = |text: &str| {
            if text == "Not available" {
                "Not available"
            } else {
                "Available"
            }
        };

        format!(
            "# Analysis Report for {company} ({code})

**Error encountered during report generation**: {err}

## Available Analysis Fragments:

- Fundamental Analysis: {fundamental}
- Technical Analysis: {technical}
- Value Analysis: {value}

Please review the individual analyses directly for more information.",
            company = inputs.company_name,
            code = inputs.stock_code,
            err = err,
            fundamental = availability(inputs.fundamental_analysis),
            technical = availability(inputs.technical_analysis),
            value = availability(inputs.value_analysis),
        )
    }
}

#[async_trait]
impl Node for SummaryAgent {
    async fn run(&self, state: ExecutionState) -> StateUpdate {
        let mut errors = Vec::new();
        if let Some(e) = state.data_str("fundamental_analysis_error") {
            errors.push(format!("Fundamental Analysis Error: {e}"));
        }
        if let Some(e) = state.data_str("technical_analysis_error") {
            errors.push(format!("Technical Analysis Error: {e}"));
        }
        if let Some(e) = state.data_str("value_analysis_error") {
            errors.push(format!("Value Analysis Error: {e}"));
        }

        let inputs = SummaryInputs {
            company_name: state.data_str("company_name").unwrap_or(UNKNOWN_COMPANY),
            stock_code: state.data_str("stock_code").unwrap_or(UNKNOWN_STOCK),
            user_query: state.data_str("query").unwrap_or(""),
            fundamental_analysis: state
                .data_str("fundamental_analysis")
                .unwrap_or("Not available"),
            technical_analysis: state
                .data_str("technical_analysis")
                .unwrap_or("Not available"),
            value_analysis: state.data_str("value_analysis").unwrap_or("Not available"),
            errors: &errors,
        };

        let Some(provider) = &self.provider else {
            error!("summarizer: missing LLM environment variables");
            return StateUpdate::new()
                .with_data("summary_error", "Missing OpenAI environment variables.");
        };

        let system_prompt = prompts::summary_system_prompt(
            state.data_str("current_time_info").unwrap_or("未知时间"),
            state.data_str("current_date").unwrap_or("未知日期"),
        );
        let user_prompt = prompts::summary_user_prompt(&inputs);

        info!(
            "summarizer: generating final report for {} ({})",
            inputs.company_name, inputs.stock_code
        );

        let request = CompletionRequest::builder(provider.default_model())
            .system(system_prompt)
            .add_message(Message::user(user_prompt))
            .temperature(SUMMARY_TEMPERATURE)
            .max_tokens(SUMMARY_MAX_TOKENS)
            .build();

        match provider.complete(request).await {
            Ok(response) => {
                let raw = response.message.text().unwrap_or("").to_string();
                let final_report = report::strip_code_fences(&raw);

                info!(
                    "summarizer: final report generated ({} characters)",
                    final_report.len()
                );

                let mut update =
                    StateUpdate::new().with_data("final_report", final_report.clone());
                if let Some(path) = self.save(ReportKind::Final, &inputs, &final_report) {
                    update = update.with_data("report_path", path.display().to_string());
                }
                update
            }
            Err(e) => {
                error!("summarizer: error generating final report: {}", e);

                let degraded = Self::degraded_report(&inputs, &e.to_string());
                let mut update = StateUpdate::new()
                    .with_data("summary_error", format!("Error generating final report: {e}"))
                    .with_data("final_report", degraded.clone());
                if let Some(path) = self.save(ReportKind::Error, &inputs, &degraded) {
                    update = update.with_data("report_path", path.display().to_string());
                }
                update
            }
        }
    }

    fn name(&self) -> &str {
        "summarizer"
    }
}
