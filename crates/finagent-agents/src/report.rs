//! Report file output
//!
//! Reports land in a `reports/` directory as
//! `report_<company>_<code>_<timestamp>.md` (or `error_report_...` when
//! summarization failed). Company names and stock codes come from user
//! input, so every user-derived filename segment is reduced to a
//! conservative character set before it touches the filesystem: no path
//! separators, no dots, no way to escape the reports directory.

use chrono::Local;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Placeholder company name when extraction found nothing
pub const UNKNOWN_COMPANY: &str = "Unknown Company";
/// Placeholder stock code when extraction found nothing
pub const UNKNOWN_STOCK: &str = "Unknown Stock";

/// Kind of report being written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Normal summarization output
    Final,
    /// Degraded report produced after a summarization failure
    Error,
}

impl ReportKind {
    fn prefix(self) -> &'static str {
        match self {
            ReportKind::Final => "report",
            ReportKind::Error => "error_report",
        }
    }
}

/// Reduce a user-derived segment to filename-safe characters
///
/// Whitespace becomes `_`; alphanumerics (including CJK), `_` and `-` are
/// kept; everything else (dots, slashes, control characters) is dropped.
pub fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_alphanumeric() || c == '_' || c == '-' {
                Some(c)
            } else {
                None
            }
        })
        .collect()
}

/// Strip the exchange prefix from a stock code ("sh.603871" -> "603871")
pub fn clean_stock_code(code: &str) -> String {
    code.replace("sh.", "").replace("sz.", "")
}

/// Derive a fallback name from the user query
///
/// Drops the "分析" verb and sanitizes what remains.
fn name_from_query(query: &str, default: &str) -> String {
    let name = sanitize_segment(&query.replace("分析", ""));
    if name.is_empty() {
        default.to_string()
    } else {
        name
    }
}

/// Build the report filename for this run
///
/// When no stock code was extracted, the filename is derived from the user
/// query instead of the company/code pair.
pub fn report_file_name(
    kind: ReportKind,
    company_name: &str,
    stock_code: &str,
    user_query: &str,
) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let prefix = kind.prefix();

    if stock_code == UNKNOWN_STOCK {
        let name = name_from_query(user_query, "financial_analysis");
        return format!("{prefix}_{name}_{timestamp}.md");
    }

    let mut safe_company = sanitize_segment(company_name);
    if company_name == UNKNOWN_COMPANY || safe_company.is_empty() {
        safe_company = name_from_query(user_query, "company");
    }
    let code = sanitize_segment(&clean_stock_code(stock_code));

    format!("{prefix}_{safe_company}_{code}_{timestamp}.md")
}

/// Write a report under `reports_dir`, creating the directory if needed
pub fn write_report(reports_dir: &Path, file_name: &str, content: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(reports_dir)?;
    let path = reports_dir.join(file_name);
    fs::write(&path, content)?;
    info!("Report saved to {}", path.display());
    Ok(path)
}

/// Remove Markdown code fence markers the model sometimes wraps output in
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```markdown", "").replace("```", "").trim().to_string()
}
