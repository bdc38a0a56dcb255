//! Query parsing
//!
//! Extracts a company name and stock code from a free-form Chinese query
//! like "分析嘉友国际" or "603871 这个股票值得买吗？". Extraction is best
//! effort; when nothing is found the agents fall back to their placeholder
//! identity and the query itself names the report file.

use regex::Regex;
use std::sync::LazyLock;

/// 6-digit code in (ASCII or fullwidth) parentheses
static PAREN_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[（(](\d{6})[)）]").expect("static regex"));

/// Standalone 6-digit code
static BARE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{6})\b").expect("static regex"));

/// Company name and stock code extracted from the user query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockIdentity {
    /// Company name, when the query names one
    pub company_name: Option<String>,
    /// Exchange-prefixed stock code ("sh.603871" / "sz.000001")
    pub stock_code: Option<String>,
}

/// Extract company name and stock code from a query
pub fn extract_identity(query: &str) -> StockIdentity {
    let mut company_name = None;
    let mut stock_code = None;

    // "分析<company>" pattern: company is whatever follows the verb
    if let Some((_, rest)) = query.split_once("分析") {
        let rest = rest.trim();
        if !rest.is_empty() {
            let mut name = rest.to_string();

            // A code in parentheses belongs to the code, not the name
            if let Some(cap) = PAREN_CODE.captures(&name) {
                stock_code = Some(cap[1].to_string());
                name = PAREN_CODE.replace_all(&name, "").trim().to_string();
            }

            if !name.is_empty() {
                company_name = Some(name);
            }
        }
    }

    // Any standalone 6-digit number may be a stock code
    if stock_code.is_none() {
        if let Some(cap) = BARE_CODE.captures(query) {
            stock_code = Some(cap[1].to_string());
        }
    }

    StockIdentity {
        company_name,
        stock_code: stock_code.map(|code| prefix_exchange(&code)),
    }
}

/// Prefix a bare A-share code with its exchange
///
/// Shanghai codes start with 6, Shenzhen with 0 or 3. Anything else is
/// passed through unprefixed.
pub fn prefix_exchange(code: &str) -> String {
    match code.chars().next() {
        Some('6') => format!("sh.{code}"),
        Some('0' | '3') => format!("sz.{code}"),
        _ => code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_after_verb() {
        let identity = extract_identity("分析嘉友国际");
        assert_eq!(identity.company_name.as_deref(), Some("嘉友国际"));
        assert_eq!(identity.stock_code, None);
    }

    #[test]
    fn test_parenthesized_code_is_split_off() {
        let identity = extract_identity("分析嘉友国际（603871）");
        assert_eq!(identity.company_name.as_deref(), Some("嘉友国际"));
        assert_eq!(identity.stock_code.as_deref(), Some("sh.603871"));
    }

    #[test]
    fn test_ascii_parentheses_also_match() {
        let identity = extract_identity("分析嘉友国际(603871)");
        assert_eq!(identity.stock_code.as_deref(), Some("sh.603871"));
    }

    #[test]
    fn test_bare_code_without_verb() {
        let identity = extract_identity("603871 这个股票值得买吗？");
        assert_eq!(identity.company_name, None);
        assert_eq!(identity.stock_code.as_deref(), Some("sh.603871"));
    }

    #[test]
    fn test_shenzhen_prefixes() {
        assert_eq!(prefix_exchange("000001"), "sz.000001");
        assert_eq!(prefix_exchange("300750"), "sz.300750");
        assert_eq!(prefix_exchange("603871"), "sh.603871");
        assert_eq!(prefix_exchange("830001"), "830001");
    }

    #[test]
    fn test_no_identity_found() {
        let identity = extract_identity("帮我看看这只股票怎么样");
        assert_eq!(identity, StockIdentity::default());
    }
}
