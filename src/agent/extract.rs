//! Pattern extraction from agent output.
//!
//! The router and SQL agents communicate through literal markers in free
//! text. Extraction is forgiving: a missing marker yields the empty
//! default rather than an error.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::sanitize::clean_sql;

/// The branch chosen for an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Sql,
    General,
}

fn route_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)ROUTE:\s*SQL").unwrap())
}

fn sql_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SQL:\s*(.*)").unwrap())
}

fn result_json_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)RESULT_JSON:\s*(\{.*\})").unwrap())
}

/// Derives the route from router output.
///
/// Anything that does not contain `ROUTE: SQL` (any case) is GENERAL,
/// including empty or malformed output.
pub fn detect_route(router_output: &str) -> Route {
    if route_re().is_match(router_output) {
        Route::Sql
    } else {
        Route::General
    }
}

/// Extracts and sanitizes the `SQL:` line from agent output.
///
/// Returns the empty string when no line is present.
pub fn extract_sql(agent_output: &str) -> String {
    sql_re()
        .captures(agent_output)
        .and_then(|c| c.get(1))
        .map(|m| clean_sql(m.as_str()))
        .unwrap_or_default()
}

/// Extracts the `RESULT_JSON:` object text from agent output.
///
/// The object may span multiple lines. Defaults to `{}` when absent.
pub fn extract_result_json(agent_output: &str) -> String {
    result_json_re()
        .captures(agent_output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "{}".to_string())
}

/// Builds the row-count preview line from the result JSON.
///
/// Returns `None` when the text does not parse or carries no counts;
/// that silently skips the preview message.
pub fn row_count_preview(results_json: &str) -> Option<String> {
    let value: Value = serde_json::from_str(results_json).ok()?;
    let returned = value.get("returned_rows").and_then(Value::as_u64);
    let total = value.get("row_count").and_then(Value::as_u64);
    if returned.is_none() && total.is_none() {
        return None;
    }
    Some(format!(
        "Rows returned: {} (of {})",
        returned.unwrap_or(0),
        total.unwrap_or(0)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect_route_sql() {
        assert_eq!(detect_route("ROUTE: SQL"), Route::Sql);
        assert_eq!(detect_route("route: sql"), Route::Sql);
        assert_eq!(detect_route("Sure thing. ROUTE:SQL"), Route::Sql);
    }

    #[test]
    fn test_detect_route_general() {
        assert_eq!(detect_route("ROUTE: GENERAL"), Route::General);
        assert_eq!(detect_route(""), Route::General);
        assert_eq!(detect_route("I think this is about SQL"), Route::General);
    }

    #[test]
    fn test_extract_sql_line() {
        let output = "Here you go.\nSQL: SELECT COUNT(*) FROM conversations\nRESULT_JSON: {\"row_count\":1}";
        assert_eq!(extract_sql(output), "SELECT COUNT(*) FROM conversations");
    }

    #[test]
    fn test_extract_sql_missing() {
        assert_eq!(extract_sql("no markers here"), "");
    }

    #[test]
    fn test_extract_sql_empty_line_captures_next_marker() {
        // An empty SQL line makes the pattern skip to the next marker;
        // the orchestrator's sentinel guard filters this out.
        let output = "SQL:\nRESULT_JSON: {}";
        assert_eq!(extract_sql(output), "RESULT_JSON: {}");
    }

    #[test]
    fn test_extract_result_json_multiline() {
        let output = "SQL: SELECT 1\nRESULT_JSON: {\"rows\":[\n{\"a\":1}\n]}";
        assert_eq!(extract_result_json(output), "{\"rows\":[\n{\"a\":1}\n]}");
    }

    #[test]
    fn test_extract_result_json_default() {
        assert_eq!(extract_result_json("SQL: SELECT 1"), "{}");
    }

    #[test]
    fn test_row_count_preview() {
        let preview = row_count_preview(r#"{"row_count":10,"returned_rows":3}"#).unwrap();
        assert_eq!(preview, "Rows returned: 3 (of 10)");
    }

    #[test]
    fn test_row_count_preview_empty_object() {
        assert_eq!(row_count_preview("{}"), None);
    }

    #[test]
    fn test_row_count_preview_invalid_json() {
        assert_eq!(row_count_preview("not json"), None);
    }

    #[test]
    fn test_row_count_preview_partial_counts() {
        let preview = row_count_preview(r#"{"row_count":5}"#).unwrap();
        assert_eq!(preview, "Rows returned: 0 (of 5)");
    }
}
