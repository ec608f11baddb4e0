//! SQL sanitization.
//!
//! Normalizes model-generated text that purports to be SQL into a single
//! bare statement. This is purely lexical cleanup: no parsing, no
//! validation. Read-only enforcement happens later in the query executor.

/// Normalizes model output to a bare SQL string.
///
/// Strips surrounding whitespace and code fences (optionally tagged `sql`),
/// collapses newlines to spaces, removes one layer of surrounding quotes,
/// and keeps only the first non-empty `;`-separated statement. A fence-only
/// or punctuation-only input yields the empty string, which callers must
/// treat as "no SQL produced".
pub fn clean_sql(sql_text: &str) -> String {
    let mut sql = sql_text.trim().to_string();

    // Strip a leading code fence, with or without a language tag
    if let Some(rest) = strip_leading_fence(&sql) {
        sql = rest;
    }
    // Strip a trailing closing fence
    if let Some(idx) = sql.rfind("```") {
        if sql[idx + 3..].trim().is_empty() {
            sql.truncate(idx);
        }
    }

    // Collapse embedded newlines to spaces
    sql = sql.replace(['\n', '\r'], " ");

    // Remove one layer of surrounding quotes if any
    let mut sql = sql.trim();
    for quote in ['"', '\''] {
        if sql.len() >= 2 && sql.starts_with(quote) && sql.ends_with(quote) {
            sql = sql[1..sql.len() - 1].trim();
            break;
        }
    }

    // Keep only the first non-empty statement if multiple
    if sql.contains(';') {
        if let Some(first) = sql.split(';').map(str::trim).find(|p| !p.is_empty()) {
            return first.to_string();
        }
        return String::new();
    }

    sql.to_string()
}

/// Strips a leading ``` fence (optionally tagged `sql`, any case).
///
/// Returns the remaining text, or `None` when no fence is present.
fn strip_leading_fence(text: &str) -> Option<String> {
    let rest = text.strip_prefix("```")?;
    let rest = rest
        .strip_prefix("sql")
        .or_else(|| rest.strip_prefix("SQL"))
        .or_else(|| rest.strip_prefix("Sql"))
        .unwrap_or(rest);
    Some(rest.trim_start().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_statement_unchanged() {
        assert_eq!(
            clean_sql("SELECT * FROM conversations"),
            "SELECT * FROM conversations"
        );
    }

    #[test]
    fn test_strips_tagged_fence() {
        let input = "```sql\nSELECT 1\n```";
        assert_eq!(clean_sql(input), "SELECT 1");
    }

    #[test]
    fn test_strips_untagged_fence() {
        let input = "```\nSELECT 1\n```";
        assert_eq!(clean_sql(input), "SELECT 1");
    }

    #[test]
    fn test_strips_uppercase_fence_tag() {
        let input = "```SQL\nSELECT 1\n```";
        assert_eq!(clean_sql(input), "SELECT 1");
    }

    #[test]
    fn test_collapses_newlines() {
        let input = "SELECT id,\n  name\nFROM users";
        assert_eq!(clean_sql(input), "SELECT id,   name FROM users");
    }

    #[test]
    fn test_strips_surrounding_double_quotes() {
        assert_eq!(clean_sql("\"SELECT 1\""), "SELECT 1");
    }

    #[test]
    fn test_strips_surrounding_single_quotes() {
        assert_eq!(clean_sql("'SELECT 1'"), "SELECT 1");
    }

    #[test]
    fn test_strips_only_one_quote_layer() {
        assert_eq!(clean_sql("''SELECT 1''"), "'SELECT 1'");
    }

    #[test]
    fn test_keeps_first_statement_only() {
        let input = "SELECT 1; DELETE FROM users; DROP TABLE users";
        assert_eq!(clean_sql(input), "SELECT 1");
    }

    #[test]
    fn test_skips_empty_leading_statements() {
        assert_eq!(clean_sql(" ; ;SELECT 1;"), "SELECT 1");
    }

    #[test]
    fn test_fenced_multi_statement() {
        let input = "```sql\nSELECT unnest(topics) AS topic\nFROM conversations;\nDROP TABLE conversations;\n```";
        assert_eq!(
            clean_sql(input),
            "SELECT unnest(topics) AS topic FROM conversations"
        );
    }

    #[test]
    fn test_fence_only_yields_empty() {
        assert_eq!(clean_sql("```sql\n```"), "");
        assert_eq!(clean_sql("```"), "");
    }

    #[test]
    fn test_punctuation_only_yields_empty() {
        assert_eq!(clean_sql(";;;"), "");
        assert_eq!(clean_sql("   "), "");
    }

    #[test]
    fn test_trailing_semicolon_dropped() {
        assert_eq!(clean_sql("SELECT 1;"), "SELECT 1");
    }
}
