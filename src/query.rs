//! Read-only query execution for the `run_postgres_query` tool.
//!
//! The executor owns the full tool contract: sanitize the statement,
//! enforce the SELECT-only guard before touching the database, run the
//! query on a short-lived connection, and shape the result into the
//! bounded JSON payload handed back to the model.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::marker::PhantomData;
use tracing::info;

use crate::config::DbConfig;
use crate::db::{DatabaseClient, RowSet};
use crate::error::{AnalystError, Result};
use crate::llm::ToolDefinition;
use crate::sanitize::clean_sql;
use crate::safety::ensure_read_only;

/// Row cap applied when the model does not pass `max_rows`.
pub const DEFAULT_MAX_ROWS: usize = 100;

/// Cell values longer than this many characters are cut down.
const MAX_CELL_CHARS: usize = 2000;

/// The payload returned to the model after a successful query.
///
/// `row_count` is the full result size; `rows` holds at most `max_rows`
/// entries and `returned_rows` says how many survived the cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultPayload {
    pub row_count: usize,
    pub returned_rows: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl ResultPayload {
    /// Serializes the payload as compact JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| json!({ "error": format!("Failed to serialize result: {e}") }).to_string())
    }
}

/// Arguments of the `run_postgres_query` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunQueryInput {
    pub sql: String,
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_max_rows() -> usize {
    DEFAULT_MAX_ROWS
}

/// Returns the tool definition exposed to the SQL agent.
pub fn run_postgres_query_tool() -> ToolDefinition {
    ToolDefinition {
        name: "run_postgres_query".to_string(),
        description: "Execute a single read-only SQL SELECT against the conversations \
                      database and return the rows as JSON. Non-SELECT statements are rejected."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "A single PostgreSQL SELECT statement"
                },
                "max_rows": {
                    "type": "integer",
                    "description": "Maximum number of rows to return (default: 100)"
                }
            },
            "required": ["sql"]
        }),
    }
}

/// Checks that the statement lexically starts with SELECT.
fn is_select_statement(sql: &str) -> bool {
    let trimmed = sql.trim_start();
    let mut chars = trimmed.chars();
    let prefix: String = chars.by_ref().take(6).collect();
    if !prefix.eq_ignore_ascii_case("select") {
        return false;
    }
    // "selection" must not pass; require a boundary after the keyword
    match chars.next() {
        None => true,
        Some(c) => !c.is_alphanumeric() && c != '_',
    }
}

/// Caps the result at `max_rows` rows and `MAX_CELL_CHARS` per text cell.
fn build_payload(row_set: RowSet, max_rows: usize) -> ResultPayload {
    let row_count = row_set.len();
    let rows: Vec<Map<String, Value>> = row_set
        .rows
        .into_iter()
        .take(max_rows)
        .map(truncate_cells)
        .collect();
    let returned_rows = rows.len();

    // Columns describe the returned rows, so a capped-to-nothing result
    // carries none
    let columns = if rows.is_empty() {
        Vec::new()
    } else {
        row_set.columns
    };

    ResultPayload {
        row_count,
        returned_rows,
        columns,
        rows,
    }
}

fn truncate_cells(mut row: Map<String, Value>) -> Map<String, Value> {
    for value in row.values_mut() {
        if let Value::String(s) = value {
            if s.chars().count() > MAX_CELL_CHARS {
                let mut cut: String = s.chars().take(MAX_CELL_CHARS - 3).collect();
                cut.push_str("...");
                *value = Value::String(cut);
            }
        }
    }
    row
}

/// Executes read-only statements on per-call connections.
pub struct QueryExecutor<C: DatabaseClient> {
    config: DbConfig,
    _client: PhantomData<C>,
}

impl<C: DatabaseClient> QueryExecutor<C> {
    /// Creates a new query executor for the given connection config.
    pub fn new(config: DbConfig) -> Self {
        Self {
            config,
            _client: PhantomData,
        }
    }

    /// Sanitizes, verifies and runs a statement, returning the bounded payload.
    ///
    /// The read-only guard runs before any connection is opened. The
    /// connection is closed on success and failure alike.
    pub async fn run_query(&self, sql_text: &str, max_rows: usize) -> Result<ResultPayload> {
        let sql = clean_sql(sql_text);

        if !is_select_statement(&sql) {
            return Err(AnalystError::rejected("Only SELECT queries are allowed."));
        }
        ensure_read_only(&sql)?;

        info!("Executing query: {}", sql);

        let client = C::connect(&self.config).await?;
        let fetched = client.fetch_rows(&sql).await;
        let _ = client.close().await;

        Ok(build_payload(fetched?, max_rows))
    }

    /// Runs the `run_postgres_query` tool call.
    ///
    /// Failures are reported to the model as `{"error": ...}` rather than
    /// surfaced as errors, so the SQL agent can recover or decline.
    pub async fn run_tool(&self, arguments: &str) -> String {
        let input: RunQueryInput = match serde_json::from_str(arguments) {
            Ok(input) => input,
            Err(e) => return error_json(format!("Invalid tool arguments: {e}")),
        };

        match self.run_query(&input.sql, input.max_rows).await {
            Ok(payload) => payload.to_json(),
            Err(e) => {
                let message = match e {
                    AnalystError::RejectedStatement(msg) => msg,
                    other => other.to_string(),
                };
                error_json(message)
            }
        }
    }
}

fn error_json(message: impl Into<String>) -> String {
    json!({ "error": message.into() }).to_string()
}
