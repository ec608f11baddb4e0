//! Mock database client for testing.
//!
//! Returns deterministic results derived from the statement text so the
//! executor and orchestrator can be tested without a running server.

use super::{DatabaseClient, RowSet};
use crate::config::DbConfig;
use crate::error::{AnalystError, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

/// A mock database client that returns predefined results.
pub struct MockDatabaseClient;

impl MockDatabaseClient {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

fn row(topic: &str, count: i64) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("topic".to_string(), json!(topic));
    map.insert("count".to_string(), json!(count));
    map
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn connect(_config: &DbConfig) -> Result<Self> {
        Ok(Self::new())
    }

    async fn fetch_rows(&self, sql: &str) -> Result<RowSet> {
        if sql.contains("nonexistent") {
            return Err(AnalystError::query(
                "ERROR: relation \"nonexistent\" does not exist",
            ));
        }

        if sql.contains("WHERE false") {
            return Ok(RowSet::default());
        }

        Ok(RowSet {
            columns: vec!["topic".to_string(), "count".to_string()],
            rows: vec![row("billing", 42), row("refunds", 17), row("shipping", 9)],
        })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_select() {
        let client = MockDatabaseClient::new();
        let result = client
            .fetch_rows("SELECT unnest(topics) AS topic FROM conversations")
            .await
            .unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.columns, vec!["topic", "count"]);
    }

    #[tokio::test]
    async fn test_mock_missing_relation() {
        let client = MockDatabaseClient::new();
        let result = client.fetch_rows("SELECT * FROM nonexistent").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_empty_result() {
        let client = MockDatabaseClient::new();
        let result = client.fetch_rows("SELECT 1 WHERE false").await.unwrap();
        assert!(result.is_empty());
    }
}
