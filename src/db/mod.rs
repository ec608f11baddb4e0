//! Database client abstraction.
//!
//! Defines the `DatabaseClient` trait implemented by the PostgreSQL client
//! and the in-memory mock used in tests, plus the `RowSet` result type that
//! query results are converted into before being handed to the model.

pub mod mock;
pub mod postgres;

pub use mock::MockDatabaseClient;
pub use postgres::PostgresClient;

use crate::config::DbConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A query result as ordered JSON rows.
///
/// Column order follows the result set; each row maps column name to a JSON
/// value. `columns` is empty when `rows` is empty.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl RowSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Trait for database clients.
///
/// Connections are short-lived: the query executor connects, runs one
/// statement and closes, so a failed statement never leaves state behind.
#[async_trait]
pub trait DatabaseClient: Send + Sync + Sized {
    /// Establishes a connection using the given configuration.
    async fn connect(config: &DbConfig) -> Result<Self>;

    /// Executes a statement and returns all resulting rows.
    async fn fetch_rows(&self, sql: &str) -> Result<RowSet>;

    /// Closes the connection.
    async fn close(&self) -> Result<()>;
}
