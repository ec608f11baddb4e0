//! Read-only verification for generated SQL.
//!
//! The executor's first line of defense is a lexical `SELECT` prefix check.
//! This module adds an AST-level pass using sqlparser with the PostgreSQL
//! dialect: a statement that parses must be a single query with no
//! data-modifying CTEs or subqueries. Statements sqlparser cannot parse
//! (Postgres array operators and similar) are allowed through on the
//! strength of the prefix check alone.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use tracing::warn;

use crate::error::{AnalystError, Result};

/// Verifies that a sanitized statement is read-only.
///
/// Returns `Ok(())` when the statement is a pure query, or when it cannot be
/// parsed at all. Returns `RejectedStatement` when the AST contains any
/// data-modifying operation.
pub fn ensure_read_only(sql: &str) -> Result<()> {
    let dialect = PostgreSqlDialect {};
    let statements = match Parser::parse_sql(&dialect, sql) {
        Ok(statements) => statements,
        Err(e) => {
            // Postgres-specific syntax the parser lacks; the prefix check
            // already passed, so let the server be the judge.
            warn!("Could not parse statement for read-only check: {e}");
            return Ok(());
        }
    };

    if statements.len() > 1 {
        return Err(AnalystError::rejected(
            "Multiple statements are not allowed.",
        ));
    }

    match statements.first() {
        Some(Statement::Query(query)) if query_is_read_only(query) => Ok(()),
        Some(_) => Err(AnalystError::rejected("Only SELECT queries are allowed.")),
        None => Err(AnalystError::rejected("Empty SQL statement.")),
    }
}

/// Checks a query and its CTEs for data-modifying operations.
fn query_is_read_only(query: &Query) -> bool {
    if let Some(with) = &query.with {
        if !with.cte_tables.iter().all(|cte| query_is_read_only(&cte.query)) {
            return false;
        }
    }
    set_expr_is_read_only(&query.body)
}

fn set_expr_is_read_only(set_expr: &SetExpr) -> bool {
    match set_expr {
        // Data-modifying CTE bodies
        SetExpr::Delete(_) | SetExpr::Update(_) | SetExpr::Insert(_) | SetExpr::Merge(_) => {
            false
        }

        SetExpr::Query(query) => query_is_read_only(query),
        SetExpr::Select(select) => select_is_read_only(select),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_is_read_only(left) && set_expr_is_read_only(right)
        }
        SetExpr::Values(_) | SetExpr::Table(_) => true,
    }
}

/// Checks the FROM clause of a SELECT for mutating subqueries.
fn select_is_read_only(select: &Select) -> bool {
    select.from.iter().all(table_with_joins_is_read_only)
}

fn table_with_joins_is_read_only(twj: &TableWithJoins) -> bool {
    table_factor_is_read_only(&twj.relation)
        && twj
            .joins
            .iter()
            .all(|join| table_factor_is_read_only(&join.relation))
}

fn table_factor_is_read_only(factor: &TableFactor) -> bool {
    match factor {
        TableFactor::Derived { subquery, .. } => query_is_read_only(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => table_with_joins_is_read_only(table_with_joins),
        _ => true,
    }
}
