//! convo-analyst - conversational analytics over a conversations database.
//!
//! This library exposes the core modules for use in integration tests.

pub mod agent;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod query;
pub mod safety;
pub mod sanitize;
