//! Agent pool and orchestration.
//!
//! Four agents with fixed system prompts share one model client: a router
//! that picks the branch, a SQL generator holding the query tool, a
//! summarizer and a general-purpose responder.

pub mod extract;
pub mod orchestrator;
pub mod pool;
pub mod prompts;
pub mod sink;

pub use extract::{detect_route, extract_result_json, extract_sql, row_count_preview, Route};
pub use orchestrator::Orchestrator;
pub use pool::{Agent, AgentPool};
pub use sink::{ChatSink, RecordingSink, SinkEvent, StdoutSink};
