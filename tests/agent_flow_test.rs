//! End-to-end message handling through the public API.
//!
//! Uses the mock model client and the mock database so the full
//! route/generate/execute/summarize path runs without network access.

use std::sync::Arc;

use convo_analyst::agent::{Orchestrator, RecordingSink, SinkEvent};
use convo_analyst::config::DbConfig;
use convo_analyst::db::MockDatabaseClient;
use convo_analyst::llm::MockLlmClient;
use convo_analyst::query::QueryExecutor;

fn orchestrator_with(llm: MockLlmClient) -> Orchestrator<MockDatabaseClient> {
    Orchestrator::new(Arc::new(llm), QueryExecutor::new(DbConfig::default()))
}

#[tokio::test]
async fn test_data_question_produces_sql_preview_and_summary() {
    let mut orchestrator = orchestrator_with(MockLlmClient::new());
    let mut sink = RecordingSink::new();

    orchestrator
        .handle_message("What are the top 3 conversation topics?", &mut sink)
        .await
        .unwrap();

    let messages = sink.messages();
    assert_eq!(messages.len(), 3, "expected SQL echo, preview and summary");

    assert!(messages[0].starts_with("Generated SQL:\n"));
    assert!(messages[0].contains("SELECT"));
    assert!(messages[0].contains("conversations"));

    assert_eq!(messages[1], "Executed query. Rows returned: 3 (of 3)");

    // Summary is plain prose, not a structured line
    assert!(!messages[2].contains("RESULT_JSON"));
    assert!(!messages[2].is_empty());

    // SQL branch is fully buffered
    assert!(sink.streamed_text().is_empty());
}

#[tokio::test]
async fn test_small_talk_streams_live_with_no_sql_messages() {
    let mut orchestrator = orchestrator_with(MockLlmClient::new());
    let mut sink = RecordingSink::new();

    orchestrator
        .handle_message("What's the weather like today?", &mut sink)
        .await
        .unwrap();

    assert!(!sink.streamed_text().is_empty());
    assert!(sink.events.contains(&SinkEvent::FinishStream));
    assert!(
        sink.messages().is_empty(),
        "general branch must not emit SQL or preview messages"
    );
}

#[tokio::test]
async fn test_declined_request_emits_only_the_summary() {
    // The router sends this to the SQL branch (it mentions conversations)
    // but the agent declines and leaves the structured lines empty.
    let llm = MockLlmClient::new().with_response(
        "drop all conversation data",
        "I can only run read-only queries.\nSQL:\nRESULT_JSON: {}",
    );
    let mut orchestrator = orchestrator_with(llm);
    let mut sink = RecordingSink::new();

    orchestrator
        .handle_message("Please drop all conversation data", &mut sink)
        .await
        .unwrap();

    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(!messages[0].starts_with("Generated SQL:"));
    assert!(!messages[0].starts_with("Executed query."));
}

#[tokio::test]
async fn test_conversation_alternates_between_branches() {
    let mut orchestrator = orchestrator_with(MockLlmClient::new());

    let mut sink = RecordingSink::new();
    orchestrator
        .handle_message("Hi! Can you help me out?", &mut sink)
        .await
        .unwrap();
    assert!(sink.messages().is_empty());

    let mut sink = RecordingSink::new();
    orchestrator
        .handle_message("How many conversations mention sentiment?", &mut sink)
        .await
        .unwrap();
    assert_eq!(sink.messages().len(), 3);

    let mut sink = RecordingSink::new();
    orchestrator
        .handle_message("Thanks, that's all!", &mut sink)
        .await
        .unwrap();
    assert!(sink.messages().is_empty());
}
