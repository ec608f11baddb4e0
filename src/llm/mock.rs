//! Mock LLM client for testing.
//!
//! Plays whichever agent role the system prompt asks for, with
//! deterministic responses, so routing and the full SQL flow can be
//! exercised without real API calls.

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;

use crate::error::Result;
use crate::llm::types::{LlmResponse, Message, Role, ToolCall, ToolDefinition, ToolExchange};
use crate::llm::LlmClient;

/// Canned SQL produced when the mock plays the SQL agent.
const MOCK_SQL: &str = "SELECT unnest(topics) AS topic, COUNT(*) AS count FROM conversations \
                        GROUP BY topic ORDER BY count DESC LIMIT 3";

/// Mock LLM client that returns canned responses based on the system prompt.
///
/// Used for unit testing without making real API calls.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the user input contains `pattern`, the mock will return `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Extracts the system message content from a message list.
    fn extract_system(messages: &[Message]) -> String {
        messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// Extracts the last user message content from a message list.
    fn extract_user_input(messages: &[Message]) -> String {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// Heuristic matching the router prompt's notion of a data question.
    fn looks_like_data_request(input: &str) -> bool {
        let input_lower = input.to_lowercase();
        ["topic", "conversation", "sentiment", "count", "how many", "trend", "metric"]
            .iter()
            .any(|kw| input_lower.contains(kw))
    }

    /// Generates a mock response based on the agent role and input.
    fn mock_response(&self, system: &str, input: &str) -> String {
        // Routing stays deterministic even when custom responses are set
        if system.starts_with("You are a router") {
            return if Self::looks_like_data_request(input) {
                "ROUTE: SQL".to_string()
            } else {
                "ROUTE: GENERAL".to_string()
            };
        }

        let input_lower = input.to_lowercase();
        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        if system.contains("You summarize SQL query results") {
            return "The results cover 3 rows. Billing is the most discussed topic, \
                    followed by refunds and shipping."
                .to_string();
        }

        "I can help with questions about your conversation data or anything else.".to_string()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let system = Self::extract_system(messages);
        let input = Self::extract_user_input(messages);
        Ok(self.mock_response(&system, &input))
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
    ) -> Result<BoxStream<'static, Result<String>>> {
        let response = self.complete(messages).await?;

        // Simulate streaming by yielding chunks
        let chunks: Vec<String> = response
            .chars()
            .collect::<Vec<_>>()
            .chunks(10)
            .map(|c| c.iter().collect())
            .collect();

        let stream = stream::iter(chunks.into_iter().map(Ok));
        Ok(stream.boxed())
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        let system = Self::extract_system(messages);
        let input = Self::extract_user_input(messages);

        let input_lower = input.to_lowercase();
        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return Ok(LlmResponse::text(response.clone()));
            }
        }

        // The SQL agent prompt names the tool; call it for data questions
        if system.contains("run_postgres_query") && !tools.is_empty() {
            if Self::looks_like_data_request(&input) {
                let arguments = serde_json::json!({ "sql": MOCK_SQL }).to_string();
                return Ok(LlmResponse::with_tool_calls(
                    String::new(),
                    vec![ToolCall {
                        id: "mock_tool_call_1".to_string(),
                        name: "run_postgres_query".to_string(),
                        arguments,
                    }],
                ));
            }
            return Ok(LlmResponse::text("Not a data request.\nSQL:\nRESULT_JSON: {}"));
        }

        let response = self.mock_response(&system, &input);
        Ok(LlmResponse::text(response))
    }

    async fn continue_with_tool_results(
        &self,
        _messages: &[Message],
        exchanges: &[ToolExchange],
        _tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        // The latest round decides the final answer
        let latest = exchanges.last();

        let sql = latest
            .and_then(|e| e.calls.first())
            .and_then(|tc| serde_json::from_str::<serde_json::Value>(&tc.arguments).ok())
            .and_then(|v| v.get("sql").and_then(|s| s.as_str()).map(String::from))
            .unwrap_or_default();

        let result = latest
            .and_then(|e| e.results.first())
            .map(|r| r.content.clone())
            .unwrap_or_else(|| "{}".to_string());

        Ok(LlmResponse::text(format!(
            "SQL: {}\nRESULT_JSON: {}",
            sql, result
        )))
    }
}
