//! Anthropic LLM client implementation.
//!
//! Implements the LlmClient trait for Anthropic's messages API. Tool use
//! rides on content blocks: `tool_use` blocks in assistant turns and
//! `tool_result` blocks in the following user turn.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{AnalystError, Result};
use crate::llm::types::{LlmResponse, Message, Role, ToolCall, ToolDefinition, ToolExchange};
use crate::llm::LlmClient;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Anthropic API base URL.
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version header.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Maximum tokens to generate.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic client configuration.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use (e.g., "claude-3-5-sonnet-latest").
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl AnthropicConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Anthropic LLM client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicClient {
    /// Creates a new Anthropic client with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnalystError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Extracts the system message and converts remaining messages to Anthropic format.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system = None;
        let mut converted = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {
                    // Anthropic uses a separate system parameter
                    system = Some(msg.content.clone());
                }
                Role::User | Role::Assistant => {
                    converted.push(AnthropicMessage {
                        role: msg.role.as_str().to_string(),
                        content: Value::String(msg.content.clone()),
                    });
                }
            }
        }

        (system, converted)
    }

    /// Converts tool definitions to Anthropic format.
    fn convert_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect()
    }

    /// Rebuilds the message list for a continuation request: the base
    /// messages, then per round an assistant turn of `tool_use` blocks and
    /// a user turn of `tool_result` blocks.
    fn continuation_messages(
        messages: &[Message],
        exchanges: &[ToolExchange],
    ) -> Result<(Option<String>, Vec<AnthropicMessage>)> {
        let (system, mut converted) = Self::convert_messages(messages);

        for exchange in exchanges {
            let mut tool_use_blocks = Vec::new();
            for tc in &exchange.calls {
                let input: Value = serde_json::from_str(&tc.arguments)
                    .map_err(|e| AnalystError::llm(format!("Invalid tool arguments: {}", e)))?;
                tool_use_blocks.push(json!({
                    "type": "tool_use",
                    "id": tc.id,
                    "name": tc.name,
                    "input": input,
                }));
            }
            converted.push(AnthropicMessage {
                role: "assistant".to_string(),
                content: Value::Array(tool_use_blocks),
            });

            let result_blocks: Vec<Value> = exchange
                .results
                .iter()
                .map(|r| {
                    json!({
                        "type": "tool_result",
                        "tool_use_id": r.tool_call_id,
                        "content": r.content,
                    })
                })
                .collect();
            converted.push(AnthropicMessage {
                role: "user".to_string(),
                content: Value::Array(result_blocks),
            });
        }

        Ok((system, converted))
    }

    /// Parses an API error response.
    fn parse_error(status: reqwest::StatusCode, body: &str) -> AnalystError {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return AnalystError::llm("Authentication failed. Check your ANTHROPIC_API_KEY.");
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return AnalystError::llm("Rate limited. Please wait and try again.");
        }

        if let Ok(error_response) = serde_json::from_str::<AnthropicErrorResponse>(body) {
            return AnalystError::llm(format!(
                "Anthropic API error: {}",
                error_response.error.message
            ));
        }

        AnalystError::llm(format!("Anthropic API error ({}): {}", status, body))
    }

    /// Posts a request and returns the raw response body.
    async fn post_request(&self, request: &AnthropicRequest) -> Result<String> {
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalystError::llm("Request timed out. Try again.")
                } else if e.is_connect() {
                    AnalystError::llm("Failed to connect to Anthropic API. Check your network.")
                } else {
                    AnalystError::llm(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalystError::llm(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Self::parse_error(status, &body));
        }

        Ok(body)
    }

    /// Parses a response body into an LlmResponse.
    fn parse_response(body: &str) -> Result<LlmResponse> {
        let response: AnthropicResponse = serde_json::from_str(body)
            .map_err(|e| AnalystError::llm(format!("Failed to parse response: {}", e)))?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block.content_type.as_str() {
                "text" => content.push_str(&block.text),
                "tool_use" => {
                    let arguments = serde_json::to_string(&block.input)
                        .map_err(|e| AnalystError::llm(format!("Invalid tool input: {}", e)))?;
                    tool_calls.push(ToolCall {
                        id: block.id,
                        name: block.name,
                        arguments,
                    });
                }
                _ => {}
            }
        }

        Ok(LlmResponse {
            content,
            tool_calls,
        })
    }

    fn base_request(&self, system: Option<String>, messages: Vec<AnthropicMessage>) -> AnthropicRequest {
        AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system,
            messages,
            stream: false,
            tools: None,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let (system, converted) = Self::convert_messages(messages);
        let request = self.base_request(system, converted);

        let body = self.post_request(&request).await?;
        let response = Self::parse_response(&body)?;

        if response.content.is_empty() {
            return Err(AnalystError::llm("No response from Anthropic"));
        }
        Ok(response.content)
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
    ) -> Result<BoxStream<'static, Result<String>>> {
        let (system, converted) = Self::convert_messages(messages);
        let mut request = self.base_request(system, converted);
        request.stream = true;

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalystError::llm("Request timed out. Try again.")
                } else {
                    AnalystError::llm(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Self::parse_error(status, &body));
        }

        let stream = response.bytes_stream();

        let parsed_stream = stream
            .map(|chunk| {
                chunk
                    .map_err(|e| AnalystError::llm(format!("Stream error: {}", e)))
                    .and_then(|bytes| {
                        let text = String::from_utf8_lossy(&bytes);
                        parse_sse_chunk(&text)
                    })
            })
            .filter_map(|result| async move {
                match result {
                    Ok(Some(content)) => Some(Ok(content)),
                    Ok(None) => None,
                    Err(e) => Some(Err(e)),
                }
            });

        Ok(parsed_stream.boxed())
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        let (system, converted) = Self::convert_messages(messages);
        let mut request = self.base_request(system, converted);
        request.tools = Some(Self::convert_tools(tools));

        let body = self.post_request(&request).await?;
        Self::parse_response(&body)
    }

    async fn continue_with_tool_results(
        &self,
        messages: &[Message],
        exchanges: &[ToolExchange],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        let (system, converted) = Self::continuation_messages(messages, exchanges)?;

        let mut request = self.base_request(system, converted);
        request.tools = Some(Self::convert_tools(tools));

        let body = self.post_request(&request).await?;
        Self::parse_response(&body)
    }
}

/// Parses a Server-Sent Events chunk from the Anthropic streaming API.
fn parse_sse_chunk(chunk: &str) -> Result<Option<String>> {
    let mut content = String::new();

    for line in chunk.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        if let Some(data) = line.strip_prefix("data: ") {
            if let Ok(event) = serde_json::from_str::<AnthropicStreamEvent>(data) {
                match event.event_type.as_str() {
                    "content_block_delta" => {
                        if let Some(delta) = event.delta {
                            if delta.delta_type == "text_delta" {
                                if let Some(text) = delta.text {
                                    content.push_str(&text);
                                }
                            }
                        }
                    }
                    "message_stop" => {
                        return Ok(if content.is_empty() {
                            None
                        } else {
                            Some(content)
                        });
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(if content.is_empty() {
        None
    } else {
        Some(content)
    })
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    input: Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicStreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    delta: Option<AnthropicDelta>,
}

#[derive(Debug, Deserialize)]
struct AnthropicDelta {
    #[serde(rename = "type")]
    delta_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_new() {
        let config = AnthropicConfig::new("sk-ant-test", "claude-3-5-sonnet-latest");
        assert_eq!(config.api_key, "sk-ant-test");
        assert_eq!(config.model, "claude-3-5-sonnet-latest");
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_config_builders() {
        let config = AnthropicConfig::new("sk-ant-test", "claude-3-5-sonnet-latest")
            .with_timeout(60)
            .with_max_tokens(8192);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.max_tokens, 8192);
    }

    #[test]
    fn test_convert_messages() {
        let messages = vec![
            Message::system("You are a router."),
            Message::user("Hello"),
            Message::assistant("Hi!"),
        ];

        let (system, converted) = AnthropicClient::convert_messages(&messages);

        assert_eq!(system, Some("You are a router.".to_string()));
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[1].role, "assistant");
    }

    #[test]
    fn test_convert_messages_no_system() {
        let messages = vec![Message::user("Hello")];
        let (system, converted) = AnthropicClient::convert_messages(&messages);
        assert_eq!(system, None);
        assert_eq!(converted.len(), 1);
    }

    #[test]
    fn test_continuation_messages_keep_every_round() {
        let messages = vec![Message::system("Answer with SQL."), Message::user("Count rows")];
        let exchanges: Vec<ToolExchange> = (1..=2)
            .map(|i| ToolExchange {
                calls: vec![ToolCall {
                    id: format!("toolu_{}", i),
                    name: "run_postgres_query".to_string(),
                    arguments: format!("{{\"sql\":\"SELECT {}\"}}", i),
                }],
                results: vec![crate::llm::types::ToolResult {
                    tool_call_id: format!("toolu_{}", i),
                    content: format!("{{\"row_count\":{}}}", i),
                }],
            })
            .collect();

        let (system, converted) =
            AnthropicClient::continuation_messages(&messages, &exchanges).unwrap();

        assert_eq!(system, Some("Answer with SQL.".to_string()));
        // user, then tool_use/tool_result pairs for both rounds in order
        assert_eq!(converted.len(), 5);
        assert_eq!(converted[1].role, "assistant");
        assert_eq!(converted[2].role, "user");
        assert!(converted[2].content.to_string().contains("toolu_1"));
        assert_eq!(converted[3].role, "assistant");
        assert_eq!(converted[4].role, "user");
        assert!(converted[4].content.to_string().contains("toolu_2"));
    }

    #[test]
    fn test_parse_response_tool_use() {
        let body = r#"{
            "content": [
                {"type": "text", "text": ""},
                {"type": "tool_use", "id": "toolu_1", "name": "run_postgres_query",
                 "input": {"sql": "SELECT 1"}}
            ]
        }"#;

        let response = AnthropicClient::parse_response(body).unwrap();
        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls[0].name, "run_postgres_query");
        assert!(response.tool_calls[0].arguments.contains("SELECT 1"));
    }

    #[test]
    fn test_parse_response_text() {
        let body = r#"{"content":[{"type":"text","text":"ROUTE: GENERAL"}]}"#;
        let response = AnthropicClient::parse_response(body).unwrap();
        assert_eq!(response.content, "ROUTE: GENERAL");
    }

    #[test]
    fn test_parse_error_unauthorized() {
        let error = AnthropicClient::parse_error(reqwest::StatusCode::UNAUTHORIZED, "");
        assert!(error.to_string().contains("Authentication failed"));
    }

    #[test]
    fn test_parse_error_with_message() {
        let body = r#"{"error":{"message":"Invalid API key"}}"#;
        let error = AnthropicClient::parse_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert!(error.to_string().contains("Invalid API key"));
    }

    #[test]
    fn test_parse_sse_content_delta() {
        let chunk =
            r#"data: {"type":"content_block_delta","delta":{"type":"text_delta","text":"Hello"}}"#;
        let result = parse_sse_chunk(chunk).unwrap();
        assert_eq!(result, Some("Hello".to_string()));
    }

    #[test]
    fn test_parse_sse_message_stop() {
        let chunk = r#"data: {"type":"message_stop"}"#;
        let result = parse_sse_chunk(chunk).unwrap();
        assert_eq!(result, None);
    }
}
