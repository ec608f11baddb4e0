//! Per-message orchestration.
//!
//! One strictly sequential state machine per incoming message: route,
//! then either stream the general agent live or run the buffered SQL
//! flow (generate, execute via tool, extract, summarize). No two agent
//! invocations run concurrently within one message.

use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::agent::extract::{
    detect_route, extract_result_json, extract_sql, row_count_preview, Route,
};
use crate::agent::pool::AgentPool;
use crate::agent::prompts::{sql_instruction, summary_prompt};
use crate::agent::sink::ChatSink;
use crate::db::DatabaseClient;
use crate::error::Result;
use crate::llm::{Conversation, LlmClient, Message, ToolExchange, ToolResult};
use crate::query::QueryExecutor;

/// Upper bound on tool-call rounds within one SQL agent invocation.
const MAX_TOOL_ROUNDS: usize = 4;

/// Marker the SQL extraction picks up when the `SQL:` line is empty.
const EMPTY_SQL_SENTINEL: &str = "RESULT_JSON: {}";

/// Drives the four agents for one chat session.
pub struct Orchestrator<C: DatabaseClient> {
    pool: AgentPool,
    executor: QueryExecutor<C>,
    general_history: Conversation,
    cancel: CancellationToken,
}

impl<C: DatabaseClient> Orchestrator<C> {
    /// Creates an orchestrator sharing one model client across all agents.
    pub fn new(llm: Arc<dyn LlmClient>, executor: QueryExecutor<C>) -> Self {
        Self {
            pool: AgentPool::new(llm),
            executor,
            general_history: Conversation::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Returns a handle used to cancel in-flight message handling on shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Handles one user message end to end.
    pub async fn handle_message(
        &mut self,
        user_message: &str,
        sink: &mut dyn ChatSink,
    ) -> Result<()> {
        let route = self.route(user_message).await?;
        info!("Routed message to {:?}", route);

        if self.cancel.is_cancelled() {
            debug!("Cancelled after routing");
            return Ok(());
        }

        match route {
            Route::General => self.run_general(user_message, sink).await,
            Route::Sql => self.run_sql_flow(user_message, sink).await,
        }
    }

    /// Step 0: classify the message. Accumulates the routed stream and
    /// falls back to GENERAL on anything unexpected.
    async fn route(&self, user_message: &str) -> Result<Route> {
        let messages = self.pool.router.messages(user_message);
        let route_text = self.collect_stream(&messages).await?;
        Ok(detect_route(route_text.trim()))
    }

    /// GENERAL branch: forward tokens live, finalize on completion.
    async fn run_general(&mut self, user_message: &str, sink: &mut dyn ChatSink) -> Result<()> {
        self.general_history.add_user(user_message);

        let mut messages = vec![Message::system(self.pool.general.system_prompt)];
        messages.extend_from_slice(self.general_history.messages());

        let mut stream = self.pool.llm().complete_stream(&messages).await?;
        let mut response_text = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            sink.stream_token(&chunk).await?;
            response_text.push_str(&chunk);
        }
        sink.finish_stream().await?;

        self.general_history.add_assistant(response_text);
        Ok(())
    }

    /// SQL branch: buffered generation with tool execution, then the
    /// SQL echo, the row-count preview and the summary as block messages.
    async fn run_sql_flow(&mut self, user_message: &str, sink: &mut dyn ChatSink) -> Result<()> {
        let tools = self.pool.sql.tools();
        let messages = self.pool.sql.messages(sql_instruction(user_message));

        let mut response = self.pool.llm().complete_with_tools(&messages, tools).await?;

        // Every completed round rides along on the next continuation so
        // the model keeps the full call history.
        let mut exchanges: Vec<ToolExchange> = Vec::new();
        while response.has_tool_calls() && exchanges.len() < MAX_TOOL_ROUNDS {
            let calls = std::mem::take(&mut response.tool_calls);
            debug!(
                "Tool round {} with {} call(s)",
                exchanges.len() + 1,
                calls.len()
            );

            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                let content = self.executor.run_tool(&call.arguments).await;
                results.push(ToolResult {
                    tool_call_id: call.id.clone(),
                    content,
                });
            }
            exchanges.push(ToolExchange { calls, results });

            response = self
                .pool
                .llm()
                .continue_with_tool_results(&messages, &exchanges, tools)
                .await?;
        }

        let agent_output = response.content.trim().to_string();
        let generated_sql = extract_sql(&agent_output);
        let results_json = extract_result_json(&agent_output);

        if !generated_sql.is_empty() && generated_sql != EMPTY_SQL_SENTINEL {
            sink.send(&format!("Generated SQL:\n{generated_sql}")).await?;
        }

        if let Some(meta) = row_count_preview(&results_json) {
            sink.send(&format!("Executed query. {meta}")).await?;
        }

        if self.cancel.is_cancelled() {
            debug!("Cancelled before summarization");
            return Ok(());
        }

        let summary_messages = self
            .pool
            .summarizer
            .messages(summary_prompt(user_message, &generated_sql, &results_json));
        let summary_text = self.collect_stream(&summary_messages).await?;
        sink.send(summary_text.trim()).await?;

        Ok(())
    }

    /// Accumulates a full streamed completion into one string.
    async fn collect_stream(&self, messages: &[Message]) -> Result<String> {
        let mut stream = self.pool.llm().complete_stream(messages).await?;
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            text.push_str(&chunk?);
        }
        Ok(text)
    }
}
