//! The four fixed agents and their shared model client.

use std::sync::Arc;

use crate::agent::prompts::{GENERAL_PROMPT, ROUTER_PROMPT, SQL_AGENT_PROMPT, SUMMARIZER_PROMPT};
use crate::llm::{LlmClient, Message, ToolDefinition};
use crate::query::run_postgres_query_tool;

/// A configured LLM-backed responder: a fixed system prompt, an optional
/// tool list and a streaming flag. Stateless across messages.
pub struct Agent {
    pub name: &'static str,
    pub system_prompt: &'static str,
    /// Whether this agent's tokens are forwarded live. Buffered agents
    /// deliver their output as one block.
    pub streaming: bool,
    tools: Vec<ToolDefinition>,
}

impl Agent {
    fn new(name: &'static str, system_prompt: &'static str, streaming: bool) -> Self {
        Self {
            name,
            system_prompt,
            streaming,
            tools: Vec::new(),
        }
    }

    fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// The tools this agent may invoke mid-response.
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Builds a fresh system + user message pair for one invocation.
    pub fn messages(&self, user_content: impl Into<String>) -> Vec<Message> {
        vec![
            Message::system(self.system_prompt),
            Message::user(user_content),
        ]
    }
}

/// The four agents of one chat session, sharing one model client.
///
/// The client is injected at construction, never a global.
pub struct AgentPool {
    llm: Arc<dyn LlmClient>,
    pub router: Agent,
    pub sql: Agent,
    pub summarizer: Agent,
    pub general: Agent,
}

impl AgentPool {
    /// Builds the fixed agent set around a shared client.
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            router: Agent::new("router", ROUTER_PROMPT, false),
            sql: Agent::new("sql_analyst", SQL_AGENT_PROMPT, false)
                .with_tools(vec![run_postgres_query_tool()]),
            summarizer: Agent::new("summarizer", SUMMARIZER_PROMPT, false),
            general: Agent::new("general", GENERAL_PROMPT, true),
        }
    }

    /// The shared model client.
    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }
}
