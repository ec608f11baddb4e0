//! Outgoing message sinks.
//!
//! The orchestrator emits messages two ways: token-streamed (GENERAL
//! branch) or as finalized blocks (SQL branch). `ChatSink` abstracts the
//! transport so tests can record instead of printing.

use async_trait::async_trait;
use std::io::Write;

use crate::error::{AnalystError, Result};

/// Destination for outgoing chat messages.
#[async_trait]
pub trait ChatSink: Send {
    /// Appends one streamed token to the in-progress message.
    async fn stream_token(&mut self, token: &str) -> Result<()>;

    /// Finalizes the in-progress streamed message.
    async fn finish_stream(&mut self) -> Result<()>;

    /// Sends a complete message as one block.
    async fn send(&mut self, message: &str) -> Result<()>;
}

/// Sink that writes to stdout, flushing per token so streaming is visible.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChatSink for StdoutSink {
    async fn stream_token(&mut self, token: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(token.as_bytes())
            .and_then(|_| stdout.flush())
            .map_err(|e| AnalystError::internal(format!("Failed to write output: {e}")))
    }

    async fn finish_stream(&mut self) -> Result<()> {
        println!();
        Ok(())
    }

    async fn send(&mut self, message: &str) -> Result<()> {
        println!("{message}");
        println!();
        Ok(())
    }
}

/// One outgoing event observed by a `RecordingSink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Token(String),
    FinishStream,
    Message(String),
}

/// Sink that records events for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All streamed tokens joined into one string.
    pub fn streamed_text(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Token(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// All block messages, in order.
    pub fn messages(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Message(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    async fn stream_token(&mut self, token: &str) -> Result<()> {
        self.events.push(SinkEvent::Token(token.to_string()));
        Ok(())
    }

    async fn finish_stream(&mut self) -> Result<()> {
        self.events.push(SinkEvent::FinishStream);
        Ok(())
    }

    async fn send(&mut self, message: &str) -> Result<()> {
        self.events.push(SinkEvent::Message(message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_sink_collects_events() {
        let mut sink = RecordingSink::new();
        sink.stream_token("Hel").await.unwrap();
        sink.stream_token("lo").await.unwrap();
        sink.finish_stream().await.unwrap();
        sink.send("Done").await.unwrap();

        assert_eq!(sink.streamed_text(), "Hello");
        assert_eq!(sink.messages(), vec!["Done"]);
        assert_eq!(sink.events.len(), 4);
    }
}
