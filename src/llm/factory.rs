//! LLM client factory.
//!
//! Builds the single shared client from the model configuration. All four
//! agents use the same client instance.

use crate::config::ModelConfig;
use crate::error::{AnalystError, Result};
use crate::llm::{
    AnthropicClient, AnthropicConfig, LlmClient, LlmProvider, MockLlmClient, OpenAiClient,
    OpenAiConfig,
};
use std::sync::Arc;

/// Default model per provider when the config names none.
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-latest";

/// Creates an LLM client from the model configuration.
///
/// The API key is resolved in order: the `api_key` config field, then the
/// provider's environment variable (`OPENAI_API_KEY` or `ANTHROPIC_API_KEY`).
pub fn create_client(config: &ModelConfig) -> Result<Arc<dyn LlmClient>> {
    let provider = config.provider()?;

    match provider {
        LlmProvider::OpenAi => {
            let key = resolve_api_key(config, "OPENAI_API_KEY")?;
            let model = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
            let client = OpenAiClient::new(
                OpenAiConfig::new(key, model).with_timeout(config.timeout_secs),
            )?;
            Ok(Arc::new(client))
        }
        LlmProvider::Anthropic => {
            let key = resolve_api_key(config, "ANTHROPIC_API_KEY")?;
            let model = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string());
            let client = AnthropicClient::new(
                AnthropicConfig::new(key, model)
                    .with_timeout(config.timeout_secs)
                    .with_max_tokens(config.max_tokens),
            )?;
            Ok(Arc::new(client))
        }
        LlmProvider::Mock => Ok(Arc::new(MockLlmClient::new())),
    }
}

fn resolve_api_key(config: &ModelConfig, env_var: &str) -> Result<String> {
    config
        .api_key
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .ok_or_else(|| {
            AnalystError::config(format!(
                "No API key configured. Set api_key in the model config or {env_var}."
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(provider: &str, api_key: Option<&str>) -> ModelConfig {
        ModelConfig {
            provider: provider.to_string(),
            api_key: api_key.map(String::from),
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_create_mock_client() {
        let client = create_client(&config_for("mock", None));
        assert!(client.is_ok());
    }

    #[test]
    fn test_create_openai_with_configured_key() {
        let client = create_client(&config_for("openai", Some("sk-test")));
        assert!(client.is_ok());
    }

    #[test]
    fn test_create_anthropic_with_configured_key() {
        let client = create_client(&config_for("anthropic", Some("sk-ant-test")));
        assert!(client.is_ok());
    }

    #[test]
    fn test_create_unknown_provider_fails() {
        let result = create_client(&config_for("cohere", None));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_key_message_names_env_var() {
        let original = std::env::var("OPENAI_API_KEY").ok();
        std::env::remove_var("OPENAI_API_KEY");

        let result = create_client(&config_for("openai", None));
        let Err(e) = result else {
            panic!("expected a missing-key error");
        };
        assert!(e.to_string().contains("OPENAI_API_KEY"));

        if let Some(key) = original {
            std::env::set_var("OPENAI_API_KEY", key);
        }
    }
}
