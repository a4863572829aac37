pub mod anthropic;
pub mod openai_compatible;

use std::sync::Arc;

use anyhow::Result;
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::LlmConfig;

// --- Errors ---

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited ({status}): {message}")]
    RateLimited { status: u16, message: String },

    #[error("LLM API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to call LLM API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to parse LLM response: {0}")]
    Malformed(String),

    #[error("Empty response from LLM")]
    Empty,
}

impl LlmError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Map a non-success HTTP response to an error. Providers report exhausted
    /// quotas both as 429 and as other statuses whose body names the quota.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS || mentions_quota(&body) {
            Self::RateLimited {
                status: status.as_u16(),
                message: body,
            }
        } else {
            Self::Api {
                status: status.as_u16(),
                message: body,
            }
        }
    }
}

fn mentions_quota(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("quota exceeded") || lower.contains("resource_exhausted")
}

// --- LLM Client trait ---

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Single-turn text generation.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Model ids usable with the configured key.
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;
}

// --- Factory ---

pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(anthropic::AnthropicClient::new(config)?)),
        provider => {
            let base_url = config
                .base_url
                .clone()
                .unwrap_or_else(|| default_base_url(provider).to_string());
            Ok(Arc::new(openai_compatible::OpenAICompatibleClient::new(
                config, &base_url,
            )?))
        }
    }
}

fn default_base_url(provider: &str) -> &str {
    match provider {
        "openai" => "https://api.openai.com/v1",
        "minimax" => "https://api.minimaxi.chat/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "google" => "https://generativelanguage.googleapis.com/v1beta/openai",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        _ => "https://api.openai.com/v1",
    }
}
