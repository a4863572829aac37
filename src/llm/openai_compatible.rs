use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{LlmClient, LlmError};
use crate::config::LlmConfig;

/// Generic client for any OpenAI-compatible chat completions API.
///
/// Works with: Google Gemini, OpenAI, MiniMax, OpenRouter, Groq,
/// Together AI, DeepSeek, vLLM, Ollama, LiteLLM, and any other
/// provider that implements the `/chat/completions` endpoint.
pub struct OpenAICompatibleClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

impl OpenAICompatibleClient {
    pub fn new(config: &LlmConfig, base_url: &str) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAICompatibleClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::Empty)
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, body));
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;
        Ok(list
            .data
            .into_iter()
            .map(|m| m.id.trim_start_matches("models/").to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> OpenAICompatibleClient {
        let config = LlmConfig {
            api_key: "test-key".into(),
            model: "gemini-2.0-flash".into(),
            ..LlmConfig::default()
        };
        OpenAICompatibleClient::new(&config, base_url).unwrap()
    }

    #[tokio::test]
    async fn test_generate_sends_prompt_and_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "gemini-2.0-flash",
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "<html></html>"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server.uri()).generate("hello").await.unwrap();
        assert_eq!(text, "<html></html>");
    }

    #[tokio::test]
    async fn test_generate_maps_429_to_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Quota exceeded"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).generate("hello").await.unwrap_err();
        assert!(err.is_rate_limit());
    }

    #[tokio::test]
    async fn test_generate_empty_choices_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = client(&server.uri()).generate("hello").await.unwrap_err();
        assert!(matches!(err, LlmError::Empty));
    }

    #[tokio::test]
    async fn test_list_models_strips_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "models/gemini-2.0-flash"}, {"id": "gemini-2.5-pro"}]
            })))
            .mount(&server)
            .await;

        let models = client(&server.uri()).list_models().await.unwrap();
        assert_eq!(models, vec!["gemini-2.0-flash", "gemini-2.5-pro"]);
    }
}
