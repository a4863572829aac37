pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use crate::config::ReportConfig;
use crate::llm::LlmClient;

pub use prompt::ReportContext;

/// Turns today's context into an HTML digest via the configured model.
pub struct ReportGenerator {
    llm: Arc<dyn LlmClient>,
    max_retries: u32,
    initial_backoff: Duration,
}

impl ReportGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, config: &ReportConfig) -> Self {
        Self {
            llm,
            max_retries: config.max_retries,
            initial_backoff: Duration::from_secs(config.initial_backoff_secs),
        }
    }

    /// Returns `None` on any failure. Rate-limit errors are retried with
    /// exponential backoff (4s, 8s, 16s by default); other errors are not.
    pub async fn generate(&self, ctx: &ReportContext) -> Option<String> {
        let prompt = prompt::build(ctx);
        let mut attempt = 0;

        loop {
            match self.llm.generate(&prompt).await {
                Ok(text) => {
                    let html = strip_code_fences(&text);
                    if html.trim().is_empty() {
                        tracing::error!("Model returned an empty report");
                        return None;
                    }
                    tracing::info!("Report generated ({} bytes)", html.len());
                    return Some(html);
                }
                Err(e) if e.is_rate_limit() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        "API quota hit. Retrying in {}s (attempt {attempt}/{})",
                        delay.as_secs(),
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!("Report generation failed: {e}");
                    if e.is_rate_limit() {
                        tracing::error!(
                            "Quota still exhausted after {} retries. A new key on the same \
                             project shares the quota; enable billing or use another project.",
                            self.max_retries
                        );
                    }
                    return None;
                }
            }
        }
    }

    /// Wait before retry number `attempt` (1-based). Saturates instead of overflowing.
    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Remove markdown code fences (```` ```html ```` and ```` ``` ````) wherever the model put them.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```html", "").replace("```", "").trim().to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::llm::{LlmClient, LlmError};

    /// Replays a fixed sequence of responses and records the prompts it saw.
    pub struct ScriptedLlm {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    pub fn rate_limited() -> LlmError {
        LlmError::RateLimited {
            status: 429,
            message: "Quota exceeded".into(),
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::Empty))
        }

        async fn list_models(&self) -> Result<Vec<String>, LlmError> {
            Ok(vec!["scripted".into()])
        }
    }
}
