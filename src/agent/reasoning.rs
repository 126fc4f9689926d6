//! Reasoning step
//!
//! Wraps one completion call: given the thread history and the available
//! tools, produce exactly one assistant message carrying either an answer
//! or a batch of tool calls.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::core::{Config, Message, Result, ToolDefinition, TwinError};
use crate::llm::{GenerateOptions, LLMProvider};

pub struct ReasoningStep {
    provider: Arc<dyn LLMProvider>,
    options: GenerateOptions,
    max_retries: u32,
    timeout: Option<Duration>,
    retry_delay: Duration,
    prompt_version: Option<String>,
    response_language: Option<String>,
}

impl ReasoningStep {
    /// Create a step with temperature pinned to 0 and two retries
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            options: GenerateOptions {
                temperature: Some(0.0),
                max_tokens: None,
            },
            max_retries: 2,
            timeout: None,
            retry_delay: Duration::from_millis(500),
            prompt_version: None,
            response_language: None,
        }
    }

    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &Config) -> Self {
        let mut step = Self::new(provider)
            .with_max_retries(config.llm.max_retries)
            .with_timeout(config.llm.timeout());
        step.options.max_tokens = config.llm.max_tokens;
        step.prompt_version = config.agent.prompt_version.clone();
        step.response_language = config.agent.response_language.clone();
        step
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base delay of the exponential backoff between attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_prompt_version(mut self, version: impl Into<String>) -> Self {
        self.prompt_version = Some(version.into());
        self
    }

    /// Force replies into `language` through a per-request note
    pub fn with_response_language(mut self, language: impl Into<String>) -> Self {
        self.response_language = Some(language.into());
        self
    }

    /// Run the completion over `history`
    ///
    /// The caller owns the system directive; this step never inserts it.
    pub async fn infer(&self, history: &[Message], tools: &[ToolDefinition]) -> Result<Message> {
        let span = tracing::info_span!(
            "reasoning",
            provider = self.provider.name(),
            model = self.provider.model(),
            prompt_version = self.prompt_version.as_deref().unwrap_or("unversioned"),
            history = history.len(),
        );
        self.infer_with_retries(history, tools).instrument(span).await
    }

    async fn infer_with_retries(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message> {
        let request = self.build_request(history);
        let mut attempt = 0;

        loop {
            let error = match self.attempt(&request, tools).await {
                Ok(response) => {
                    if let Some(ref usage) = response.usage {
                        tracing::debug!(
                            prompt_tokens = usage.prompt_tokens,
                            completion_tokens = usage.completion_tokens,
                            "completion usage"
                        );
                    }
                    let message = response.into_message();
                    if message.content().is_none() && message.tool_calls().is_empty() {
                        return Err(TwinError::reasoning(
                            "model returned neither content nor tool calls",
                        ));
                    }
                    return Ok(message);
                }
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= self.max_retries {
                tracing::error!(attempts = attempt + 1, error = %error, "reasoning failed");
                return Err(TwinError::reasoning(format!(
                    "gave up after {} attempt(s): {}",
                    attempt + 1,
                    error
                )));
            }

            let delay = self.backoff(attempt);
            tracing::warn!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "completion failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        request: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<crate::llm::LLMResponse> {
        let call = self.provider.chat_with_tools(request, tools, &self.options);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                TwinError::reasoning(format!("timed out after {}s", limit.as_secs_f32()))
            })?,
            None => call.await,
        }
    }

    /// History plus the transient language note, which is never persisted
    fn build_request(&self, history: &[Message]) -> Vec<Message> {
        let mut request = history.to_vec();
        if let Some(ref language) = self.response_language {
            request.push(Message::system(format!(
                "Always reply in {}, whatever language the question is asked in.",
                language
            )));
        }
        request
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.retry_delay.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_ms = (self.retry_delay.as_millis() / 2) as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        base + Duration::from_millis(jitter)
    }
}
