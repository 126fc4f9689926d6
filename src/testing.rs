//! Mock implementations for testing
//!
//! These mocks let the graph run end to end without network I/O.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::core::{Message, Result, Snippet, ThreadId, ToolCall, ToolDefinition, TwinError};
use crate::llm::{GenerateOptions, LLMProvider, LLMResponse};
use crate::store::{CheckpointStore, MemoryStore};
use crate::tools::SearchTool;

// ============================================================================
// Scripted LLM
// ============================================================================

/// One recorded completion request
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
}

/// LLM provider that returns queued responses in order
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<LLMResponse>>>,
    /// Returned once the queue is exhausted
    fallback: Option<LLMResponse>,
    delay: Option<Duration>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request with `response` once the queue runs dry
    pub fn repeating(response: LLMResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::default()
        }
    }

    /// Sleep before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a plain answer
    pub fn queue_answer(&self, content: &str) {
        self.queue(Ok(LLMResponse::text(content)));
    }

    /// Queue a single tool call request
    pub fn queue_tool_call(&self, id: &str, name: &str, arguments: serde_json::Value) {
        self.queue(Ok(LLMResponse::tools(vec![ToolCall::new(id, name, arguments)])));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: TwinError) {
        self.queue(Err(error));
    }

    pub fn queue(&self, response: Result<LLMResponse>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &GenerateOptions,
    ) -> Result<LLMResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages: messages.to_vec(),
            tools: tools.to_vec(),
            temperature: options.temperature,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.responses.lock().unwrap().pop_front();
        match (next, &self.fallback) {
            (Some(response), _) => response,
            (None, Some(fallback)) => Ok(fallback.clone()),
            (None, None) => Err(TwinError::llm_fatal("No scripted response queued")),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ============================================================================
// Scripted search
// ============================================================================

/// Search tool that returns queued results and records queries
#[derive(Default)]
pub struct ScriptedSearch {
    results: Mutex<VecDeque<Result<Vec<Snippet>>>>,
    delay: Option<Duration>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_snippets(&self, snippets: Vec<Snippet>) {
        self.results.lock().unwrap().push_back(Ok(snippets));
    }

    pub fn queue_error(&self, message: &str) {
        self.results
            .lock()
            .unwrap()
            .push_back(Err(TwinError::tool(message)));
    }

    pub fn recorded_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchTool for ScriptedSearch {
    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<Snippet>> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ============================================================================
// Failing store
// ============================================================================

/// Store whose appends start failing after a number of successful writes
pub struct FailingStore {
    inner: MemoryStore,
    writes_before_failure: Mutex<usize>,
}

impl FailingStore {
    pub fn failing_after(writes: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            writes_before_failure: Mutex::new(writes),
        }
    }
}

#[async_trait]
impl CheckpointStore for FailingStore {
    async fn load(&self, thread: &ThreadId) -> Result<Vec<Message>> {
        self.inner.load(thread).await
    }

    async fn append(&self, thread: &ThreadId, messages: &[Message]) -> Result<()> {
        {
            let mut remaining = self.writes_before_failure.lock().unwrap();
            if *remaining == 0 {
                return Err(TwinError::persistence("store unavailable"));
            }
            *remaining -= 1;
        }
        self.inner.append(thread, messages).await
    }

    async fn threads(&self) -> Result<Vec<ThreadId>> {
        self.inner.threads().await
    }
}
