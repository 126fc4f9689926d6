//! Conversation graph
//!
//! The turn state machine: `Reasoning` either finishes the turn (`Done`) or
//! hands a batch of tool calls to `InvokingTool`, which always returns to
//! `Reasoning`. Every step is checkpointed to the thread's store before the
//! corresponding event is yielded.

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

use crate::agent::locks::ThreadLocks;
use crate::agent::loop_state::{GraphState, TurnState};
use crate::agent::reasoning::ReasoningStep;
use crate::agent::recovery;
use crate::core::{Config, Message, Result, ThreadId, ToolCall, ToolDefinition, TwinError};
use crate::llm::{LLMProvider, OpenAiClient};
use crate::store::{self, CheckpointStore};
use crate::tools::ToolRegistry;

/// Snapshot yielded after each completed transition
#[derive(Debug, Clone)]
pub struct GraphEvent {
    /// State the graph moved into
    pub state: GraphState,
    /// Full accumulated thread history at this point
    pub history: Vec<Message>,
    /// Tool round trips completed so far in this turn
    pub round_trips: usize,
}

impl GraphEvent {
    /// User-visible text carried by the newest message, if any
    pub fn answer(&self) -> Option<&str> {
        self.history.last().and_then(Message::answer)
    }
}

/// Result of a fully driven turn
#[derive(Debug, Clone, Default)]
pub struct TurnOutput {
    /// Assistant answers in emission order (normally exactly one)
    pub answers: Vec<String>,
    /// Thread history after the turn
    pub history: Vec<Message>,
    /// Tool round trips used
    pub round_trips: usize,
}

/// Lazy stream of graph events for one turn
pub type TurnStream<'a> = BoxStream<'a, Result<GraphEvent>>;

/// Orchestrates reasoning and tool calls over persisted threads
pub struct ConversationGraph {
    store: Arc<dyn CheckpointStore>,
    reasoning: ReasoningStep,
    tools: Arc<ToolRegistry>,
    directive: Option<String>,
    max_round_trips: usize,
    locks: ThreadLocks,
}

impl ConversationGraph {
    /// Create a graph with no directive and the default cap of 10 round trips
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        reasoning: ReasoningStep,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            store,
            reasoning,
            tools,
            directive: None,
            max_round_trips: 10,
            locks: ThreadLocks::new(),
        }
    }

    /// Build the production graph: OpenAI-compatible model, configured
    /// search tool, and configured checkpoint backend
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider: Arc<dyn LLMProvider> = Arc::new(OpenAiClient::from_config(&config.llm)?);
        let tools = Arc::new(ToolRegistry::from_config(&config.search)?);
        let store = store::open(&config.store)?;
        Self::with_parts(config, provider, tools, store)
    }

    /// Build a graph from configuration around explicit collaborators
    pub fn with_parts(
        config: &Config,
        provider: Arc<dyn LLMProvider>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<Self> {
        config.validate()?;
        let reasoning = ReasoningStep::from_config(provider, config);
        Ok(Self::new(store, reasoning, tools)
            .with_directive(config.agent.directive()?)
            .with_max_round_trips(config.agent.max_round_trips))
    }

    /// System directive inserted once at the head of every new thread
    pub fn with_directive(mut self, directive: Option<String>) -> Self {
        self.directive = directive;
        self
    }

    pub fn with_max_round_trips(mut self, max: usize) -> Self {
        self.max_round_trips = max.max(1);
        self
    }

    pub fn max_round_trips(&self) -> usize {
        self.max_round_trips
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Persisted history of a thread
    pub async fn history(&self, thread: &ThreadId) -> Result<Vec<Message>> {
        self.store.load(thread).await
    }

    /// Known threads in the backing store
    pub async fn threads(&self) -> Result<Vec<ThreadId>> {
        self.store.threads().await
    }

    /// Start a turn for `input` on `thread`
    ///
    /// Nothing happens until the stream is polled. Each item is the state
    /// after one transition; the stream ends after `Done` or after the first
    /// error. Dropping it cancels the turn without leaving a partial tool
    /// batch behind.
    pub fn stream_turn<'a>(&'a self, thread: &ThreadId, input: &str) -> TurnStream<'a> {
        let turn = Turn {
            graph: self,
            thread: thread.clone(),
            input: Some(input.to_string()),
            history: Vec::new(),
            tools: self.tools.definitions(),
            state: TurnState::new(self.max_round_trips),
            guard: None,
        };

        stream::try_unfold(turn, |mut turn| async move {
            let event = turn.step().await?;
            Ok::<_, TwinError>(event.map(|event| (event, turn)))
        })
        .boxed()
    }

    /// Drive a turn to completion and collect the visible answers
    pub async fn run_turn(&self, thread: &ThreadId, input: &str) -> Result<TurnOutput> {
        let mut output = TurnOutput::default();
        let mut events = self.stream_turn(thread, input);

        while let Some(event) = events.try_next().await? {
            if let Some(answer) = event.answer() {
                output.answers.push(answer.to_string());
            }
            output.round_trips = event.round_trips;
            output.history = event.history;
        }

        Ok(output)
    }

    /// Resume a thread without a new human message
    ///
    /// A turn only starts on a new human message, so this reports the
    /// persisted history and produces nothing new.
    pub async fn resume(&self, thread: &ThreadId) -> Result<TurnOutput> {
        let _guard = self.locks.acquire(thread).await;
        Ok(TurnOutput {
            answers: Vec::new(),
            history: self.store.load(thread).await?,
            round_trips: 0,
        })
    }
}

/// Mutable state of one in-flight turn
struct Turn<'a> {
    graph: &'a ConversationGraph,
    thread: ThreadId,
    /// Human message not yet committed; `None` once the turn has begun
    input: Option<String>,
    history: Vec<Message>,
    tools: Vec<ToolDefinition>,
    state: TurnState,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Turn<'_> {
    async fn step(&mut self) -> Result<Option<GraphEvent>> {
        if let Some(input) = self.input.take() {
            self.begin(input).await?;
        }

        match self.state.state {
            GraphState::Reasoning => self.reason().await.map(Some),
            GraphState::InvokingTool => self.invoke_tools().await.map(Some),
            GraphState::Done => {
                self.guard = None;
                Ok(None)
            }
        }
    }

    /// Lock the thread, load its checkpoint, and commit the opening batch:
    /// the directive for a new thread, closures for interrupted calls, and
    /// the human message
    async fn begin(&mut self, input: String) -> Result<()> {
        self.guard = Some(self.graph.locks.acquire(&self.thread).await);
        self.history = self.graph.store.load(&self.thread).await?;

        let mut opening = Vec::new();
        if self.history.is_empty() {
            if let Some(ref directive) = self.graph.directive {
                opening.push(Message::system(directive.clone()));
            }
        }

        let closing = recovery::closing_messages(&self.history);
        if !closing.is_empty() {
            tracing::warn!(
                thread = %self.thread,
                calls = closing.len(),
                "closing tool calls from an interrupted turn"
            );
        }
        opening.extend(closing);
        opening.push(Message::human(input));

        tracing::info!(thread = %self.thread, history = self.history.len(), "turn started");
        self.commit(opening).await
    }

    async fn reason(&mut self) -> Result<GraphEvent> {
        let message = self.graph.reasoning.infer(&self.history, &self.tools).await?;
        let next = GraphState::after_reasoning(&message);

        if next == GraphState::InvokingTool && !self.state.can_invoke_tools() {
            tracing::warn!(
                thread = %self.thread,
                max = self.state.max_round_trips,
                "tool round-trip limit reached"
            );
            return Err(TwinError::LoopLimitExceeded(self.state.max_round_trips));
        }

        self.commit(vec![message]).await?;
        self.state.state = next;

        if next == GraphState::Done {
            tracing::info!(
                thread = %self.thread,
                round_trips = self.state.round_trips,
                "turn complete"
            );
        }
        Ok(self.event())
    }

    async fn invoke_tools(&mut self) -> Result<GraphEvent> {
        let calls: Vec<ToolCall> = self
            .history
            .last()
            .map(|m| m.tool_calls().to_vec())
            .unwrap_or_default();

        tracing::info!(thread = %self.thread, calls = calls.len(), "invoking tools");

        let tools = &self.graph.tools;
        let results = futures::future::join_all(calls.iter().map(|call| invoke_one(tools, call)))
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        self.commit(results).await?;
        self.state.finish_round_trip();
        Ok(self.event())
    }

    async fn commit(&mut self, messages: Vec<Message>) -> Result<()> {
        self.graph.store.append(&self.thread, &messages).await?;
        self.history.extend(messages);
        Ok(())
    }

    fn event(&self) -> GraphEvent {
        GraphEvent {
            state: self.state.state,
            history: self.history.clone(),
            round_trips: self.state.round_trips,
        }
    }
}

/// Run one tool call; recoverable failures become the tool message content
async fn invoke_one(tools: &ToolRegistry, call: &ToolCall) -> Result<Message> {
    match tools.invoke(&call.name, &call.arguments).await {
        Ok(snippets) => Ok(Message::tool_result(call, ToolRegistry::render(&snippets)?)),
        Err(e) if e.is_recoverable_tool_error() => {
            tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "tool call failed");
            Ok(Message::tool_result(call, format!("Error: {}", e)))
        }
        Err(e) => Err(e),
    }
}
