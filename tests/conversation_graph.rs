//! Conversation graph tests
//!
//! Drives full turns against scripted models, scripted search, and both
//! checkpoint backends.

use digital_twin::agent::recovery::INTERRUPTED_NOTICE;
use digital_twin::agent::{ConversationGraph, GraphState, ReasoningStep};
use digital_twin::core::{Message, Role, Snippet, ThreadId, ToolCall, TwinError};
use digital_twin::llm::LLMResponse;
use digital_twin::store::{CheckpointStore, FileStore, MemoryStore};
use digital_twin::testing::{FailingStore, ScriptedLlm, ScriptedSearch};
use digital_twin::tools::{ToolRegistry, SEARCH_TOOL};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const DIRECTIVE: &str = "You are Ana's digital twin. Answer as Ana would.";

/// Test harness wiring scripted collaborators into a graph
struct Harness {
    llm: Arc<ScriptedLlm>,
    search: Arc<ScriptedSearch>,
    graph: ConversationGraph,
}

impl Harness {
    fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    fn with_store(store: Arc<dyn CheckpointStore>) -> Self {
        Self::build(Arc::new(ScriptedLlm::new()), store)
    }

    fn build(llm: Arc<ScriptedLlm>, store: Arc<dyn CheckpointStore>) -> Self {
        Self::build_with_search(llm, store, Arc::new(ScriptedSearch::new()))
    }

    fn build_with_search(
        llm: Arc<ScriptedLlm>,
        store: Arc<dyn CheckpointStore>,
        search: Arc<ScriptedSearch>,
    ) -> Self {
        let mut tools = ToolRegistry::new(2, Some(Duration::from_secs(5)));
        tools.register_search(SEARCH_TOOL, search.clone());

        let reasoning = ReasoningStep::new(llm.clone()).with_retry_delay(Duration::ZERO);
        let graph = ConversationGraph::new(store, reasoning, Arc::new(tools))
            .with_directive(Some(DIRECTIVE.to_string()));

        Self { llm, search, graph }
    }

    fn with_cap(mut self, cap: usize) -> Self {
        self.graph = self.graph.with_max_round_trips(cap);
        self
    }
}

fn roles(history: &[Message]) -> Vec<Role> {
    history.iter().map(Message::role).collect()
}

fn feedzai_snippet() -> Snippet {
    Snippet::new(
        "Feedzai",
        "https://feedzai.com",
        "Feedzai builds risk management tools for fraud prevention.",
    )
}

#[tokio::test]
async fn test_direct_answer() {
    let h = Harness::new();
    h.llm.queue_answer("I'm a backend engineer.");
    let thread = ThreadId::from("direct");

    let output = assert_ok!(h.graph.run_turn(&thread, "What do you do?").await);

    assert_eq!(output.answers, vec!["I'm a backend engineer.".to_string()]);
    assert_eq!(
        roles(&output.history),
        vec![Role::System, Role::Human, Role::Ai]
    );
    assert_eq!(output.history[0].content(), Some(DIRECTIVE));
    assert_eq!(output.round_trips, 0);
    assert!(h.search.recorded_queries().is_empty());
}

#[tokio::test]
async fn test_single_search_round_trip() {
    let h = Harness::new();
    h.llm
        .queue_tool_call("call_1", SEARCH_TOOL, json!({"query": "Feedzai"}));
    h.llm.queue_answer("At Feedzai I worked on fraud detection.");
    h.search.queue_snippets(vec![feedzai_snippet()]);
    let thread = ThreadId::from("search");

    let output = assert_ok!(
        h.graph
            .run_turn(&thread, "What did you work on at Feedzai?")
            .await
    );

    assert_eq!(
        roles(&output.history),
        vec![
            Role::System,
            Role::Human,
            Role::Ai,
            Role::Tool,
            Role::Ai
        ]
    );
    assert_eq!(output.answers.len(), 1);
    assert_eq!(output.round_trips, 1);
    assert_eq!(h.search.recorded_queries(), vec!["Feedzai".to_string()]);

    let Message::Tool {
        call_id, content, ..
    } = &output.history[3]
    else {
        panic!("expected tool message");
    };
    assert_eq!(call_id, "call_1");
    assert!(content.contains("fraud prevention"));

    // The second reasoning call sees the tool result
    let requests = h.llm.recorded_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 4);
}

#[tokio::test]
async fn test_tool_failure_is_fed_back() {
    let h = Harness::new();
    h.llm
        .queue_tool_call("call_1", SEARCH_TOOL, json!({"query": "Feedzai"}));
    h.llm.queue_answer("I couldn't look that up, but I can tell you from memory.");
    h.search.queue_error("upstream returned 503");
    let thread = ThreadId::from("tool-error");

    let output = assert_ok!(h.graph.run_turn(&thread, "Tell me about Feedzai").await);

    let tool_content = output.history[3].content().unwrap_or_default();
    assert!(tool_content.starts_with("Error:"));
    assert!(tool_content.contains("upstream returned 503"));
    assert_eq!(output.answers.len(), 1);
}

#[tokio::test]
async fn test_tool_batch_keeps_request_order() {
    let h = Harness::new();
    h.llm.queue(Ok(LLMResponse::tools(vec![
        ToolCall::new("a", SEARCH_TOOL, json!({"query": "Feedzai"})),
        ToolCall::new("b", SEARCH_TOOL, json!({"query": "Talkdesk"})),
    ])));
    h.llm.queue_answer("Feedzai yes, Talkdesk I couldn't check.");
    h.search.queue_snippets(vec![feedzai_snippet()]);
    h.search.queue_error("boom");
    let thread = ThreadId::from("batch");

    let output = assert_ok!(h.graph.run_turn(&thread, "Where have you worked?").await);

    assert_eq!(
        roles(&output.history),
        vec![
            Role::System,
            Role::Human,
            Role::Ai,
            Role::Tool,
            Role::Tool,
            Role::Ai
        ]
    );
    assert_eq!(output.round_trips, 1);

    let results: Vec<(&str, &str)> = output.history[3..5]
        .iter()
        .map(|m| match m {
            Message::Tool {
                call_id, content, ..
            } => (call_id.as_str(), content.as_str()),
            other => panic!("expected tool message, got {:?}", other),
        })
        .collect();
    assert_eq!(results[0].0, "a");
    assert_eq!(results[1].0, "b");
    assert!(!results[0].1.starts_with("Error:"));
    assert!(results[0].1.contains("fraud prevention"));
    assert!(results[1].1.starts_with("Error:"));
    assert!(results[1].1.contains("boom"));
}

#[tokio::test]
async fn test_dropped_stream_leaves_no_partial_batch() {
    let llm = Arc::new(ScriptedLlm::new());
    let search = Arc::new(ScriptedSearch::new().with_delay(Duration::from_secs(60)));
    let h = Harness::build_with_search(llm, Arc::new(MemoryStore::new()), search);
    h.llm
        .queue_tool_call("call_1", SEARCH_TOOL, json!({"query": "Feedzai"}));
    let thread = ThreadId::from("cancelled");

    let mut events = h.graph.stream_turn(&thread, "before");
    let first = assert_ok!(events.next().await.expect("first event"));
    assert_eq!(first.state, GraphState::InvokingTool);

    // The search is still sleeping when the caller gives up
    let pending = tokio::time::timeout(Duration::from_millis(50), events.next()).await;
    assert!(pending.is_err());
    drop(events);

    let history = assert_ok!(h.graph.history(&thread).await);
    assert_eq!(roles(&history), vec![Role::System, Role::Human, Role::Ai]);

    h.llm.queue_answer("after");
    let output = assert_ok!(h.graph.run_turn(&thread, "still there?").await);
    assert_eq!(
        roles(&output.history),
        vec![
            Role::System,
            Role::Human,
            Role::Ai,
            Role::Tool,
            Role::Human,
            Role::Ai
        ]
    );
    assert_eq!(output.history[3].content(), Some(INTERRUPTED_NOTICE));
    assert_eq!(output.answers, vec!["after".to_string()]);
}

#[tokio::test]
async fn test_directive_inserted_once() {
    let h = Harness::new();
    let thread = ThreadId::from("multi");

    for question in ["first", "second", "third"] {
        h.llm.queue_answer(&format!("answer to {}", question));
        assert_ok!(h.graph.run_turn(&thread, question).await);
    }

    let history = assert_ok!(h.graph.history(&thread).await);
    let systems = history.iter().filter(|m| m.is_system()).count();
    assert_eq!(systems, 1);
    assert!(history[0].is_system());
    assert_eq!(history.len(), 7);
}

#[tokio::test]
async fn test_history_only_grows() {
    let h = Harness::new();
    let thread = ThreadId::from("prefix");

    h.llm.queue_answer("one");
    let first = assert_ok!(h.graph.run_turn(&thread, "q1").await).history;

    h.llm
        .queue_tool_call("call_1", SEARCH_TOOL, json!({"query": "q2"}));
    h.llm.queue_answer("two");
    let second = assert_ok!(h.graph.run_turn(&thread, "q2").await).history;

    assert!(second.len() > first.len());
    assert_eq!(&second[..first.len()], &first[..]);

    // The full prior history is sent on the next turn
    let requests = h.llm.recorded_requests();
    assert_eq!(&requests[1].messages[..first.len()], &first[..]);
}

#[tokio::test]
async fn test_loop_limit_aborts_turn() {
    let call = ToolCall::new("call_1", SEARCH_TOOL, json!({"query": "again"}));
    let llm = Arc::new(ScriptedLlm::repeating(LLMResponse::tools(vec![call])));
    let h = Harness::build(llm, Arc::new(MemoryStore::new())).with_cap(2);
    let thread = ThreadId::from("looping");

    let err = assert_err!(h.graph.run_turn(&thread, "loop forever").await);
    assert!(matches!(err, TwinError::LoopLimitExceeded(2)));
    assert_eq!(h.llm.request_count(), 3);

    // The over-limit request is not committed, so no call is left open
    let history = assert_ok!(h.graph.history(&thread).await);
    assert_eq!(
        roles(&history),
        vec![
            Role::System,
            Role::Human,
            Role::Ai,
            Role::Tool,
            Role::Ai,
            Role::Tool
        ]
    );
}

#[tokio::test]
async fn test_reasoning_failure_keeps_human_message() {
    let h = Harness::new();
    h.llm
        .queue_error(TwinError::llm_fatal("invalid api key"));
    let thread = ThreadId::from("unavailable");

    let err = assert_err!(h.graph.run_turn(&thread, "hello?").await);
    assert!(matches!(err, TwinError::ReasoningUnavailable(_)));

    let history = assert_ok!(h.graph.history(&thread).await);
    assert_eq!(roles(&history), vec![Role::System, Role::Human]);

    // The thread stays usable
    h.llm.queue_answer("Hi!");
    let output = assert_ok!(h.graph.run_turn(&thread, "hello again").await);
    assert_eq!(
        roles(&output.history),
        vec![Role::System, Role::Human, Role::Human, Role::Ai]
    );
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let h = Harness::new();
    h.llm
        .queue_error(TwinError::llm_transient("429 Too Many Requests"));
    h.llm.queue_answer("Sorry for the wait.");

    let output = assert_ok!(h.graph.run_turn(&ThreadId::from("retry"), "hi").await);
    assert_eq!(output.answers, vec!["Sorry for the wait.".to_string()]);
    assert_eq!(h.llm.request_count(), 2);
}

#[tokio::test]
async fn test_persistence_failure_aborts_turn() {
    let h = Harness::with_store(Arc::new(FailingStore::failing_after(1)));
    h.llm.queue_answer("never stored");
    let thread = ThreadId::from("flaky-store");

    let err = assert_err!(h.graph.run_turn(&thread, "hello").await);
    assert!(matches!(err, TwinError::Persistence(_)));

    let history = assert_ok!(h.graph.history(&thread).await);
    assert_eq!(roles(&history), vec![Role::System, Role::Human]);
}

#[tokio::test]
async fn test_resume_adds_nothing() {
    let h = Harness::new();
    h.llm.queue_answer("hello");
    let thread = ThreadId::from("resume");
    assert_ok!(h.graph.run_turn(&thread, "hi").await);

    let resumed = assert_ok!(h.graph.resume(&thread).await);
    assert!(resumed.answers.is_empty());
    assert_eq!(resumed.history.len(), 3);
    assert_eq!(h.llm.request_count(), 1);
}

#[tokio::test]
async fn test_interrupted_batch_is_closed() {
    let store = Arc::new(MemoryStore::new());
    let thread = ThreadId::from("interrupted");
    let call = ToolCall::new("call_1", SEARCH_TOOL, json!({"query": "Feedzai"}));
    assert_ok!(
        store
            .append(
                &thread,
                &[
                    Message::system(DIRECTIVE),
                    Message::human("What did you do at Feedzai?"),
                    Message::tool_request(vec![call]),
                ],
            )
            .await
    );

    let h = Harness::with_store(store);
    h.llm.queue_answer("Let me answer directly.");

    let output = assert_ok!(h.graph.run_turn(&thread, "Are you still there?").await);

    assert_eq!(
        roles(&output.history),
        vec![
            Role::System,
            Role::Human,
            Role::Ai,
            Role::Tool,
            Role::Human,
            Role::Ai
        ]
    );
    assert_eq!(output.history[3].content(), Some(INTERRUPTED_NOTICE));
    assert_eq!(
        output.history.iter().filter(|m| m.is_system()).count(),
        1
    );
}

#[tokio::test]
async fn test_concurrent_turns_on_one_thread_serialize() {
    let llm = Arc::new(ScriptedLlm::new().with_delay(Duration::from_millis(20)));
    llm.queue_answer("first answer");
    llm.queue_answer("second answer");
    let h = Harness::build(llm, Arc::new(MemoryStore::new()));
    let thread = ThreadId::from("shared");

    let (a, b) = tokio::join!(
        h.graph.run_turn(&thread, "question a"),
        h.graph.run_turn(&thread, "question b"),
    );
    assert_ok!(a);
    assert_ok!(b);

    let history = assert_ok!(h.graph.history(&thread).await);
    assert_eq!(
        roles(&history),
        vec![
            Role::System,
            Role::Human,
            Role::Ai,
            Role::Human,
            Role::Ai
        ]
    );
}

#[tokio::test]
async fn test_threads_are_isolated() {
    let h = Harness::new();
    h.llm.queue_answer("to alice");
    h.llm.queue_answer("to bob");

    let alice = ThreadId::from("alice");
    let bob = ThreadId::from("bob");
    assert_ok!(h.graph.run_turn(&alice, "hi from alice").await);
    let output = assert_ok!(h.graph.run_turn(&bob, "hi from bob").await);

    assert_eq!(output.history.len(), 3);
    assert_eq!(output.history[1].content(), Some("hi from bob"));

    let mut threads = assert_ok!(h.graph.threads().await);
    threads.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    assert_eq!(threads, vec![alice, bob]);
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let thread = ThreadId::from("persisted");

    {
        let store = Arc::new(assert_ok!(FileStore::open(dir.path())));
        let h = Harness::with_store(store);
        h.llm.queue_answer("first");
        assert_ok!(h.graph.run_turn(&thread, "one").await);
    }

    let store = Arc::new(assert_ok!(FileStore::open(dir.path())));
    let h = Harness::with_store(store);
    h.llm.queue_answer("second");
    let output = assert_ok!(h.graph.run_turn(&thread, "two").await);

    assert_eq!(
        roles(&output.history),
        vec![
            Role::System,
            Role::Human,
            Role::Ai,
            Role::Human,
            Role::Ai
        ]
    );
    // The restarted graph sent the persisted history to the model
    assert_eq!(h.llm.recorded_requests()[0].messages.len(), 4);
}
