//! Agent module - orchestration of reasoning and tool calls
//!
//! Contains the conversation graph that drives each turn, the reasoning
//! step it calls into, and the per-thread bookkeeping around them.

pub mod graph;
pub mod locks;
pub mod loop_state;
pub mod reasoning;
pub mod recovery;

pub use graph::{ConversationGraph, GraphEvent, TurnOutput, TurnStream};
pub use locks::ThreadLocks;
pub use loop_state::{GraphState, TurnState};
pub use reasoning::ReasoningStep;
