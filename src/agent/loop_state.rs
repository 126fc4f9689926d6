//! Turn state management
//!
//! Tracks where a turn sits in the reason/invoke cycle and how many tool
//! round trips it has used.

use std::fmt;

use crate::core::Message;

/// State of the orchestration graph within one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    /// Waiting on the reasoning step
    Reasoning,
    /// Running the tool calls requested by the last assistant message
    InvokingTool,
    /// The turn produced its answer
    Done,
}

impl GraphState {
    /// State entered after the reasoning step returned `message`
    pub fn after_reasoning(message: &Message) -> Self {
        if message.tool_calls().is_empty() {
            GraphState::Done
        } else {
            GraphState::InvokingTool
        }
    }
}

impl fmt::Display for GraphState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphState::Reasoning => write!(f, "reasoning"),
            GraphState::InvokingTool => write!(f, "invoking_tool"),
            GraphState::Done => write!(f, "done"),
        }
    }
}

/// Progress of one turn
#[derive(Debug, Clone)]
pub struct TurnState {
    /// Current graph state
    pub state: GraphState,
    /// Completed reasoning/tool round trips
    pub round_trips: usize,
    /// Maximum allowed round trips
    pub max_round_trips: usize,
}

impl TurnState {
    /// Create a new turn state with the given cap
    pub fn new(max_round_trips: usize) -> Self {
        Self {
            state: GraphState::Reasoning,
            round_trips: 0,
            max_round_trips,
        }
    }

    /// Whether another batch of tool calls fits within the cap
    pub fn can_invoke_tools(&self) -> bool {
        self.round_trips < self.max_round_trips
    }

    /// Record a finished tool batch and return to reasoning
    pub fn finish_round_trip(&mut self) {
        self.round_trips += 1;
        self.state = GraphState::Reasoning;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ToolCall;

    #[test]
    fn test_turn_state_new() {
        let state = TurnState::new(10);
        assert_eq!(state.state, GraphState::Reasoning);
        assert_eq!(state.round_trips, 0);
    }

    #[test]
    fn test_round_trip_cap() {
        let mut state = TurnState::new(2);
        assert!(state.can_invoke_tools());

        state.finish_round_trip();
        assert!(state.can_invoke_tools());

        state.finish_round_trip();
        assert!(!state.can_invoke_tools());
        assert_eq!(state.state, GraphState::Reasoning);
    }

    #[test]
    fn test_transition_after_reasoning() {
        let call = ToolCall::new("c1", "search", serde_json::json!({"query": "q"}));
        assert_eq!(
            GraphState::after_reasoning(&Message::tool_request(vec![call])),
            GraphState::InvokingTool
        );
        assert_eq!(
            GraphState::after_reasoning(&Message::assistant("done")),
            GraphState::Done
        );
    }
}
