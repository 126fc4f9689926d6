//! Recovery of interrupted turns
//!
//! A turn cancelled between committing an assistant tool-call batch and
//! committing its results leaves calls without answers. Completion APIs
//! reject such histories, so the next turn closes them first.

use std::collections::HashSet;

use crate::core::{Message, ToolCall};

/// Content of the tool message that closes an interrupted call
pub const INTERRUPTED_NOTICE: &str =
    "Error: this tool call was interrupted before it completed. No result is available.";

/// Tool calls of the last assistant message that never received a result
pub fn unanswered_calls(history: &[Message]) -> Vec<&ToolCall> {
    let Some(position) = history
        .iter()
        .rposition(|m| matches!(m, Message::Assistant { .. }))
    else {
        return Vec::new();
    };

    let answered: HashSet<&str> = history[position + 1..]
        .iter()
        .filter_map(|m| match m {
            Message::Tool { call_id, .. } => Some(call_id.as_str()),
            _ => None,
        })
        .collect();

    history[position]
        .tool_calls()
        .iter()
        .filter(|call| !answered.contains(call.id.as_str()))
        .collect()
}

/// Tool messages that close every unanswered call, in request order
pub fn closing_messages(history: &[Message]) -> Vec<Message> {
    unanswered_calls(history)
        .into_iter()
        .map(|call| Message::tool_result(call, INTERRUPTED_NOTICE))
        .collect()
}
