//! Custom error types for the digital twin
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for digital twin operations
#[derive(Error, Debug)]
pub enum TwinError {
    /// The completion capability failed after exhausting retries or timed out
    #[error("Reasoning unavailable: {0}")]
    ReasoningUnavailable(String),

    /// The search capability failed
    #[error("Tool invocation error: {0}")]
    ToolInvocation(String),

    /// A tool call referenced a tool that is not registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Checkpoint store unreadable or unwritable
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The reasoning/tool round-trip cap was hit within one turn
    #[error("Turn exceeded the limit of {0} tool round trips")]
    LoopLimitExceeded(usize),

    /// Completion API errors (non-2xx, malformed payloads)
    #[error("LLM error: {message}")]
    Llm { message: String, retryable: bool },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for digital twin operations
pub type Result<T> = std::result::Result<T, TwinError>;

impl TwinError {
    /// Create a reasoning-unavailable error
    pub fn reasoning(msg: impl Into<String>) -> Self {
        Self::ReasoningUnavailable(msg.into())
    }

    /// Create a tool invocation error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::ToolInvocation(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an LLM error that is worth retrying
    pub fn llm_transient(msg: impl Into<String>) -> Self {
        Self::Llm {
            message: msg.into(),
            retryable: true,
        }
    }

    /// Create an LLM error that will not improve on retry
    pub fn llm_fatal(msg: impl Into<String>) -> Self {
        Self::Llm {
            message: msg.into(),
            retryable: false,
        }
    }

    /// Whether a failed completion call may succeed if attempted again
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Llm { retryable, .. } => *retryable,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::ReasoningUnavailable(_) => true,
            _ => false,
        }
    }

    /// Whether the orchestration graph can turn this error into a tool message
    /// and keep reasoning instead of aborting the turn
    pub fn is_recoverable_tool_error(&self) -> bool {
        matches!(self, Self::ToolInvocation(_) | Self::UnknownTool(_))
    }
}
