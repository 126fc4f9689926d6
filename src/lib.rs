//! Digital Twin - conversational stand-in for a person's professional profile
//!
//! Answers questions about a person's experience and projects by alternating
//! between a language model and a web search tool until the model produces
//! a direct answer. Every conversation thread is checkpointed so it can be
//! continued later.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Provider abstraction with an OpenAI-compatible implementation
//! - **Tools**: Tool registry and the search tool
//! - **Store**: Checkpoint persistence (in-memory or JSON files)
//! - **Agent**: The conversation graph and its reasoning step
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use digital_twin::core::ThreadId;
//! use digital_twin::{Config, ConversationGraph};
//!
//! #[tokio::main]
//! async fn main() -> digital_twin::Result<()> {
//!     let config = Config::load()?;
//!     let graph = ConversationGraph::from_config(&config)?;
//!
//!     let thread = ThreadId::generate();
//!     let output = graph.run_turn(&thread, "What did you build at Feedzai?").await?;
//!     for answer in output.answers {
//!         println!("{}", answer);
//!     }
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod store;
pub mod tools;

#[doc(hidden)]
pub mod testing;

// Re-export commonly used items
pub use agent::ConversationGraph;
pub use cli::Repl;
pub use core::{Config, Result, TwinError};
