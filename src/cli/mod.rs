//! CLI module - command-line interface
//!
//! Contains the REPL and command parsing.

pub mod commands;
pub mod repl;

pub use repl::{answer_prompt, Repl, FAILURE_NOTICE};
