//! CLI commands
//!
//! Special commands that can be executed in the REPL.

use crate::core::{Message, Result, ThreadId};
use crate::cli::repl::Repl;

/// Result of parsing a command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Continue processing as normal input
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
}

/// Parse and handle special commands
pub async fn handle_command(input: &str, repl: &mut Repl) -> Result<CommandResult> {
    let input = input.trim();
    let Some(command) = input.strip_prefix('/') else {
        return Ok(CommandResult::Continue(input.to_string()));
    };

    let parts: Vec<&str> = command.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd.as_str() {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "new" => {
            let thread = repl.switch_thread(ThreadId::generate());
            Ok(CommandResult::Handled(format!("Started thread {}", thread)))
        }

        "thread" => {
            if args.is_empty() {
                return Ok(CommandResult::Handled(format!(
                    "Current thread: {}",
                    repl.thread()
                )));
            }
            let thread = repl.switch_thread(ThreadId::from(args));
            Ok(CommandResult::Handled(format!("Switched to thread {}", thread)))
        }

        "threads" => {
            let threads = repl.graph().threads().await?;
            if threads.is_empty() {
                return Ok(CommandResult::Handled("No stored threads.".to_string()));
            }
            let current = repl.thread();
            let lines: Vec<String> = threads
                .iter()
                .map(|t| {
                    let marker = if t == current { "*" } else { " " };
                    format!("{} {}", marker, t)
                })
                .collect();
            Ok(CommandResult::Handled(lines.join("\n")))
        }

        "history" => {
            let history = repl.graph().history(repl.thread()).await?;
            Ok(CommandResult::Handled(format_transcript(&history)))
        }

        "status" => {
            let config = repl.config();
            let status = format!(
                "Status:\n\
                 ─────────────────────────────\n\
                 Model:        {}\n\
                 Search:       {}\n\
                 Store:        {:?}\n\
                 Thread:       {}\n\
                 Round trips:  {} max per turn",
                config.llm.model,
                if repl.graph().tools().is_empty() {
                    "disabled"
                } else {
                    "enabled"
                },
                config.store.backend,
                repl.thread(),
                repl.graph().max_round_trips(),
            );
            Ok(CommandResult::Handled(status))
        }

        _ => Ok(CommandResult::Handled(format!(
            "Unknown command: /{}. Type /help for available commands.",
            cmd
        ))),
    }
}

/// Visible transcript: human questions and assistant answers only
pub fn format_transcript(history: &[Message]) -> String {
    let lines: Vec<String> = history
        .iter()
        .filter_map(|m| match m {
            Message::Human { content } => Some(format!("You: {}", content)),
            other => other.answer().map(|a| format!("Assistant: {}", a)),
        })
        .collect();

    if lines.is_empty() {
        "This thread has no messages yet.".to_string()
    } else {
        lines.join("\n\n")
    }
}

/// Generate help text
fn help_text() -> String {
    r#"Commands:
─────────────────────────────────────────────
  /help, /?          Show this help message
  /exit, /quit, /q   Exit
  /new               Start a new conversation thread
  /thread [id]       Show or switch the current thread
  /threads           List stored threads
  /history           Show the current thread's transcript
  /status            Show current configuration

Anything else is sent to the assistant.
─────────────────────────────────────────────"#
        .to_string()
}
