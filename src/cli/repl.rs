//! Interactive REPL
//!
//! Provides the main user interaction loop. Only assistant answers are
//! printed; tool traffic stays internal.

use futures::TryStreamExt;
use std::io::{self, BufRead, Write};

use crate::agent::ConversationGraph;
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Config, Result, ThreadId};

/// Shown when a turn aborts; details go to the log
pub const FAILURE_NOTICE: &str =
    "Sorry, I couldn't answer that right now. Please try sending your message again.";

/// Run one non-interactive turn
///
/// Returns the answers, or the user-facing notice when the turn fails. The
/// underlying error is only logged.
pub async fn answer_prompt(
    graph: &ConversationGraph,
    thread: &ThreadId,
    prompt: &str,
) -> std::result::Result<Vec<String>, &'static str> {
    match graph.run_turn(thread, prompt).await {
        Ok(output) => Ok(output.answers),
        Err(e) => {
            tracing::error!(thread = %thread, error = %e, "turn failed");
            Err(FAILURE_NOTICE)
        }
    }
}

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    graph: ConversationGraph,
    config: Config,
    thread: ThreadId,
}

impl Repl {
    /// Create a REPL over `graph`, starting on `thread`
    pub fn new(graph: ConversationGraph, config: Config, thread: ThreadId) -> Self {
        Self {
            graph,
            config,
            thread,
        }
    }

    pub fn graph(&self) -> &ConversationGraph {
        &self.graph
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn thread(&self) -> &ThreadId {
        &self.thread
    }

    /// Make `thread` current and return it
    pub fn switch_thread(&mut self, thread: ThreadId) -> &ThreadId {
        tracing::info!(thread = %thread, "switched thread");
        self.thread = thread;
        &self.thread
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("You: ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            match handle_command(input, self).await {
                Ok(CommandResult::Exit) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(CommandResult::Handled(output)) => {
                    println!("{}\n", output);
                }
                Ok(CommandResult::Continue(message)) => {
                    if let Err(e) = self.ask(&message).await {
                        tracing::error!(thread = %self.thread, error = %e, "turn failed");
                        eprintln!("\n{}\n", FAILURE_NOTICE);
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "command failed");
                    eprintln!("Command error: {}\n", e);
                }
            }
        }

        Ok(())
    }

    /// Send one message and print answers as the graph produces them
    pub async fn ask(&self, message: &str) -> Result<usize> {
        let mut events = self.graph.stream_turn(&self.thread, message);
        let mut printed = 0;

        while let Some(event) = events.try_next().await? {
            if let Some(answer) = event.answer() {
                println!("\nAssistant:\n{}\n", answer);
                printed += 1;
            }
        }

        Ok(printed)
    }

    /// Print the startup banner
    fn print_banner(&self) {
        println!();
        println!("Digital twin. Ask about professional experience and projects.");
        println!("Model:   {}", self.config.llm.model);
        println!("Thread:  {}", self.thread);
        println!();
        println!("Commands: /help, /new, /history, /status, /exit");
        println!("─────────────────────────────────────────────────────────────");
    }
}
