//! Digital twin
//!
//! Main entry point for the CLI application.

use clap::Parser;
use digital_twin::core::config::StoreBackend;
use digital_twin::core::ThreadId;
use digital_twin::cli::answer_prompt;
use digital_twin::{Config, ConversationGraph, Repl};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Digital twin - answers questions about a person's career and projects
#[derive(Parser, Debug)]
#[command(name = "twin")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a config file (default: ~/.config/twin/config.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Model used for reasoning
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Conversation thread to continue
    #[arg(long, short = 't')]
    thread: Option<String>,

    /// Persist threads as JSON files in this directory
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Language the assistant should answer in
    #[arg(long, short = 'l')]
    language: Option<String>,

    /// Disable the web search tool
    #[arg(long)]
    no_search: bool,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Write the effective configuration to the default path and exit
    #[arg(long)]
    write_config: bool,

    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _ = dotenvy::dotenv();

    // Build configuration
    let mut config = match args.config {
        Some(ref path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    // Apply CLI overrides
    if let Some(ref model) = args.model {
        config.llm.model = model.clone();
    }

    if let Some(ref dir) = args.store_dir {
        config.store.backend = StoreBackend::File;
        config.store.path = Some(dir.clone());
    }

    if let Some(ref language) = args.language {
        config.agent.response_language = Some(language.clone());
    }

    if args.no_search {
        config.search.enabled = false;
    }

    if args.debug {
        config.agent.debug = true;
    }

    init_logging(config.agent.debug);

    if args.write_config {
        let path = config.save_and_get_path()?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let thread = args
        .thread
        .map(ThreadId::from)
        .unwrap_or_else(ThreadId::generate);
    let graph = ConversationGraph::from_config(&config)?;

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        match answer_prompt(&graph, &thread, &prompt).await {
            Ok(answers) => {
                for answer in answers {
                    println!("{}", answer);
                }
                return Ok(());
            }
            Err(notice) => {
                eprintln!("{}", notice);
                std::process::exit(1);
            }
        }
    }

    // Interactive REPL mode
    let mut repl = Repl::new(graph, config, thread);
    repl.run().await?;

    Ok(())
}

/// Logs go to stderr so answers on stdout stay clean
fn init_logging(debug: bool) {
    let default = if debug {
        "digital_twin=debug"
    } else {
        "digital_twin=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
