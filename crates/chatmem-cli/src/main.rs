//! chatmem CLI — entry point.
//!
//! # Commands
//!
//! - `chatmem create|add|history|summary|clear|delete|sessions` — manage memory sessions
//! - `chatmem chat [-m MESSAGE] [-s SESSION]` — chat with memory (single-shot or REPL)
//! - `chatmem onboard` — initialize config + data directories
//! - `chatmem status` — show configuration and provider status

mod chat;
mod helpers;
mod memory_cmd;
mod onboard;
mod repl;
mod status;
mod workspace;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use chatmem_core::config::load_config;

use crate::chat::ChatSession;
use crate::workspace::Workspace;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// 🧠 chatmem — per-session conversation memory for LLM chat
#[derive(Parser)]
#[command(name = "chatmem", version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true, default_value_t = false)]
    logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Memory(memory_cmd::MemoryCommands),

    /// Chat with memory (single-shot or interactive REPL)
    Chat {
        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long)]
        message: Option<String>,

        /// Session identifier
        #[arg(short, long, default_value = "cli:default")]
        session: String,
    },

    /// Initialize configuration and data directories
    Onboard,

    /// Show configuration and provider status
    Status,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.logs);

    match cli.command {
        Commands::Memory(cmd) => {
            let ws = Workspace::open(load_config(None))?;
            memory_cmd::dispatch(&ws, cmd).await
        }
        Commands::Chat { message, session } => run_chat(message, &session).await,
        Commands::Onboard => onboard::run(),
        Commands::Status => status::run(),
    }
}

// ─────────────────────────────────────────────
// Chat command
// ─────────────────────────────────────────────

async fn run_chat(message: Option<String>, session_id: &str) -> Result<()> {
    let ws = Workspace::open(load_config(None))?;
    let chat = ChatSession::open(&ws, session_id)?;

    match message {
        Some(msg) => {
            // Single-shot mode
            info!(session = %session_id, "processing single message");
            let response = chat.turn(&msg).await.context("chat turn failed")?;
            helpers::print_response(&response);
        }
        None => {
            // Interactive REPL mode
            repl::run(chat).await?;
        }
    }

    Ok(())
}

/// Initialize tracing/logging. `RUST_LOG` wins when set.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("chatmem=debug,info")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
