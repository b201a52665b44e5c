//! Memory subcommands:
//! - `chatmem create <SESSION> [--strategy S] [--k K] [--max-recent N]`
//! - `chatmem add <SESSION> <HUMAN> <AI> [--create]`
//! - `chatmem history <SESSION> [--json]`
//! - `chatmem summary <SESSION>`
//! - `chatmem clear <SESSION>`
//! - `chatmem delete <SESSION>`
//! - `chatmem sessions [--json]`

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use chatmem_core::memory::{MemoryParams, SessionInfo};

use crate::helpers;
use crate::workspace::Workspace;

// ─────────────────────────────────────────────
// Subcommand enum
// ─────────────────────────────────────────────

#[derive(Subcommand)]
pub enum MemoryCommands {
    /// Create a memory session
    Create {
        /// Session identifier
        session: String,

        /// buffer, buffer_window, summary or summary_buffer
        #[arg(short, long, default_value = "buffer")]
        strategy: String,

        /// Window size for buffer_window
        #[arg(short, long, allow_negative_numbers = true)]
        k: Option<i64>,

        /// Raw exchanges kept by summary_buffer
        #[arg(long, allow_negative_numbers = true)]
        max_recent: Option<i64>,
    },

    /// Record one human/AI exchange
    Add {
        session: String,
        human: String,
        ai: String,

        /// Create the session with the default strategy if it does not exist
        #[arg(long, default_value_t = false)]
        create: bool,
    },

    /// Show the raw exchanges held for a session
    History {
        session: String,

        /// Print as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show the running summary of a session
    Summary { session: String },

    /// Empty a session, keeping its strategy
    Clear { session: String },

    /// Delete a session
    Delete { session: String },

    /// List sessions
    Sessions {
        /// Print as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

// ─────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────

/// Dispatch a memory subcommand.
pub async fn dispatch(ws: &Workspace, cmd: MemoryCommands) -> Result<()> {
    match cmd {
        MemoryCommands::Create {
            session,
            strategy,
            k,
            max_recent,
        } => {
            let info = create(ws, &session, &strategy, MemoryParams { k, max_recent })?;
            println!(
                "  {} created session '{}' ({})",
                "✓".green(),
                info.id,
                info.strategy
            );
        }
        MemoryCommands::Add {
            session,
            human,
            ai,
            create,
        } => {
            let info = add(ws, &session, &human, &ai, create).await?;
            println!(
                "  {} {} exchange(s) held, summary {} chars",
                "✓".green(),
                info.exchanges,
                info.summary_chars
            );
        }
        MemoryCommands::History { session, json } => {
            let history = ws.memory.history(&session)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else if history.is_empty() {
                println!("{}", "(no exchanges)".dimmed());
            } else {
                println!("{}", helpers::render_history(&history));
            }
        }
        MemoryCommands::Summary { session } => {
            let summary = ws.memory.summary(&session)?;
            if summary.is_empty() {
                println!("{}", "(no summary)".dimmed());
            } else {
                println!("{summary}");
            }
        }
        MemoryCommands::Clear { session } => {
            clear(ws, &session)?;
            println!("  {} cleared session '{}'", "✓".green(), session);
        }
        MemoryCommands::Delete { session } => {
            if delete(ws, &session) {
                println!("  {} deleted session '{}'", "✓".green(), session);
            } else {
                println!("  {} no session named '{}'", "·".dimmed(), session);
            }
        }
        MemoryCommands::Sessions { json } => {
            print_sessions(&ws.memory.list(), json)?;
            if let (false, Some(store)) = (json, ws.store()) {
                println!(
                    "{}",
                    format!("stored in {}", helpers::display_path(store.dir())).dimmed()
                );
            }
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────
// Operations
// ─────────────────────────────────────────────

fn create(ws: &Workspace, session: &str, strategy: &str, params: MemoryParams) -> Result<SessionInfo> {
    let info = ws
        .memory
        .create(session, strategy, &params)
        .with_context(|| format!("cannot create session '{session}'"))?;
    ws.persist(session)?;
    Ok(info)
}

async fn add(ws: &Workspace, session: &str, human: &str, ai: &str, create: bool) -> Result<SessionInfo> {
    if create {
        ws.memory.ensure(session)?;
    }
    ws.memory
        .append(session, human, ai)
        .await
        .with_context(|| format!("cannot add to session '{session}'"))?;
    ws.persist(session)?;
    Ok(ws.memory.info(session)?)
}

fn clear(ws: &Workspace, session: &str) -> Result<()> {
    ws.memory.clear(session)?;
    ws.persist(session)
}

/// Removes the session from memory and disk; true if either had it.
fn delete(ws: &Workspace, session: &str) -> bool {
    let in_memory = ws.memory.delete(session);
    let on_disk = ws.forget(session);
    in_memory || on_disk
}

fn print_sessions(sessions: &[SessionInfo], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(sessions)?);
        return Ok(());
    }
    if sessions.is_empty() {
        println!("{}", "(no sessions)".dimmed());
        return Ok(());
    }
    println!(
        "{}",
        format!(
            "{:<24} {:<28} {:>5} {:>8}  {}",
            "SESSION", "STRATEGY", "RAW", "SUMMARY", "UPDATED"
        )
        .bold()
    );
    for info in sessions {
        println!("{}", helpers::render_session_row(info));
    }
    Ok(())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
