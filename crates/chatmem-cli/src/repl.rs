//! Interactive chat REPL.
//!
//! Uses `rustyline` for readline-style editing with persistent history.

use anyhow::Result;
use colored::Colorize;
use rustyline::config::Configurer;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tracing::debug;

use crate::chat::ChatSession;
use crate::helpers;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

/// REPL-only commands that act on the session instead of the model.
#[derive(Debug, PartialEq, Eq)]
enum SlashCommand {
    History,
    Summary,
    Clear,
}

fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    match input.to_lowercase().as_str() {
        "/history" => Some(SlashCommand::History),
        "/summary" => Some(SlashCommand::Summary),
        "/clear" => Some(SlashCommand::Clear),
        _ => None,
    }
}

/// Run the interactive REPL loop.
pub async fn run(chat: ChatSession<'_>) -> Result<()> {
    let session_id = chat.session_id().to_string();
    let ws = chat.workspace();
    let strategy = ws.memory.info(&session_id)?.strategy.to_string();
    helpers::print_banner(&session_id, &strategy);

    let mut editor = create_editor()?;

    loop {
        // Read input
        let input = match editor.readline("You: ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted) => {
                // Ctrl-C — exit cleanly
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                // Ctrl-D — exit cleanly
                break;
            }
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }

        // Check exit commands
        if is_exit_command(trimmed) {
            println!("\nGoodbye! 👋");
            break;
        }

        // Add to history
        let _ = editor.add_history_entry(&input);

        if let Some(cmd) = parse_slash_command(trimmed) {
            let result = match cmd {
                SlashCommand::History => ws
                    .memory
                    .history(&session_id)
                    .map(|h| println!("\n{}\n", helpers::render_history(&h)))
                    .map_err(anyhow::Error::from),
                SlashCommand::Summary => ws
                    .memory
                    .summary(&session_id)
                    .map(|s| println!("\n{}\n", if s.is_empty() { "(no summary)" } else { s.as_str() }))
                    .map_err(anyhow::Error::from),
                SlashCommand::Clear => ws
                    .memory
                    .clear(&session_id)
                    .map_err(anyhow::Error::from)
                    .and_then(|()| ws.persist(&session_id))
                    .map(|()| println!("\n{}\n", "memory cleared".dimmed())),
            };
            if let Err(e) = result {
                eprintln!("\n❌ Error: {e}\n");
            }
            continue;
        }

        // Process message
        debug!(session = %session_id, input = trimmed, "processing input");
        helpers::print_thinking();

        match chat.turn(trimmed).await {
            Ok(response) => {
                helpers::clear_thinking();
                helpers::print_response(&response);
            }
            Err(e) => {
                helpers::clear_thinking();
                eprintln!("\n❌ Error: {e:#}\n");
            }
        }
    }

    // Save history
    save_history(&mut editor);

    Ok(())
}

/// Create a rustyline editor with history.
fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    // Load history from ~/.chatmem/history/cli_history
    let history_path = history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

/// Save history to disk.
fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

/// Path to the history file.
fn history_path() -> std::path::PathBuf {
    chatmem_core::utils::get_data_path().join("history").join("cli_history")
}

/// Check if input is an exit command.
fn is_exit_command(input: &str) -> bool {
    let lower = input.to_lowercase();
    EXIT_COMMANDS.contains(&lower.as_str())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
