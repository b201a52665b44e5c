//! Shared CLI helpers — response printing, history rendering, version banner.

use std::path::Path;

use colored::Colorize;

use chatmem_core::memory::{Exchange, SessionInfo};
use chatmem_core::utils::truncate_string;

/// Print an assistant response to stdout.
pub fn print_response(response: &str) {
    println!();
    println!("{}", "🧠 chatmem".cyan().bold());
    if response.is_empty() {
        println!("{}", "(no response)".dimmed());
    } else {
        println!("{response}");
    }
    println!();
}

/// Print the banner shown at REPL start.
pub fn print_banner(session_id: &str, strategy: &str) {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "🧠 chatmem".cyan().bold(), version.dimmed());
    println!(
        "{}",
        format!("session {session_id} ({strategy})").dimmed()
    );
    println!(
        "{}",
        "Type a message, /history, /summary, /clear, or \"exit\" to quit.".dimmed()
    );
    println!();
}

/// Print a "thinking" spinner placeholder (for non-log mode).
pub fn print_thinking() {
    eprint!("{}", "⠿ thinking...".dimmed());
}

/// Clear the "thinking" placeholder.
pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}

/// Show a path with the home directory contracted to `~`.
pub fn display_path(path: &Path) -> String {
    if let Some(home) = dirs_next::home_dir() {
        if let Ok(rest) = path.strip_prefix(&home) {
            return if rest.as_os_str().is_empty() {
                "~".to_string()
            } else {
                format!("~/{}", rest.display())
            };
        }
    }
    path.display().to_string()
}

/// Plain-text transcript of a session history, one exchange per block.
pub fn render_history(history: &[Exchange]) -> String {
    history
        .iter()
        .map(Exchange::transcript)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One table row for `chatmem sessions`.
pub fn render_session_row(info: &SessionInfo) -> String {
    format!(
        "{:<24} {:<28} {:>5} {:>8}  {}",
        truncate_string(&info.id, 24),
        info.strategy.to_string(),
        info.exchanges,
        info.summary_chars,
        info.updated_at.format("%Y-%m-%d %H:%M"),
    )
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
