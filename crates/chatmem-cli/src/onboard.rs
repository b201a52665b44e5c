//! `chatmem onboard` — initialize configuration and data directories.
//!
//! - Creates `~/.chatmem/config.json` with defaults
//! - Creates the sessions and REPL history directories

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use chatmem_core::config::{get_config_path, load_config, save_config};
use chatmem_core::utils::{expand_home, get_data_path};

use crate::helpers::display_path;

/// Run the onboard command.
pub fn run() -> Result<()> {
    println!();
    println!("{}", "🧠 chatmem — Setup".cyan().bold());
    println!();

    let created = onboard_into(&get_config_path(), &get_data_path())?;
    for line in created {
        println!("  {} {}", "✓".green(), line);
    }

    println!();
    println!(
        "{}",
        "  Setup complete! Run `chatmem chat` to start chatting.".green()
    );
    println!();

    Ok(())
}

/// Create config and directories, returning one status line per step.
fn onboard_into(config_path: &Path, data_dir: &Path) -> Result<Vec<String>> {
    let mut lines = Vec::new();

    // 1. Create config if it doesn't exist
    if config_path.exists() {
        lines.push(format!("config already exists at {}", display_path(config_path)));
    } else {
        let config = load_config(Some(config_path)); // defaults
        save_config(&config, Some(config_path))
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        lines.push(format!("created config at {}", display_path(config_path)));
    }

    // 2. Sessions directory, as configured
    let config = load_config(Some(config_path));
    let sessions_dir = expand_home(&config.storage.sessions_dir);
    std::fs::create_dir_all(&sessions_dir)
        .with_context(|| format!("failed to create {}", sessions_dir.display()))?;
    lines.push(format!("sessions dir at {}", display_path(&sessions_dir)));

    // 3. REPL history directory
    let history_dir = data_dir.join("history");
    std::fs::create_dir_all(&history_dir)?;
    lines.push(format!("history dir at {}", display_path(&history_dir)));

    Ok(lines)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
