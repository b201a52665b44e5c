//! `chatmem status` — show configuration, memory defaults and provider status.

use anyhow::Result;
use colored::Colorize;

use chatmem_core::config::{get_config_path, load_config};
use chatmem_core::config::schema::Config;
use chatmem_core::session::SessionStore;
use chatmem_core::utils::expand_home;
use chatmem_providers::registry::{is_usable, match_provider, with_env_keys, PROVIDERS};

use crate::helpers::display_path;

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();

    println!();
    println!("{}", "🧠 chatmem Status".cyan().bold());
    println!();

    // Config
    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        display_path(&config_path),
        if config_path.exists() {
            "✓".green().to_string()
        } else {
            "(not found)".red().to_string()
        }
    );

    // Sessions
    let sessions_dir = expand_home(&config.storage.sessions_dir);
    let stored = if config.storage.persist && sessions_dir.exists() {
        SessionStore::new(Some(sessions_dir.clone()))
            .map(|s| s.list().len())
            .unwrap_or(0)
    } else {
        0
    };
    println!(
        "  {:<18} {} {}",
        "Sessions:".bold(),
        display_path(&sessions_dir),
        if config.storage.persist {
            format!("({stored} stored)").dimmed().to_string()
        } else {
            "(persistence off)".yellow().to_string()
        }
    );

    // Memory
    println!(
        "  {:<18} {} {}",
        "Memory:".bold(),
        config.memory.default_strategy(),
        format!(
            "window {} | recent {} | condense timeout {}s",
            config.memory.window_size,
            config.memory.max_recent,
            config.memory.condense_timeout().as_secs()
        )
        .dimmed()
    );

    // Model
    print_model_line("Model:", &config.chat.model, &config);
    print_model_line("Summary model:", config.chat.summary_model(), &config);
    println!(
        "  {:<18} {} | max_tokens: {}",
        "Parameters:".bold(),
        format!("temp: {}", config.chat.temperature).dimmed(),
        format!("{}", config.chat.max_tokens).dimmed(),
    );

    // Providers
    println!();
    println!("  {}", "Providers:".bold());
    let providers_map = with_env_keys(config.providers.to_map());

    for spec in PROVIDERS {
        let status = match providers_map.get(spec.name) {
            Some(c) if is_usable(c, spec) && c.is_configured() => {
                format!("{} (key set)", "✓".green())
            }
            Some(c) if is_usable(c, spec) => format!(
                "{} {}",
                "✓".green(),
                c.api_base.as_deref().unwrap_or_default().dimmed()
            ),
            _ => format!("{}", "· not configured".dimmed()),
        };
        println!("    {:<20} {}", spec.display_name, status);
    }

    println!();

    Ok(())
}

fn print_model_line(label: &str, model: &str, config: &Config) {
    let providers = with_env_keys(config.providers.to_map());
    let via = match match_provider(model, &providers) {
        Some((_, spec)) => format!("via {}", spec.display_name).dimmed().to_string(),
        None => "(no provider)".red().to_string(),
    };
    println!("  {:<18} {} {}", label.bold(), model, via);
}
