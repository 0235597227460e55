use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::config::{Config, KEYS};
use crate::ui;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => handle_show(),
        Some(("set", sub_matches)) => handle_set(sub_matches),
        Some(("reset", _)) => handle_reset(),
        Some(("path", _)) => handle_path(),
        _ => {
            println!("Use 'hostfacts config --help' for more information.");
            Ok(())
        }
    }
}

fn handle_show() -> Result<()> {
    let config = Config::load()?;
    let path = Config::get_config_path()?;

    println!("{}", format!("Configuration ({}):", path.display()).white());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn handle_set(matches: &ArgMatches) -> Result<()> {
    let key = matches
        .get_one::<String>("key")
        .context("Key argument is required")?;
    let value = matches
        .get_one::<String>("value")
        .context("Value argument is required")?;

    let mut config = Config::load()?;
    config.set_key(key, value).with_context(|| {
        format!("Could not set '{}' (valid keys: {})", key, KEYS.join(", "))
    })?;
    config.save()?;

    println!("{} {} = {}", "✓".green(), key.cyan().bold(), value);
    Ok(())
}

fn handle_reset() -> Result<()> {
    Config::default().save()?;
    ui::success("✓ Configuration reset to defaults");
    Ok(())
}

fn handle_path() -> Result<()> {
    println!("{}", Config::get_config_path()?.display());
    Ok(())
}
