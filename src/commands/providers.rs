use anyhow::Result;
use colored::Colorize;

use crate::core::config::Config;
use crate::core::fleet::builtin_registry;

/// Handle 'providers' - list built-in providers in registration order
pub fn execute() -> Result<()> {
    let config = Config::load()?;
    let registry = builtin_registry(&config.collector_settings().providers);

    println!("{}", "Fact providers (run in this order):".white().bold());
    for provider in registry.iter() {
        let enabled = config
            .providers
            .iter()
            .any(|p| p.eq_ignore_ascii_case(provider.name()));
        let marker = if enabled { "●".green() } else { "○".dimmed() };
        println!(
            "  {} {:<10} {}",
            marker,
            provider.name().cyan().bold(),
            provider.description().dimmed()
        );
    }
    println!();
    println!(
        "{}",
        "Enable a subset with 'hostfacts config set providers user,uptime' or --providers.".dimmed()
    );
    Ok(())
}
