use anyhow::Result;
use colored::Colorize;
use log::warn;
use std::sync::Arc;

use crate::core::activity_log::{ActivityLevel, ActivityLog};
use crate::core::config::Config;
use crate::core::fleet::SystemClock;
use crate::core::public_ip::{http_services, lookup_public_ip};
use crate::ui;

/// Handle 'public-ip' - ask each configured echo service until one answers
pub fn execute() -> Result<()> {
    let config = Config::load()?;
    let services = http_services(&config.public_ip_services)?;
    let lookup = lookup_public_ip(&services);

    for failure in &lookup.failures {
        ui::dimmed(&format!("  {} failed: {}", failure.service, failure.reason));
    }

    let (level, message) = match lookup.address {
        Some(address) => {
            println!("{}", address.to_string().green().bold());
            (ActivityLevel::Info, format!("public-ip: {}", address))
        }
        None => {
            ui::warn("No IP echo service answered");
            (
                ActivityLevel::Warning,
                format!("public-ip: all {} service(s) failed", lookup.failures.len()),
            )
        }
    };

    if let Some(path) = &config.activity_log {
        let log = ActivityLog::new(path, Arc::new(SystemClock));
        if let Err(e) = log.append(level, &message) {
            warn!("Activity log {} not updated: {}", path.display(), e);
        }
    }
    Ok(())
}
