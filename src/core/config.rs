use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::fleet::providers::{self, EventIds, ProviderSettings};
use crate::core::fleet::ProbeKind;
use crate::error::HostFactsError;

pub const MAX_JSON_DEPTH: usize = 16;

/// Keys accepted by `config set`.
pub const KEYS: &[&str] = &[
    "workers",
    "probe",
    "probe_timeout_ms",
    "tcp_probe_port",
    "query_timeout_secs",
    "event_window",
    "startup_event_ids",
    "shutdown_event_ids",
    "user_shutdown_event_ids",
    "console_sessions",
    "providers",
    "json_depth",
    "public_ip_services",
    "activity_log",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hosts collected at the same time
    pub workers: usize,
    pub probe: ProbeKind,
    pub probe_timeout_ms: u64,
    /// Port used by the tcp probe (WinRM over HTTP by default)
    pub tcp_probe_port: u16,
    /// Upper bound for a single remote query
    pub query_timeout_secs: u64,
    /// Number of recent System log records scanned by the uptime provider
    pub event_window: usize,
    pub startup_event_ids: Vec<u32>,
    pub shutdown_event_ids: Vec<u32>,
    pub user_shutdown_event_ids: Vec<u32>,
    pub console_sessions: bool,
    /// Providers enabled when `--providers` is not given
    pub providers: Vec<String>,
    pub json_depth: usize,
    /// IP echo services, tried in order
    pub public_ip_services: Vec<String>,
    /// CSV activity log, disabled when unset
    pub activity_log: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let ids = EventIds::default();
        Self {
            workers: 8,
            probe: ProbeKind::Ping,
            probe_timeout_ms: 1_000,
            tcp_probe_port: 5985,
            query_timeout_secs: 60,
            event_window: providers::uptime::DEFAULT_EVENT_WINDOW,
            startup_event_ids: ids.startup,
            shutdown_event_ids: ids.shutdown,
            user_shutdown_event_ids: ids.user_shutdown,
            console_sessions: false,
            providers: providers::BUILTIN.iter().map(|s| s.to_string()).collect(),
            json_depth: 4,
            public_ip_services: vec![
                "https://api.ipify.org".to_string(),
                "https://ifconfig.me/ip".to_string(),
                "https://icanhazip.com".to_string(),
            ],
            activity_log: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load from an explicit path. A missing, empty or unreadable file yields defaults.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let data = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        if data.trim().is_empty() {
            return Ok(Config::default());
        }

        Ok(serde_json::from_str(&data).unwrap_or_else(|e| {
            log::warn!("Ignoring corrupt config {:?}: {}", config_path, e);
            Config::default()
        }))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, data)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("hostfacts").join("config.json"))
    }

    /// Validate and apply a single `key = value` setting.
    pub fn set_key(&mut self, key: &str, value: &str) -> crate::error::Result<()> {
        let value = value.trim();
        match key {
            "workers" => {
                let workers = parse_number::<usize>(key, value)?;
                if workers == 0 {
                    return Err(HostFactsError::config("workers must be at least 1"));
                }
                self.workers = workers;
            }
            "probe" => self.probe = value.parse()?,
            "probe_timeout_ms" => self.probe_timeout_ms = parse_positive(key, value)?,
            "tcp_probe_port" => {
                let port = parse_number::<u16>(key, value)?;
                if port == 0 {
                    return Err(HostFactsError::config("tcp_probe_port must be between 1 and 65535"));
                }
                self.tcp_probe_port = port;
            }
            "query_timeout_secs" => self.query_timeout_secs = parse_positive(key, value)?,
            "event_window" => {
                self.event_window = parse_positive::<u64>(key, value)? as usize;
            }
            "startup_event_ids" => self.startup_event_ids = parse_ids(key, value)?,
            "shutdown_event_ids" => self.shutdown_event_ids = parse_ids(key, value)?,
            "user_shutdown_event_ids" => self.user_shutdown_event_ids = parse_ids(key, value)?,
            "console_sessions" => self.console_sessions = parse_bool(key, value)?,
            "providers" => {
                let names = split_list(value);
                if names.is_empty() {
                    return Err(HostFactsError::config("providers cannot be empty"));
                }
                if let Some(unknown) = names
                    .iter()
                    .find(|n| !providers::BUILTIN.iter().any(|b| b.eq_ignore_ascii_case(n)))
                {
                    return Err(HostFactsError::unknown_provider(format!(
                        "{} (available: {})",
                        unknown,
                        providers::BUILTIN.join(", ")
                    )));
                }
                self.providers = names.into_iter().map(|n| n.to_ascii_lowercase()).collect();
            }
            "json_depth" => {
                let depth = parse_number::<usize>(key, value)?;
                if !(1..=MAX_JSON_DEPTH).contains(&depth) {
                    return Err(HostFactsError::config(format!(
                        "json_depth must be between 1 and {}",
                        MAX_JSON_DEPTH
                    )));
                }
                self.json_depth = depth;
            }
            "public_ip_services" => {
                let services = split_list(value);
                if services.is_empty() {
                    return Err(HostFactsError::config("public_ip_services cannot be empty"));
                }
                for service in &services {
                    let parsed = url::Url::parse(service).map_err(|e| {
                        HostFactsError::config(format!("invalid service URL '{}': {}", service, e))
                    })?;
                    if !matches!(parsed.scheme(), "http" | "https") {
                        return Err(HostFactsError::config(format!(
                            "service URL '{}' must use http or https",
                            service
                        )));
                    }
                }
                self.public_ip_services = services;
            }
            "activity_log" => {
                self.activity_log = match value {
                    "" | "none" | "off" => None,
                    path => Some(PathBuf::from(path)),
                };
            }
            other => {
                return Err(HostFactsError::config(format!(
                    "unknown key '{}' (valid keys: {})",
                    other,
                    KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }

    pub fn event_ids(&self) -> EventIds {
        EventIds {
            startup: self.startup_event_ids.clone(),
            shutdown: self.shutdown_event_ids.clone(),
            user_shutdown: self.user_shutdown_event_ids.clone(),
        }
    }

    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings {
            workers: self.workers.max(1),
            probe: self.probe,
            probe_timeout: Duration::from_millis(self.probe_timeout_ms.max(1)),
            tcp_probe_port: self.tcp_probe_port,
            query_timeout: Duration::from_secs(self.query_timeout_secs.max(1)),
            providers: ProviderSettings {
                console_sessions: self.console_sessions,
                event_ids: self.event_ids(),
                event_window: self.event_window.max(1),
            },
            enabled: self.providers.clone(),
            json_depth: self.json_depth.clamp(1, MAX_JSON_DEPTH),
        }
    }
}

/// Resolved settings for one collection run (config plus CLI overrides).
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub workers: usize,
    pub probe: ProbeKind,
    pub probe_timeout: Duration,
    pub tcp_probe_port: u16,
    pub query_timeout: Duration,
    pub providers: ProviderSettings,
    /// Provider names enabled for the run; empty means all
    pub enabled: Vec<String>,
    pub json_depth: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Config::default().collector_settings()
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> crate::error::Result<T> {
    value
        .parse::<T>()
        .map_err(|_| HostFactsError::config(format!("{} expects a number, got '{}'", key, value)))
}

fn parse_positive<T>(key: &str, value: &str) -> crate::error::Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let parsed = parse_number::<T>(key, value)?;
    if parsed <= T::default() {
        return Err(HostFactsError::config(format!("{} must be greater than 0", key)));
    }
    Ok(parsed)
}

fn parse_bool(key: &str, value: &str) -> crate::error::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(HostFactsError::config(format!(
            "{} expects true or false, got '{}'",
            key, value
        ))),
    }
}

fn parse_ids(key: &str, value: &str) -> crate::error::Result<Vec<u32>> {
    let ids = split_list(value)
        .iter()
        .map(|id| parse_number::<u32>(key, id))
        .collect::<crate::error::Result<Vec<u32>>>()?;
    if ids.is_empty() {
        return Err(HostFactsError::config(format!("{} needs at least one id", key)));
    }
    Ok(ids)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
