use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use log::warn;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::activity_log::{ActivityLevel, ActivityLog};
use crate::core::config::{CollectorSettings, Config};
use crate::core::fleet::{
    build_prober, builtin_registry, CancelToken, Clock, CollectionRequest, CollectionResult,
    FleetAggregator, HostCollector, HostStatus, OutputMode, ProbeKind, SystemClock,
};
use crate::core::output;
use crate::core::sink::{deliver, ConsoleSink, CsvFileSink, JsonFileSink, RecordSink};
use crate::core::hosts::gather_hosts;
use crate::platform::PowerShellTransport;
use crate::ui;

/// Handle 'collect' - probe and collect facts from every requested host
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = Config::load()?;
    let settings = resolve_settings(&config, matches)?;
    let output_path = matches.get_one::<String>("output").map(PathBuf::from);
    let mode = resolve_mode(matches, output_path.as_deref())?;

    let host_args: Vec<String> = matches
        .get_many::<String>("hosts")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    let host_files: Vec<PathBuf> = matches
        .get_many::<String>("file")
        .map(|v| v.map(PathBuf::from).collect())
        .unwrap_or_default();
    let hosts = gather_hosts(&host_args, &host_files)?;
    if hosts.is_empty() {
        bail!("No hosts given. Pass host names or use --file <PATH>");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let collector = HostCollector::new(
        Arc::from(build_prober(
            settings.probe,
            settings.probe_timeout,
            settings.tcp_probe_port,
        )),
        Arc::new(PowerShellTransport::new(settings.query_timeout)),
        Arc::clone(&clock),
    );
    let aggregator = FleetAggregator::new(
        builtin_registry(&settings.providers),
        collector,
        settings.workers,
    );
    let request = CollectionRequest::new(hosts, settings.enabled.clone());

    // Create shared cancellation flag
    let cancel = CancelToken::new();
    let cancel_clone = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "Cancellation requested...".yellow().bold());
        eprintln!("{}", "Hosts in progress will finish; the rest are skipped.".dimmed());
        cancel_clone.cancel();
    })
    .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

    eprintln!(
        "{}",
        format!(
            "Collecting {} host(s) with {} worker(s)... (Ctrl+C to cancel)",
            request.hosts.len(),
            settings.workers
        )
        .cyan()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .thread_name("hostfacts-worker")
        .build()
        .context("Failed to start worker runtime")?;
    let result = runtime.block_on(aggregator.run(&request, &cancel))?;

    let warnings = emit(&result, mode, output_path.as_deref(), settings.json_depth)?;
    for warning in &warnings {
        ui::warn(warning);
    }

    let summary = ui::render_summary(&result.records, result.cancelled);
    eprintln!("{}", summary.bold());
    if let Some(path) = &output_path {
        if warnings.is_empty() {
            ui::success(&format!("Results written to {}", path.display()));
        }
    }

    if let Some(path) = &config.activity_log {
        record_activity(&ActivityLog::new(path, clock), &result, &summary);
    }

    Ok(())
}

/// Config values with command-line overrides applied.
pub fn resolve_settings(config: &Config, matches: &ArgMatches) -> Result<CollectorSettings> {
    let mut settings = config.collector_settings();

    if let Some(&workers) = matches.get_one::<usize>("workers") {
        if workers == 0 {
            bail!("--workers must be at least 1");
        }
        settings.workers = workers;
    }
    if let Some(probe) = matches.get_one::<String>("probe") {
        settings.probe = probe.parse::<ProbeKind>()?;
    }
    if matches.get_flag("console-sessions") {
        settings.providers.console_sessions = true;
    }
    if let Some(list) = matches.get_one::<String>("providers") {
        settings.enabled = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    Ok(settings)
}

/// Explicit `--format`, else inferred from the output file extension.
fn resolve_mode(matches: &ArgMatches, output: Option<&Path>) -> Result<OutputMode> {
    if let Some(format) = matches.get_one::<String>("format") {
        return Ok(format.parse()?);
    }
    let inferred = match output.and_then(|p| p.extension()).and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => OutputMode::Json,
        Some(_) => OutputMode::Csv,
        None => OutputMode::Table,
    };
    Ok(inferred)
}

/// Print or persist the result. Returns sink warnings.
fn emit(
    result: &CollectionResult,
    mode: OutputMode,
    output_path: Option<&Path>,
    json_depth: usize,
) -> Result<Vec<String>> {
    if let Some(path) = output_path {
        let mut sink: Box<dyn RecordSink> = match mode {
            OutputMode::Json => Box::new(JsonFileSink::new(path, json_depth)),
            OutputMode::Csv | OutputMode::Table => Box::new(CsvFileSink::new(path)),
        };
        return Ok(deliver(sink.as_mut(), result));
    }

    let rendering = output::format(result, mode, json_depth)?;
    match rendering.as_text() {
        Some(text) => {
            println!("{}", text.trim_end());
            Ok(Vec::new())
        }
        None => Ok(deliver(&mut ConsoleSink::stdout(), result)),
    }
}

fn record_activity(log: &ActivityLog, result: &CollectionResult, summary: &str) {
    let mut entries = vec![(ActivityLevel::Info, format!("collect: {}", summary))];
    for record in &result.records {
        match record.status {
            HostStatus::Unreachable => entries.push((
                ActivityLevel::Warning,
                format!("{} unreachable: {}", record.host, record.error_summary()),
            )),
            HostStatus::Collected if !record.failures.is_empty() => entries.push((
                ActivityLevel::Error,
                format!("{}: {}", record.host, record.error_summary()),
            )),
            _ => {}
        }
    }

    for (level, message) in entries {
        if let Err(e) = log.append(level, &message) {
            warn!("Activity log {} not updated: {}", log.path().display(), e);
            break;
        }
    }
}
