use colored::*;

use crate::core::fleet::{FieldValue, HostRecord, HostStatus};

/// Render one host record as an indented, colored tree.
pub fn render_record(record: &HostRecord) -> String {
    let mut out = String::new();

    let status = match record.status {
        HostStatus::Collected if record.failures.is_empty() => record.status.to_string().green(),
        HostStatus::Collected => record.status.to_string().yellow(),
        HostStatus::Unreachable => record.status.to_string().red(),
        HostStatus::Skipped => record.status.to_string().dimmed(),
    };
    out.push_str(&format!("{} [{}]\n", record.host.bold().bright_cyan(), status));

    if let Some(reason) = &record.error {
        out.push_str(&format!("  {}\n", reason.dimmed()));
    }

    for (key, value) in record.fields.iter() {
        push_field(&mut out, 1, key, value);
    }

    for failure in &record.failures {
        out.push_str(&format!(
            "  {} {}\n",
            "✗".red(),
            format!("{}: {}", failure.provider, failure.detail).red()
        ));
    }
    for warning in &record.warnings {
        out.push_str(&format!("  {} {}\n", "!".yellow(), warning.yellow()));
    }

    out
}

fn push_field(out: &mut String, level: usize, key: &str, value: &FieldValue) {
    let indent = "  ".repeat(level);
    match value {
        FieldValue::List(items) if items.iter().any(|i| matches!(i, FieldValue::Map(_))) => {
            out.push_str(&format!("{}{}:\n", indent, key.white()));
            for (n, item) in items.iter().enumerate() {
                match item {
                    FieldValue::Map(map) => {
                        out.push_str(&format!("{}  [{}]\n", indent, n));
                        for (k, v) in map.iter() {
                            push_field(out, level + 2, k, v);
                        }
                    }
                    other => out.push_str(&format!("{}  - {}\n", indent, other)),
                }
            }
        }
        FieldValue::Map(map) => {
            out.push_str(&format!("{}{}:\n", indent, key.white()));
            for (k, v) in map.iter() {
                push_field(out, level + 1, k, v);
            }
        }
        FieldValue::Null => {
            out.push_str(&format!("{}{}: {}\n", indent, key.white(), "-".dimmed()));
        }
        other => out.push_str(&format!("{}{}: {}\n", indent, key.white(), other)),
    }
}

/// One-line run summary.
pub fn render_summary(records: &[HostRecord], cancelled: bool) -> String {
    let count = |s: HostStatus| records.iter().filter(|r| r.status == s).count();
    let failures: usize = records.iter().map(|r| r.failures.len()).sum();

    let mut line = format!(
        "{} host(s): {} collected, {} unreachable, {} skipped, {} provider failure(s)",
        records.len(),
        count(HostStatus::Collected),
        count(HostStatus::Unreachable),
        count(HostStatus::Skipped),
        failures
    );
    if cancelled {
        line.push_str(" (cancelled)");
    }
    line
}
