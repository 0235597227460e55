//! Host lists from the command line and from files.

use std::fs;
use std::path::Path;

use crate::core::fleet::HostTarget;
use crate::error::{HostFactsError, Result};

/// Parse a host list: one host per line, `#` starts a comment, blank lines
/// are ignored. Duplicates are kept so each entry yields its own outcome.
pub fn parse_host_list(text: &str) -> Result<Vec<HostTarget>> {
    let mut hosts = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let entry = line.split('#').next().unwrap_or_default().trim();
        if entry.is_empty() {
            continue;
        }
        let host = HostTarget::parse(entry)
            .map_err(|e| HostFactsError::invalid_host(format!("line {}: {}", number + 1, e)))?;
        hosts.push(host);
    }
    Ok(hosts)
}

pub fn read_host_file(path: &Path) -> Result<Vec<HostTarget>> {
    let text = fs::read_to_string(path).map_err(|e| {
        HostFactsError::config(format!("cannot read host file {}: {}", path.display(), e))
    })?;
    parse_host_list(&text)
}

/// Hosts named on the command line followed by those from any host files.
pub fn gather_hosts<S: AsRef<str>, P: AsRef<Path>>(args: &[S], files: &[P]) -> Result<Vec<HostTarget>> {
    let mut hosts = args
        .iter()
        .map(|a| HostTarget::parse(a.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    for file in files {
        hosts.extend(read_host_file(file.as_ref())?);
    }
    Ok(hosts)
}
