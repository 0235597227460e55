//! Append-only CSV activity log (`timestamp,level,message`).

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::fleet::Clock;
use crate::core::output::csv_line;
use crate::error::{HostFactsError, Result};

const HEADER: &str = "Timestamp,Level,Message";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityLevel::Info => write!(f, "INFO"),
            ActivityLevel::Warning => write!(f, "WARNING"),
            ActivityLevel::Error => write!(f, "ERROR"),
        }
    }
}

pub struct ActivityLog {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl ActivityLog {
    pub fn new<P: Into<PathBuf>>(path: P, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry, writing the header first when the file is new or empty.
    pub fn append(&self, level: ActivityLevel, message: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                HostFactsError::sink(format!("cannot open {}: {}", self.path.display(), e))
            })?;

        let mut text = String::new();
        if file.metadata()?.len() == 0 {
            text.push_str(HEADER);
            text.push_str("\r\n");
        }

        let timestamp = self.clock.now().format("%Y-%m-%d %H:%M:%S").to_string();
        let level = level.to_string();
        text.push_str(&csv_line([timestamp.as_str(), level.as_str(), message].into_iter()));

        file.write_all(text.as_bytes())?;
        Ok(())
    }
}
