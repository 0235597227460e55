//! Record sinks: where finished host records go.
//!
//! A sink failure never changes the collected results; [`deliver`] turns it
//! into warnings that are shown next to them.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::warn;

use crate::core::fleet::{CollectionResult, HostRecord};
use crate::core::output;
use crate::error::{HostFactsError, Result};
use crate::ui::record_tree::render_record;

pub trait RecordSink {
    fn append(&mut self, record: &HostRecord) -> Result<()>;

    /// Flush everything appended so far.
    fn finish(&mut self) -> Result<()>;
}

/// Prints each record as a tree as soon as it is appended.
pub struct ConsoleSink<W: Write = io::Stdout> {
    out: W,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RecordSink for ConsoleSink<W> {
    fn append(&mut self, record: &HostRecord) -> Result<()> {
        writeln!(self.out, "{}", render_record(record))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            HostFactsError::sink(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }
    fs::write(path, contents)
        .map_err(|e| HostFactsError::sink(format!("cannot write {}: {}", path.display(), e)))
}

/// Buffers records and writes a CSV file on finish.
pub struct CsvFileSink {
    path: PathBuf,
    records: Vec<HostRecord>,
}

impl CsvFileSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }
}

impl RecordSink for CsvFileSink {
    fn append(&mut self, record: &HostRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        write_file(&self.path, &output::to_csv(&self.records))
    }
}

/// Buffers records and writes a depth-bounded JSON array on finish.
pub struct JsonFileSink {
    path: PathBuf,
    depth: usize,
    records: Vec<HostRecord>,
}

impl JsonFileSink {
    pub fn new<P: Into<PathBuf>>(path: P, depth: usize) -> Self {
        Self {
            path: path.into(),
            depth,
            records: Vec::new(),
        }
    }
}

impl RecordSink for JsonFileSink {
    fn append(&mut self, record: &HostRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let text = output::to_json(&self.records, self.depth)?;
        write_file(&self.path, &text)
    }
}

/// Hand every record to the sink. Failures come back as warnings.
pub fn deliver(sink: &mut dyn RecordSink, result: &CollectionResult) -> Vec<String> {
    let mut warnings = Vec::new();

    for record in &result.records {
        if let Err(e) = sink.append(record) {
            warn!("Sink rejected {}: {}", record.host, e);
            warnings.push(format!("output for {} not written: {}", record.host, e));
        }
    }
    if let Err(e) = sink.finish() {
        warn!("Sink failed to finish: {}", e);
        warnings.push(format!("output not written: {}", e));
    }

    warnings
}
