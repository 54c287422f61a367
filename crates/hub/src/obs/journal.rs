//! Append-only daily trace journal.
//!
//! One JSONL file per UTC day under the trace dir; the stream rotates when
//! the date changes. Write failures are logged and never fail the tick.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use parking_lot::Mutex;

use sn_domain::trace::Trace;

pub struct TraceJournal {
    enabled: bool,
    dir: PathBuf,
    stream: Mutex<Option<(String, File)>>,
}

impl TraceJournal {
    pub fn new(enabled: bool, dir: PathBuf) -> Self {
        Self {
            enabled,
            dir,
            stream: Mutex::new(None),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, PathBuf::new())
    }

    fn today() -> String {
        chrono::Utc::now().format("%Y-%m-%d").to_string()
    }

    /// Append one trace as a JSONL line, rotating at UTC date change.
    pub fn append(&self, trace: &Trace) {
        if !self.enabled {
            return;
        }
        let line = match serde_json::to_string(trace) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize trace for journal");
                return;
            }
        };

        let today = Self::today();
        let mut stream = self.stream.lock();

        let needs_open = match stream.as_ref() {
            Some((date, _)) => *date != today,
            None => true,
        };
        if needs_open {
            // Dropping the old handle closes the previous day's stream.
            *stream = match self.open_for(&today) {
                Ok(file) => Some((today.clone(), file)),
                Err(e) => {
                    tracing::warn!(error = %e, date = %today, "failed to open trace journal");
                    None
                }
            };
        }

        if let Some((_, file)) = stream.as_mut() {
            if let Err(e) = writeln!(file, "{line}") {
                tracing::warn!(error = %e, "trace journal write failed");
            }
        }
    }

    fn open_for(&self, date: &str) -> std::io::Result<File> {
        std::fs::create_dir_all(&self.dir)?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(format!("{date}.jsonl")))
    }

    /// Flush and close the current stream (shutdown path).
    pub fn flush(&self) {
        if let Some((_, file)) = self.stream.lock().take() {
            if let Err(e) = file.sync_all() {
                tracing::warn!(error = %e, "trace journal flush failed");
            }
        }
    }
}
