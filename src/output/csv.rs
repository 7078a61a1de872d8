//! Append-only CSV log sink.

use crate::device::HeartRateSample;
use crate::output::{OutputSink, SinkError};
use chrono::SecondsFormat;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

const HEADER: &str = "timestamp,bpm";

pub struct CsvSink {
    path: PathBuf,
    file: File,
}

impl CsvSink {
    /// Open the log for appending, writing the header if the file is
    /// new or empty.
    pub fn create(path: PathBuf) -> Result<Self, SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SinkError::Io(format!("{}: {e}", path.display())))?;

        let mut sink = Self { path, file };
        let is_empty = sink
            .file
            .metadata()
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        if is_empty {
            sink.write_line(HEADER)?;
        }
        Ok(sink)
    }

    fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        writeln!(self.file, "{line}")
            .and_then(|_| self.file.flush())
            .map_err(|e| SinkError::Io(format!("{}: {e}", self.path.display())))
    }
}

impl OutputSink for CsvSink {
    fn label(&self) -> &'static str {
        "csv"
    }

    fn write(&mut self, sample: &HeartRateSample) -> Result<(), SinkError> {
        let line = format!(
            "{},{}",
            sample.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            sample.bpm
        );
        self.write_line(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_rows() {
        let path = std::env::temp_dir().join(format!("pulselink-csv-{}.csv", uuid::Uuid::new_v4()));

        let mut sink = CsvSink::create(path.clone()).unwrap();
        sink.write(&HeartRateSample::new(72)).unwrap();
        sink.write(&HeartRateSample::new(73)).unwrap();
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,bpm");
        assert!(lines[1].ends_with(",72"));
        assert!(lines[2].ends_with(",73"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_reopen_does_not_duplicate_header() {
        let path = std::env::temp_dir().join(format!("pulselink-csv-{}.csv", uuid::Uuid::new_v4()));

        {
            let mut sink = CsvSink::create(path.clone()).unwrap();
            sink.write(&HeartRateSample::new(60)).unwrap();
        }
        {
            let mut sink = CsvSink::create(path.clone()).unwrap();
            sink.write(&HeartRateSample::new(61)).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("timestamp,bpm").count(), 1);
        assert_eq!(content.lines().count(), 3);

        std::fs::remove_file(&path).ok();
    }
}
