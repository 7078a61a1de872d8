//! Latest-value text file sink.
//!
//! Overwrites the target file with the most recent bpm reading on every
//! sample, which is what screen-overlay tools expect to poll.

use crate::device::HeartRateSample;
use crate::output::{OutputSink, SinkError};
use std::path::PathBuf;

pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl OutputSink for FileSink {
    fn label(&self) -> &'static str {
        "file"
    }

    fn write(&mut self, sample: &HeartRateSample) -> Result<(), SinkError> {
        std::fs::write(&self.path, format!("{}\n", sample.bpm))
            .map_err(|e| SinkError::Io(format!("{}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrites_with_latest_value() {
        let path = std::env::temp_dir().join(format!("pulselink-file-{}.txt", uuid::Uuid::new_v4()));
        let mut sink = FileSink::new(path.clone());

        sink.write(&HeartRateSample::new(70)).unwrap();
        sink.write(&HeartRateSample::new(85)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "85\n");

        std::fs::remove_file(&path).ok();
    }
}
