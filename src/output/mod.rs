//! Output sinks for the live heart-rate stream.
//!
//! Each enabled toggle maps to exactly one sink instance per monitoring
//! session; sinks are created fresh at session start and dropped with
//! the session.

pub mod csv;
pub mod file;
pub mod osc;

// Re-export commonly used types
pub use csv::CsvSink;
pub use file::FileSink;
pub use osc::OscSink;

use crate::device::HeartRateSample;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output configuration: three independently toggleable sinks plus
/// their targets. Persisted as part of the user config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Overwrite-in-place text file holding the latest bpm value
    pub file: bool,
    /// Append-only CSV log of timestamped samples
    pub csv: bool,
    /// OSC/UDP transmission of each sample
    pub osc: bool,

    pub file_path: PathBuf,
    pub csv_path: PathBuf,
    /// `host:port` the OSC sink sends to
    pub osc_target: String,
    /// OSC address pattern carrying the bpm value
    pub osc_address: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            file: false,
            csv: false,
            osc: true,
            file_path: PathBuf::from("heartrate.txt"),
            csv_path: PathBuf::from("heartrate.csv"),
            osc_target: "127.0.0.1:9000".to_string(),
            osc_address: "/avatar/parameters/HR".to_string(),
        }
    }
}

impl OutputSettings {
    /// Whether any sink is enabled.
    pub fn any_enabled(&self) -> bool {
        self.file || self.csv || self.osc
    }
}

/// Errors from output sinks.
#[derive(Debug)]
pub enum SinkError {
    Io(String),
    Net(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(msg) => write!(f, "Sink IO error: {msg}"),
            SinkError::Net(msg) => write!(f, "Sink network error: {msg}"),
        }
    }
}

impl std::error::Error for SinkError {}

/// A consumer of the live sample stream. One instance per enabled
/// toggle per session; each owns its output resource independently.
pub trait OutputSink: Send {
    /// Short name used in status output and tests.
    fn label(&self) -> &'static str;

    /// Deliver one sample.
    fn write(&mut self, sample: &HeartRateSample) -> Result<(), SinkError>;
}

/// Build one sink per enabled toggle, in file → csv → osc order.
///
/// The order has no semantic effect (sinks do not interact); it is
/// fixed so tests can assert on it.
pub fn build_sinks(settings: &OutputSettings) -> Result<Vec<Box<dyn OutputSink>>, SinkError> {
    let mut sinks: Vec<Box<dyn OutputSink>> = Vec::new();
    if settings.file {
        sinks.push(Box::new(FileSink::new(settings.file_path.clone())));
    }
    if settings.csv {
        sinks.push(Box::new(CsvSink::create(settings.csv_path.clone())?));
    }
    if settings.osc {
        sinks.push(Box::new(OscSink::connect(
            &settings.osc_target,
            settings.osc_address.clone(),
        )?));
    }
    Ok(sinks)
}
