//! Device abstraction layer.
//!
//! `DeviceHandle` is the capability set the session controller consumes
//! from one physical wearable. Vendor protocol implementations (pairing
//! bytes, GATT layout) live behind this trait and behind
//! `DeviceFactory`; the crate ships a simulated backend in [`sim`] so
//! everything compiles and runs without hardware.

pub mod sim;
pub mod types;

// Re-export commonly used types
pub use types::{DeviceEvent, DeviceStatus, HeartRateSample};

use crate::discovery::DiscoveredPeripheral;
use crossbeam_channel::Receiver;

/// Errors from device operations.
#[derive(Debug)]
pub enum DeviceError {
    /// The operation requires a transport link that does not exist.
    NotConnected,
    /// The heart-rate monitor is already running.
    AlreadyMonitoring,
    /// The revision requires a pre-shared auth key and none was given.
    AuthKeyRequired,
    /// Transport-level request failure.
    Transport(String),
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::NotConnected => write!(f, "Device is not connected"),
            DeviceError::AlreadyMonitoring => write!(f, "Heart-rate monitor is already running"),
            DeviceError::AuthKeyRequired => {
                write!(f, "Device revision requires a pre-shared auth key")
            }
            DeviceError::Transport(msg) => write!(f, "Transport error: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {}

/// Capability set over one physical wearable.
///
/// Connect/disconnect and monitor start/stop are fire-and-forget
/// requests: the call returns once the request is issued, and the
/// outcome is observed later as [`DeviceEvent`]s on the channel
/// returned by [`DeviceHandle::events`].
pub trait DeviceHandle: Send {
    /// Advertised display name.
    fn name(&self) -> &str;

    /// Transport address.
    fn address(&self) -> &str;

    /// Current connection/auth status.
    fn status(&self) -> DeviceStatus;

    /// Whether the heart-rate monitor is currently running.
    fn monitor_started(&self) -> bool;

    /// Request a transport connection (also used for reconnects).
    fn connect(&mut self) -> Result<(), DeviceError>;

    /// Request a transport disconnect and release transport resources.
    fn disconnect(&mut self) -> Result<(), DeviceError>;

    /// Request that the device start emitting heart-rate samples.
    ///
    /// `continuous` selects indefinite streaming over a one-shot
    /// measurement.
    fn start_monitor(&mut self, continuous: bool) -> Result<(), DeviceError>;

    /// Request that the device stop emitting samples.
    fn stop_monitor(&mut self) -> Result<(), DeviceError>;

    /// Status/monitor notifications. Dropping the receiver unsubscribes.
    fn events(&self) -> Receiver<DeviceEvent>;

    /// The live sample stream, consumed by the monitoring session.
    fn samples(&self) -> Receiver<HeartRateSample>;
}

/// Hardware revision family, selected by the configured tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRevision {
    /// Band generations 2/3: no persisted auth key.
    Band2,
    /// Band generations 4/5: authenticates with a pre-shared key.
    Band4,
}

impl DeviceRevision {
    /// Map a configured revision tag to a revision family.
    pub fn from_tag(tag: &str) -> Result<Self, RevisionError> {
        match tag {
            "2" | "3" => Ok(DeviceRevision::Band2),
            "4" | "5" => Ok(DeviceRevision::Band4),
            other => Err(RevisionError::Unrecognized(other.to_string())),
        }
    }

    /// Whether this revision authenticates with a pre-shared key.
    pub fn requires_auth_key(&self) -> bool {
        matches!(self, DeviceRevision::Band4)
    }
}

/// Unrecognized revision tag in the identity configuration.
#[derive(Debug, PartialEq, Eq)]
pub enum RevisionError {
    Unrecognized(String),
}

impl std::fmt::Display for RevisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RevisionError::Unrecognized(tag) => {
                write!(f, "Unrecognized device revision tag '{tag}'")
            }
        }
    }
}

impl std::error::Error for RevisionError {}

/// Builds the concrete [`DeviceHandle`] variant for a discovered
/// peripheral. Vendor protocol code stays behind this seam.
pub trait DeviceFactory {
    fn build(
        &self,
        revision: DeviceRevision,
        peripheral: &DiscoveredPeripheral,
        auth_key: Option<&str>,
    ) -> Result<Box<dyn DeviceHandle>, DeviceError>;
}
