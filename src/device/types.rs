//! Core types for the device session layer.
//!
//! These types describe what the controller observes about a wearable:
//! its connection/auth status, monitor state changes, and the samples
//! it emits while monitoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection/authentication status of a wearable device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    /// No transport link. Terminal for a given handle once reached
    /// after having been online.
    Offline,
    /// Transport link established, identity handshake not yet complete.
    OnlineUnauth,
    /// Handshake succeeded; the device will accept monitor commands.
    OnlineAuth,
}

impl DeviceStatus {
    /// Whether a transport link currently exists.
    pub fn is_online(&self) -> bool {
        !matches!(self, DeviceStatus::Offline)
    }
}

/// A single heart-rate measurement emitted by a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartRateSample {
    /// Beats per minute
    pub bpm: u16,
    /// Timestamp when the measurement was taken
    pub timestamp: DateTime<Utc>,
}

impl HeartRateSample {
    pub fn new(bpm: u16) -> Self {
        Self {
            bpm,
            timestamp: Utc::now(),
        }
    }
}

/// Notification emitted by a device handle.
///
/// These are the only inputs that drive the session controller's state
/// machine; the controller never polls the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Connection/auth status changed.
    Status(DeviceStatus),
    /// Heart-rate monitor started (true) or stopped (false).
    MonitorStarted(bool),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_online() {
        assert!(!DeviceStatus::Offline.is_online());
        assert!(DeviceStatus::OnlineUnauth.is_online());
        assert!(DeviceStatus::OnlineAuth.is_online());
    }

    #[test]
    fn test_sample_creation() {
        let sample = HeartRateSample::new(72);
        assert_eq!(sample.bpm, 72);
    }
}
