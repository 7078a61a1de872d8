//! Discovery-driven auto-connect.
//!
//! Scans for advertisements, matches the configured device identity by
//! exact name, builds the revision-appropriate device handle, connects
//! it, and hands it to the session controller. The first match stops
//! the watcher; anything arriving after that is ignored.

use crate::config::AutoConnectConfig;
use crate::device::{DeviceError, DeviceFactory, DeviceRevision, RevisionError};
use crate::discovery::{DiscoveredPeripheral, DiscoveryError, DiscoveryWatcher};
use crate::session::SessionController;
use crossbeam_channel::RecvTimeoutError;
use std::time::Duration;

/// Errors from the auto-connect flow. All of these are fatal to the
/// flow only; the session controller is left untouched.
#[derive(Debug)]
pub enum AutoConnectError {
    /// Unrecognized revision tag in the configuration.
    Revision(RevisionError),
    /// The configured revision needs a pre-shared auth key and none is
    /// configured.
    MissingAuthKey,
    /// No target device name configured.
    MissingDeviceName,
    Discovery(DiscoveryError),
    Device(DeviceError),
}

impl std::fmt::Display for AutoConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutoConnectError::Revision(e) => write!(f, "{e}"),
            AutoConnectError::MissingAuthKey => {
                write!(f, "Configured device revision requires an auth key")
            }
            AutoConnectError::MissingDeviceName => {
                write!(f, "No auto-connect device name configured")
            }
            AutoConnectError::Discovery(e) => write!(f, "{e}"),
            AutoConnectError::Device(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AutoConnectError {}

impl From<RevisionError> for AutoConnectError {
    fn from(e: RevisionError) -> Self {
        AutoConnectError::Revision(e)
    }
}

impl From<DiscoveryError> for AutoConnectError {
    fn from(e: DiscoveryError) -> Self {
        AutoConnectError::Discovery(e)
    }
}

impl From<DeviceError> for AutoConnectError {
    fn from(e: DeviceError) -> Self {
        AutoConnectError::Device(e)
    }
}

/// Validated identity criteria for the target device.
#[derive(Debug, Clone)]
pub struct AutoConnectSettings {
    pub device_name: String,
    pub revision: DeviceRevision,
    pub auth_key: Option<String>,
}

impl AutoConnectSettings {
    /// Validate the raw configuration. Fails fast on an unrecognized
    /// revision tag or a missing auth key; nothing is retried.
    pub fn from_config(cfg: &AutoConnectConfig) -> Result<Self, AutoConnectError> {
        if cfg.device_name.is_empty() {
            return Err(AutoConnectError::MissingDeviceName);
        }
        let revision = DeviceRevision::from_tag(&cfg.device_version)?;
        let auth_key = cfg.auth_key.clone().filter(|k| !k.is_empty());
        if revision.requires_auth_key() && auth_key.is_none() {
            return Err(AutoConnectError::MissingAuthKey);
        }
        Ok(Self {
            device_name: cfg.device_name.clone(),
            revision,
            auth_key,
        })
    }
}

pub struct AutoConnectFlow<W, F> {
    watcher: W,
    factory: F,
    settings: AutoConnectSettings,
    /// First-match latch: once set, every further discovery event is
    /// ignored, including late events queued before stop took effect.
    matched: bool,
}

impl<W: DiscoveryWatcher, F: DeviceFactory> AutoConnectFlow<W, F> {
    pub fn new(watcher: W, factory: F, settings: AutoConnectSettings) -> Self {
        Self {
            watcher,
            factory,
            settings,
            matched: false,
        }
    }

    /// Start scanning for the target device.
    pub fn start(&mut self) -> Result<(), AutoConnectError> {
        self.watcher.start()?;
        Ok(())
    }

    /// Stop scanning. Idempotent.
    pub fn stop(&mut self) -> Result<(), AutoConnectError> {
        self.watcher.stop()?;
        Ok(())
    }

    /// Whether a device has been matched and adopted.
    pub fn matched(&self) -> bool {
        self.matched
    }

    /// Handle one discovery event. On the first exact name match, stops
    /// the watcher, builds and connects the device, and adopts it into
    /// `controller`. Returns whether an adoption happened.
    pub fn handle_discovered(
        &mut self,
        peripheral: &DiscoveredPeripheral,
        controller: &mut SessionController,
    ) -> Result<bool, AutoConnectError> {
        if self.matched || peripheral.name != self.settings.device_name {
            return Ok(false);
        }
        self.matched = true;
        self.watcher.stop()?;

        let mut device = self.factory.build(
            self.settings.revision,
            peripheral,
            self.settings.auth_key.as_deref(),
        )?;
        device.connect()?;
        controller.adopt(device);
        Ok(true)
    }

    /// Wait up to `timeout` for discovery events and handle them.
    /// Returns whether an adoption happened.
    pub fn pump(
        &mut self,
        controller: &mut SessionController,
        timeout: Duration,
    ) -> Result<bool, AutoConnectError> {
        let events = self.watcher.events();
        match events.recv_timeout(timeout) {
            Ok(peripheral) => {
                let mut adopted = self.handle_discovered(&peripheral, controller)?;
                // Drain whatever else is already queued.
                while let Ok(peripheral) = events.try_recv() {
                    adopted |= self.handle_discovered(&peripheral, controller)?;
                }
                Ok(adopted)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(false),
        }
    }
}
