//! Advertisement scanning for nearby peripherals.
//!
//! `DiscoveryWatcher` wraps the transport's scan API: start it, receive
//! discovered-peripheral events on a channel, stop it. Stopping is
//! idempotent; whether late events are acted upon is decided by the
//! consumer (the auto-connect flow keeps its own first-match latch).

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A peripheral seen in an advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeripheral {
    /// Advertised display name
    pub name: String,
    /// Transport address
    pub address: String,
}

impl DiscoveredPeripheral {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Errors from the discovery watcher.
#[derive(Debug)]
pub enum DiscoveryError {
    /// The watcher is already scanning.
    AlreadyRunning,
    /// Transport-level scan failure.
    Transport(String),
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::AlreadyRunning => write!(f, "Discovery watcher is already running"),
            DiscoveryError::Transport(msg) => write!(f, "Discovery transport error: {msg}"),
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// Capability set over transport-level advertisement scanning.
pub trait DiscoveryWatcher {
    /// Start scanning for advertisements.
    fn start(&mut self) -> Result<(), DiscoveryError>;

    /// Stop scanning. Idempotent; stopping a stopped watcher is a no-op.
    fn stop(&mut self) -> Result<(), DiscoveryError>;

    /// Whether the watcher is currently scanning.
    fn is_running(&self) -> bool;

    /// Discovered-peripheral notifications.
    fn events(&self) -> Receiver<DiscoveredPeripheral>;
}

/// A simulated watcher fed by a [`SimAdvertiser`] instead of a radio.
///
/// Fills the same role as the crate's simulated device backend: tests
/// and the demo path script advertisements through the advertiser
/// handle, and the watcher behaves like a real scan (events are only
/// delivered while it is running).
pub struct SimDiscovery {
    running: Arc<AtomicBool>,
    receiver: Receiver<DiscoveredPeripheral>,
}

/// Driver side of a [`SimDiscovery`]: injects advertisements.
#[derive(Clone)]
pub struct SimAdvertiser {
    running: Arc<AtomicBool>,
    sender: Sender<DiscoveredPeripheral>,
}

impl SimDiscovery {
    /// Create a watcher/advertiser pair.
    pub fn new() -> (Self, SimAdvertiser) {
        let (sender, receiver) = bounded(256);
        let running = Arc::new(AtomicBool::new(false));
        (
            Self {
                running: running.clone(),
                receiver,
            },
            SimAdvertiser { running, sender },
        )
    }
}

impl DiscoveryWatcher for SimDiscovery {
    fn start(&mut self) -> Result<(), DiscoveryError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(DiscoveryError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DiscoveryError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn events(&self) -> Receiver<DiscoveredPeripheral> {
        self.receiver.clone()
    }
}

impl SimAdvertiser {
    /// Advertise a peripheral. Dropped silently when the watcher is not
    /// scanning, like a radio nobody is listening to.
    pub fn advertise(&self, peripheral: DiscoveredPeripheral) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        self.sender.try_send(peripheral).is_ok()
    }
}
