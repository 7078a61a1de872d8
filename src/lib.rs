//! Pulselink - session agent for wearable heart-rate devices.
//!
//! This library manages the lifecycle of a connection to a wearable
//! heart-rate device and distributes live samples to pluggable output
//! sinks while the monitor is active.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Pulselink                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐    ┌──────────────┐    ┌──────────────────┐  │
//! │  │ Discovery  │──▶│ AutoConnect   │──▶│ SessionController │  │
//! │  │  Watcher   │    │    Flow      │    │ (state machine,  │  │
//! │  └────────────┘    └──────────────┘    │ reconnect guard) │  │
//! │                                        └────────┬─────────┘  │
//! │                                                 │            │
//! │  ┌──────────────┐    samples    ┌───────────────▼─────────┐  │
//! │  │ DeviceHandle │──────────────▶│    MonitoringSession    │  │
//! │  └──────────────┘               │ file → csv → osc sinks  │  │
//! │                                 └─────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pulselink::device::sim::SimDevice;
//! use pulselink::device::DeviceHandle;
//! use pulselink::output::OutputSettings;
//! use pulselink::session::SessionController;
//!
//! let mut controller = SessionController::new(true, OutputSettings::default());
//!
//! let (mut device, driver) = SimDevice::new("MiBand", "aa:bb:cc:dd:ee:ff");
//! device.connect().expect("connect request failed");
//! controller.adopt(Box::new(device));
//!
//! driver.authenticate();
//! controller.drain_events().expect("event handling failed");
//! controller.start_monitoring().expect("start failed");
//! ```

pub mod autoconnect;
pub mod config;
pub mod device;
pub mod discovery;
pub mod output;
pub mod session;

// Re-export key types at crate root for convenience
pub use autoconnect::{AutoConnectError, AutoConnectFlow, AutoConnectSettings};
pub use config::{AutoConnectConfig, Config, ConfigError};
pub use device::{
    DeviceError, DeviceEvent, DeviceFactory, DeviceHandle, DeviceRevision, DeviceStatus,
    HeartRateSample,
};
pub use discovery::{DiscoveredPeripheral, DiscoveryError, DiscoveryWatcher};
pub use output::{OutputSettings, OutputSink, SinkError};
pub use session::{ActionAvailability, MonitoringSession, SessionController, SessionError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
