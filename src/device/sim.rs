//! Simulated device backend.
//!
//! This exists so the crate (and binary) can compile and run on any
//! machine without a wireless transport or real hardware. A
//! [`SimDevice`] implements the full [`DeviceHandle`] surface; its
//! paired [`SimDeviceDriver`] plays the role of the remote end,
//! advancing the auth handshake, dropping the link, and emitting
//! samples.

use crate::device::types::{DeviceEvent, DeviceStatus, HeartRateSample};
use crate::device::{DeviceError, DeviceFactory, DeviceHandle, DeviceRevision};
use crate::discovery::DiscoveredPeripheral;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct SimShared {
    status: Mutex<DeviceStatus>,
    monitor_started: AtomicBool,
    connect_requests: AtomicUsize,
    event_tx: Sender<DeviceEvent>,
    sample_tx: Sender<HeartRateSample>,
}

impl SimShared {
    fn set_status(&self, status: DeviceStatus) {
        {
            let mut current = self.status.lock().unwrap();
            if *current == status {
                return;
            }
            *current = status;
        }
        if !status.is_online() && self.monitor_started.swap(false, Ordering::SeqCst) {
            let _ = self.event_tx.try_send(DeviceEvent::MonitorStarted(false));
        }
        let _ = self.event_tx.try_send(DeviceEvent::Status(status));
    }

    fn status(&self) -> DeviceStatus {
        *self.status.lock().unwrap()
    }
}

/// A simulated wearable.
pub struct SimDevice {
    name: String,
    address: String,
    shared: Arc<SimShared>,
    event_rx: Receiver<DeviceEvent>,
    sample_rx: Receiver<HeartRateSample>,
}

impl SimDevice {
    /// Create a device/driver pair.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> (Self, SimDeviceDriver) {
        let (event_tx, event_rx) = bounded(256);
        let (sample_tx, sample_rx) = bounded(1024);
        let shared = Arc::new(SimShared {
            status: Mutex::new(DeviceStatus::Offline),
            monitor_started: AtomicBool::new(false),
            connect_requests: AtomicUsize::new(0),
            event_tx,
            sample_tx,
        });
        let device = Self {
            name: name.into(),
            address: address.into(),
            shared: shared.clone(),
            event_rx,
            sample_rx,
        };
        (
            device,
            SimDeviceDriver {
                shared,
                revision: None,
                has_auth_key: false,
            },
        )
    }
}

impl DeviceHandle for SimDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn status(&self) -> DeviceStatus {
        self.shared.status()
    }

    fn monitor_started(&self) -> bool {
        self.shared.monitor_started.load(Ordering::SeqCst)
    }

    fn connect(&mut self) -> Result<(), DeviceError> {
        self.shared.connect_requests.fetch_add(1, Ordering::SeqCst);
        // The simulated link comes up immediately; auth is advanced by
        // the driver, as it would be by the real handshake completing.
        self.shared.set_status(DeviceStatus::OnlineUnauth);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), DeviceError> {
        self.shared.set_status(DeviceStatus::Offline);
        Ok(())
    }

    fn start_monitor(&mut self, _continuous: bool) -> Result<(), DeviceError> {
        if self.shared.status() != DeviceStatus::OnlineAuth {
            return Err(DeviceError::NotConnected);
        }
        if self.shared.monitor_started.swap(true, Ordering::SeqCst) {
            return Err(DeviceError::AlreadyMonitoring);
        }
        let _ = self.shared.event_tx.try_send(DeviceEvent::MonitorStarted(true));
        Ok(())
    }

    fn stop_monitor(&mut self) -> Result<(), DeviceError> {
        if self.shared.monitor_started.swap(false, Ordering::SeqCst) {
            let _ = self
                .shared
                .event_tx
                .try_send(DeviceEvent::MonitorStarted(false));
        }
        Ok(())
    }

    fn events(&self) -> Receiver<DeviceEvent> {
        self.event_rx.clone()
    }

    fn samples(&self) -> Receiver<HeartRateSample> {
        self.sample_rx.clone()
    }
}

/// Remote end of a [`SimDevice`]: scripts what the hardware would do.
#[derive(Clone)]
pub struct SimDeviceDriver {
    shared: Arc<SimShared>,
    revision: Option<DeviceRevision>,
    has_auth_key: bool,
}

impl SimDeviceDriver {
    /// Bring the transport link up, as a connect request completing
    /// asynchronously would.
    pub fn complete_connect(&self) {
        if self.shared.status() == DeviceStatus::Offline {
            self.shared.set_status(DeviceStatus::OnlineUnauth);
        }
    }

    /// Complete the auth handshake.
    pub fn authenticate(&self) {
        if self.shared.status() == DeviceStatus::OnlineUnauth {
            self.shared.set_status(DeviceStatus::OnlineAuth);
        }
    }

    /// Drop the transport link without a disconnect request, as a radio
    /// dropout would.
    pub fn drop_link(&self) {
        self.shared.set_status(DeviceStatus::Offline);
    }

    /// Emit a heart-rate sample. Silently dropped unless the monitor is
    /// running.
    pub fn push_sample(&self, bpm: u16) -> bool {
        if !self.shared.monitor_started.load(Ordering::SeqCst) {
            return false;
        }
        self.shared
            .sample_tx
            .try_send(HeartRateSample::new(bpm))
            .is_ok()
    }

    /// Number of connect requests issued to this device so far.
    pub fn connect_requests(&self) -> usize {
        self.shared.connect_requests.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> DeviceStatus {
        self.shared.status()
    }

    /// Revision family the factory built this device as, when it came
    /// from a [`SimDeviceFactory`].
    pub fn revision(&self) -> Option<DeviceRevision> {
        self.revision
    }

    /// Whether an auth key was supplied at construction.
    pub fn has_auth_key(&self) -> bool {
        self.has_auth_key
    }
}

/// Factory producing [`SimDevice`]s, handing each driver out on a
/// channel so the embedding loop (or a test) can play the remote end.
pub struct SimDeviceFactory {
    drivers: Sender<SimDeviceDriver>,
}

impl SimDeviceFactory {
    /// Create a factory and the receiver its drivers arrive on.
    pub fn new() -> (Self, Receiver<SimDeviceDriver>) {
        let (drivers, rx) = bounded(16);
        (Self { drivers }, rx)
    }
}

impl DeviceFactory for SimDeviceFactory {
    fn build(
        &self,
        revision: DeviceRevision,
        peripheral: &DiscoveredPeripheral,
        auth_key: Option<&str>,
    ) -> Result<Box<dyn DeviceHandle>, DeviceError> {
        if revision.requires_auth_key() && auth_key.map_or(true, str::is_empty) {
            return Err(DeviceError::AuthKeyRequired);
        }
        let (device, mut driver) = SimDevice::new(&peripheral.name, &peripheral.address);
        driver.revision = Some(revision);
        driver.has_auth_key = auth_key.is_some();
        let _ = self.drivers.try_send(driver);
        Ok(Box::new(device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_then_authenticate() {
        let (mut device, driver) = SimDevice::new("MiBand", "aa:bb:cc");
        let events = device.events();

        assert_eq!(device.status(), DeviceStatus::Offline);
        device.connect().unwrap();
        assert_eq!(device.status(), DeviceStatus::OnlineUnauth);
        driver.authenticate();
        assert_eq!(device.status(), DeviceStatus::OnlineAuth);

        assert_eq!(
            events.try_recv().unwrap(),
            DeviceEvent::Status(DeviceStatus::OnlineUnauth)
        );
        assert_eq!(
            events.try_recv().unwrap(),
            DeviceEvent::Status(DeviceStatus::OnlineAuth)
        );
    }

    #[test]
    fn test_monitor_requires_auth() {
        let (mut device, driver) = SimDevice::new("MiBand", "aa:bb:cc");
        assert!(matches!(
            device.start_monitor(true),
            Err(DeviceError::NotConnected)
        ));

        device.connect().unwrap();
        driver.authenticate();
        device.start_monitor(true).unwrap();
        assert!(device.monitor_started());
        assert!(matches!(
            device.start_monitor(true),
            Err(DeviceError::AlreadyMonitoring)
        ));
    }

    #[test]
    fn test_samples_only_while_monitoring() {
        let (mut device, driver) = SimDevice::new("MiBand", "aa:bb:cc");
        device.connect().unwrap();
        driver.authenticate();

        assert!(!driver.push_sample(70));

        device.start_monitor(true).unwrap();
        assert!(driver.push_sample(71));
        assert_eq!(device.samples().try_recv().unwrap().bpm, 71);
    }

    #[test]
    fn test_link_drop_stops_monitor() {
        let (mut device, driver) = SimDevice::new("MiBand", "aa:bb:cc");
        device.connect().unwrap();
        driver.authenticate();
        device.start_monitor(true).unwrap();

        driver.drop_link();
        assert!(!device.monitor_started());
        assert_eq!(device.status(), DeviceStatus::Offline);
    }

    #[test]
    fn test_factory_requires_key_for_band4() {
        let (factory, drivers) = SimDeviceFactory::new();
        let peripheral = DiscoveredPeripheral::new("MiBand", "aa:bb:cc");

        assert!(matches!(
            factory.build(DeviceRevision::Band4, &peripheral, None),
            Err(DeviceError::AuthKeyRequired)
        ));

        let device = factory
            .build(DeviceRevision::Band4, &peripheral, Some("abc"))
            .unwrap();
        assert_eq!(device.name(), "MiBand");

        let driver = drivers.try_recv().unwrap();
        assert_eq!(driver.revision(), Some(DeviceRevision::Band4));
        assert!(driver.has_auth_key());
    }
}
