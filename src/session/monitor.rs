//! One run of heart-rate capture.
//!
//! A `MonitoringSession` binds the device's sample stream to the sinks
//! enabled at start time. It never owns the device; the controller
//! holds both and guarantees the session is torn down before the device
//! goes away.

use crate::device::{DeviceError, DeviceHandle, HeartRateSample};
use crate::output::{build_sinks, OutputSettings, OutputSink, SinkError};
use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use uuid::Uuid;

pub struct MonitoringSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    continuous: bool,
    samples: Receiver<HeartRateSample>,
    sinks: Vec<Box<dyn OutputSink>>,
    delivered: u64,
    dropped_writes: u64,
}

/// Errors opening a monitoring session.
#[derive(Debug)]
pub enum MonitorError {
    Device(DeviceError),
    Sink(SinkError),
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::Device(e) => write!(f, "Monitor device error: {e}"),
            MonitorError::Sink(e) => write!(f, "Monitor sink error: {e}"),
        }
    }
}

impl std::error::Error for MonitorError {}

impl From<DeviceError> for MonitorError {
    fn from(e: DeviceError) -> Self {
        MonitorError::Device(e)
    }
}

impl From<SinkError> for MonitorError {
    fn from(e: SinkError) -> Self {
        MonitorError::Sink(e)
    }
}

impl MonitoringSession {
    /// Build the enabled sinks, then ask the device to start emitting.
    ///
    /// Sinks are created first so a sink failure leaves the device
    /// untouched.
    pub fn open(
        device: &mut dyn DeviceHandle,
        continuous: bool,
        outputs: &OutputSettings,
    ) -> Result<Self, MonitorError> {
        let sinks = build_sinks(outputs)?;
        device.start_monitor(continuous)?;
        // Drop samples queued before this session existed.
        let samples = device.samples();
        while samples.try_recv().is_ok() {}
        Ok(Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            continuous,
            samples,
            sinks,
            delivered: 0,
            dropped_writes: 0,
        })
    }

    /// Deliver all pending samples to every sink, in sink order.
    /// Returns the number of samples delivered.
    pub fn pump(&mut self) -> usize {
        let mut count = 0;
        while let Ok(sample) = self.samples.try_recv() {
            for sink in &mut self.sinks {
                if sink.write(&sample).is_err() {
                    self.dropped_writes += 1;
                }
            }
            self.delivered += 1;
            count += 1;
        }
        count
    }

    /// Stop the device's monitor. Consumes the session; sinks are
    /// dropped with it, so the next start gets fresh instances.
    pub fn close(self, device: &mut dyn DeviceHandle) -> Result<(), DeviceError> {
        device.stop_monitor()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn continuous(&self) -> bool {
        self.continuous
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Labels of the active sinks, in construction order.
    pub fn sink_labels(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.label()).collect()
    }

    /// Samples delivered to sinks over the session so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Sink writes that failed and were skipped.
    pub fn dropped_writes(&self) -> u64 {
        self.dropped_writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::sim::SimDevice;
    use crate::device::DeviceStatus;

    fn authed_device() -> (SimDevice, crate::device::sim::SimDeviceDriver) {
        let (mut device, driver) = SimDevice::new("MiBand", "aa:bb:cc");
        device.connect().unwrap();
        driver.authenticate();
        assert_eq!(device.status(), DeviceStatus::OnlineAuth);
        (device, driver)
    }

    fn no_sinks() -> OutputSettings {
        OutputSettings {
            file: false,
            csv: false,
            osc: false,
            ..OutputSettings::default()
        }
    }

    #[test]
    fn test_open_starts_monitor() {
        let (mut device, _driver) = authed_device();
        let session = MonitoringSession::open(&mut device, true, &no_sinks()).unwrap();
        assert!(device.monitor_started());
        assert!(session.continuous());
        assert_eq!(session.sink_count(), 0);
    }

    #[test]
    fn test_pump_delivers_pending_samples() {
        let (mut device, driver) = authed_device();
        let mut session = MonitoringSession::open(&mut device, true, &no_sinks()).unwrap();

        assert!(driver.push_sample(70));
        assert!(driver.push_sample(71));
        assert_eq!(session.pump(), 2);
        assert_eq!(session.pump(), 0);
        assert_eq!(session.delivered(), 2);
    }

    #[test]
    fn test_close_stops_monitor() {
        let (mut device, _driver) = authed_device();
        let session = MonitoringSession::open(&mut device, true, &no_sinks()).unwrap();
        session.close(&mut device).unwrap();
        assert!(!device.monitor_started());
    }

    #[test]
    fn test_sessions_have_distinct_ids() {
        let (mut device, _driver) = authed_device();
        let first = MonitoringSession::open(&mut device, true, &no_sinks()).unwrap();
        let first_id = first.id();
        first.close(&mut device).unwrap();

        let second = MonitoringSession::open(&mut device, false, &no_sinks()).unwrap();
        assert_ne!(second.id(), first_id);
    }
}
