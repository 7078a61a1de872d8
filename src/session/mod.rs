//! Device session controller.
//!
//! Owns the adopted device handle, projects its status into a
//! `connected` flag and a human-readable status line, runs the
//! auto-reconnect guard, and manages the monitoring session with its
//! output sinks. All state changes are driven by [`DeviceEvent`]s
//! funneled through [`SessionController::handle_event`], one at a time;
//! the controller never polls the device.

pub mod monitor;

pub use monitor::{MonitorError, MonitoringSession};

use crate::device::{DeviceError, DeviceEvent, DeviceHandle, DeviceStatus};
use crate::output::OutputSettings;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::Duration;

const NO_DEVICE_TEXT: &str = "No device connected";

/// Errors from session actions.
#[derive(Debug)]
pub enum SessionError {
    /// A gated action was invoked while its precondition did not hold.
    InvalidState(&'static str),
    Device(DeviceError),
    Monitor(MonitorError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidState(msg) => write!(f, "Invalid state: {msg}"),
            SessionError::Device(e) => write!(f, "Device error: {e}"),
            SessionError::Monitor(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<DeviceError> for SessionError {
    fn from(e: DeviceError) -> Self {
        SessionError::Device(e)
    }
}

impl From<MonitorError> for SessionError {
    fn from(e: MonitorError) -> Self {
        SessionError::Monitor(e)
    }
}

/// Availability snapshot for the four gated actions. Recomputed by
/// observers after every [`SessionController::epoch`] bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionAvailability {
    pub connect: bool,
    pub disconnect: bool,
    pub start: bool,
    pub stop: bool,
}

pub struct SessionController {
    device: Option<Box<dyn DeviceHandle>>,
    events: Option<Receiver<DeviceEvent>>,
    session: Option<MonitoringSession>,
    /// Reconnect latch: set while online, cleared pre-emptively by the
    /// explicit disconnect path. If it is still set when an Offline
    /// status is observed, the drop was unexpected and a reconnect is
    /// issued on the same handle.
    was_online: bool,
    connected: bool,
    status_text: String,
    epoch: u64,
    continuous_mode: bool,
    outputs: OutputSettings,
}

impl SessionController {
    pub fn new(continuous_mode: bool, outputs: OutputSettings) -> Self {
        Self {
            device: None,
            events: None,
            session: None,
            was_online: false,
            connected: false,
            status_text: NO_DEVICE_TEXT.to_string(),
            epoch: 0,
            continuous_mode,
            outputs,
        }
    }

    // ---- observed surface -------------------------------------------------

    /// True iff a device is adopted and its status is not Offline.
    pub fn connected(&self) -> bool {
        self.connected
    }

    /// One of the three fixed status forms.
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Monotonic counter bumped after every state transition. Observers
    /// re-read [`SessionController::actions`] when it changes.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device.as_deref().map(|d| d.name())
    }

    pub fn device_status(&self) -> Option<DeviceStatus> {
        self.device.as_deref().map(|d| d.status())
    }

    pub fn session(&self) -> Option<&MonitoringSession> {
        self.session.as_ref()
    }

    pub fn actions(&self) -> ActionAvailability {
        ActionAvailability {
            connect: self.can_connect(),
            disconnect: self.can_disconnect(),
            start: self.can_start(),
            stop: self.can_stop(),
        }
    }

    pub fn can_connect(&self) -> bool {
        match self.device.as_deref() {
            None => true,
            Some(d) => d.status() == DeviceStatus::Offline,
        }
    }

    pub fn can_disconnect(&self) -> bool {
        matches!(self.device.as_deref(), Some(d) if d.status().is_online())
    }

    pub fn can_start(&self) -> bool {
        self.session.is_none()
            && matches!(
                self.device.as_deref(),
                Some(d) if d.status() == DeviceStatus::OnlineAuth && !d.monitor_started()
            )
    }

    pub fn can_stop(&self) -> bool {
        self.session.is_some()
    }

    // ---- device adoption --------------------------------------------------

    /// Adopt a device handle, replacing (and releasing) any previous
    /// one. The controller subscribes to the new handle's events.
    pub fn adopt(&mut self, device: Box<dyn DeviceHandle>) {
        self.release_current();
        self.events = Some(device.events());
        self.device = Some(device);
        self.refresh();
    }

    /// Drop the adopted device, releasing its transport resources.
    pub fn clear_device(&mut self) {
        self.release_current();
        self.refresh();
    }

    /// Tear down the session (if any), disconnect and drop the current
    /// handle, and unsubscribe from its events.
    fn release_current(&mut self) {
        self.force_stop_session();
        self.events = None;
        if let Some(mut device) = self.device.take() {
            let _ = device.disconnect();
        }
    }

    /// Session teardown that must not fail: drops the sinks and asks
    /// the device to stop emitting, ignoring transport errors (the link
    /// may already be gone).
    fn force_stop_session(&mut self) {
        if let Some(session) = self.session.take() {
            if let Some(device) = self.device.as_deref_mut() {
                let _ = session.close(device);
            }
        }
    }

    // ---- event handling ---------------------------------------------------

    /// Process one device event to completion. This is the single
    /// serialization point: callers must not interleave invocations.
    pub fn handle_event(&mut self, event: DeviceEvent) -> Result<(), SessionError> {
        match event {
            DeviceEvent::Status(status) => {
                if status == DeviceStatus::Offline {
                    // The session cannot outlive the link.
                    self.force_stop_session();
                }
                self.refresh();

                if status.is_online() {
                    self.was_online = true;
                } else if self.was_online {
                    // Link dropped while online with no explicit
                    // disconnect: reconnect the same handle once.
                    self.was_online = false;
                    if let Some(device) = self.device.as_deref_mut() {
                        device.connect()?;
                    }
                }
            }
            DeviceEvent::MonitorStarted(_) => {
                self.bump_epoch();
            }
        }
        Ok(())
    }

    /// Wait up to `timeout` for one event and handle it. Returns
    /// whether an event was handled.
    pub fn poll(&mut self, timeout: Duration) -> Result<bool, SessionError> {
        let Some(events) = self.events.clone() else {
            return Ok(false);
        };
        match events.recv_timeout(timeout) {
            Ok(event) => {
                self.handle_event(event)?;
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(false),
        }
    }

    /// Handle every queued event. Returns the number handled.
    pub fn drain_events(&mut self) -> Result<usize, SessionError> {
        let Some(events) = self.events.clone() else {
            return Ok(0);
        };
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle_event(event)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Deliver pending samples to the active session's sinks.
    pub fn pump_samples(&mut self) -> usize {
        self.session.as_mut().map_or(0, MonitoringSession::pump)
    }

    // ---- gated actions ----------------------------------------------------

    /// Explicit disconnect: clears the reconnect latch before the
    /// Offline transition can fire, then releases the device.
    pub fn disconnect(&mut self) -> Result<(), SessionError> {
        if !self.can_disconnect() {
            return Err(SessionError::InvalidState(
                "disconnect requires an online device",
            ));
        }
        self.was_online = false;
        self.release_current();
        self.refresh();
        Ok(())
    }

    /// Open a monitoring session with the configured continuous flag
    /// and one sink per enabled output toggle.
    pub fn start_monitoring(&mut self) -> Result<(), SessionError> {
        if !self.can_start() {
            return Err(SessionError::InvalidState(
                "monitoring requires an authenticated device and no active session",
            ));
        }
        let continuous = self.continuous_mode;
        let device = self
            .device
            .as_deref_mut()
            .ok_or(SessionError::InvalidState("no device adopted"))?;
        let session = MonitoringSession::open(device, continuous, &self.outputs)?;
        self.session = Some(session);
        self.bump_epoch();
        Ok(())
    }

    /// Stop the active session and drop all of its sinks.
    pub fn stop_monitoring(&mut self) -> Result<(), SessionError> {
        let session = self
            .session
            .take()
            .ok_or(SessionError::InvalidState("no active monitoring session"))?;
        let result = match self.device.as_deref_mut() {
            Some(device) => session.close(device).map_err(SessionError::from),
            None => Ok(()),
        };
        self.bump_epoch();
        result
    }

    // ---- derived state ----------------------------------------------------

    fn refresh(&mut self) {
        let (connected, text) = match self.device.as_deref() {
            None => (false, NO_DEVICE_TEXT.to_string()),
            Some(device) => match device.status() {
                DeviceStatus::Offline => (false, NO_DEVICE_TEXT.to_string()),
                DeviceStatus::OnlineUnauth => {
                    (true, format!("Connected to {} | Not auth", device.name()))
                }
                DeviceStatus::OnlineAuth => {
                    (true, format!("Connected to {} | Auth", device.name()))
                }
            },
        };
        self.connected = connected;
        self.status_text = text;
        self.bump_epoch();
    }

    fn bump_epoch(&mut self) {
        self.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::sim::{SimDevice, SimDeviceDriver};

    fn no_sinks() -> OutputSettings {
        OutputSettings {
            file: false,
            csv: false,
            osc: false,
            ..OutputSettings::default()
        }
    }

    fn controller() -> SessionController {
        SessionController::new(true, no_sinks())
    }

    /// Adopt a connected (unauthenticated) sim device and drain the
    /// adoption events.
    fn adopt_connected(ctl: &mut SessionController, name: &str) -> SimDeviceDriver {
        let (mut device, driver) = SimDevice::new(name, "aa:bb:cc");
        device.connect().unwrap();
        ctl.adopt(Box::new(device));
        ctl.drain_events().unwrap();
        driver
    }

    #[test]
    fn test_initial_state() {
        let ctl = controller();
        assert!(!ctl.connected());
        assert_eq!(ctl.status_text(), "No device connected");
        let actions = ctl.actions();
        assert!(actions.connect);
        assert!(!actions.disconnect);
        assert!(!actions.start);
        assert!(!actions.stop);
    }

    #[test]
    fn test_connected_tracks_status() {
        let mut ctl = controller();
        let driver = adopt_connected(&mut ctl, "MiBand");
        assert!(ctl.connected());

        driver.authenticate();
        ctl.drain_events().unwrap();
        assert!(ctl.connected());

        driver.drop_link();
        ctl.drain_events().unwrap();
        assert!(!ctl.connected());
    }

    #[test]
    fn test_status_text_sequence() {
        let mut ctl = controller();
        let (device, driver) = SimDevice::new("MiBand", "aa:bb:cc");
        ctl.adopt(Box::new(device));
        // Adopted while offline: still the no-device form.
        assert_eq!(ctl.status_text(), "No device connected");

        driver.complete_connect();
        ctl.drain_events().unwrap();
        assert_eq!(ctl.status_text(), "Connected to MiBand | Not auth");

        driver.authenticate();
        ctl.drain_events().unwrap();
        assert_eq!(ctl.status_text(), "Connected to MiBand | Auth");
    }

    #[test]
    fn test_reconnect_on_unexpected_drop() {
        let mut ctl = controller();
        let driver = adopt_connected(&mut ctl, "MiBand");
        driver.authenticate();
        ctl.drain_events().unwrap();
        assert_eq!(driver.connect_requests(), 1);

        driver.drop_link();
        ctl.drain_events().unwrap();

        // Exactly one reconnect was issued on the same handle.
        assert_eq!(driver.connect_requests(), 2);
        assert_eq!(driver.status(), DeviceStatus::OnlineUnauth);
    }

    #[test]
    fn test_no_reconnect_after_explicit_disconnect() {
        let mut ctl = controller();
        let driver = adopt_connected(&mut ctl, "MiBand");
        driver.authenticate();
        ctl.drain_events().unwrap();

        ctl.disconnect().unwrap();
        assert_eq!(driver.status(), DeviceStatus::Offline);
        assert_eq!(driver.connect_requests(), 1);
        assert!(!ctl.connected());
        assert_eq!(ctl.status_text(), "No device connected");
    }

    #[test]
    fn test_disconnect_requires_online_device() {
        let mut ctl = controller();
        assert!(matches!(
            ctl.disconnect(),
            Err(SessionError::InvalidState(_))
        ));
    }

    #[test]
    fn test_start_rejected_before_auth() {
        let mut ctl = controller();
        let _driver = adopt_connected(&mut ctl, "MiBand");
        assert!(matches!(
            ctl.start_monitoring(),
            Err(SessionError::InvalidState(_))
        ));
        assert!(ctl.session().is_none());
    }

    #[test]
    fn test_start_and_stop_monitoring() {
        let mut ctl = controller();
        let driver = adopt_connected(&mut ctl, "MiBand");
        driver.authenticate();
        ctl.drain_events().unwrap();

        ctl.start_monitoring().unwrap();
        assert!(ctl.actions().stop);
        assert!(!ctl.actions().start);
        let first_id = ctl.session().unwrap().id();

        assert!(driver.push_sample(70));
        assert!(driver.push_sample(72));
        assert_eq!(ctl.pump_samples(), 2);

        ctl.stop_monitoring().unwrap();
        ctl.drain_events().unwrap();
        assert!(ctl.session().is_none());

        // A new start creates a fresh session (and fresh sinks).
        ctl.start_monitoring().unwrap();
        assert_ne!(ctl.session().unwrap().id(), first_id);
    }

    #[test]
    fn test_stop_without_session_is_invalid() {
        let mut ctl = controller();
        assert!(matches!(
            ctl.stop_monitoring(),
            Err(SessionError::InvalidState(_))
        ));
    }

    #[test]
    fn test_disconnect_force_stops_session() {
        let mut ctl = controller();
        let driver = adopt_connected(&mut ctl, "MiBand");
        driver.authenticate();
        ctl.drain_events().unwrap();
        ctl.start_monitoring().unwrap();

        ctl.disconnect().unwrap();
        assert!(ctl.session().is_none());
        assert_eq!(driver.status(), DeviceStatus::Offline);
    }

    #[test]
    fn test_link_drop_tears_down_session() {
        let mut ctl = controller();
        let driver = adopt_connected(&mut ctl, "MiBand");
        driver.authenticate();
        ctl.drain_events().unwrap();
        ctl.start_monitoring().unwrap();

        driver.drop_link();
        ctl.drain_events().unwrap();
        assert!(ctl.session().is_none());
        // Reconnect guard still fired for the unexpected drop.
        assert_eq!(driver.connect_requests(), 2);
    }

    #[test]
    fn test_adopt_replaces_previous_device() {
        let mut ctl = controller();
        let old_driver = adopt_connected(&mut ctl, "OldBand");
        assert!(ctl.connected());

        let new_driver = adopt_connected(&mut ctl, "NewBand");
        assert_eq!(old_driver.status(), DeviceStatus::Offline);
        assert_eq!(ctl.device_name(), Some("NewBand"));
        assert_eq!(new_driver.status(), DeviceStatus::OnlineUnauth);
    }

    #[test]
    fn test_epoch_bumps_on_transitions() {
        let mut ctl = controller();
        let before = ctl.epoch();
        let driver = adopt_connected(&mut ctl, "MiBand");
        let after_adopt = ctl.epoch();
        assert!(after_adopt > before);

        driver.authenticate();
        ctl.drain_events().unwrap();
        assert!(ctl.epoch() > after_adopt);
    }
}
