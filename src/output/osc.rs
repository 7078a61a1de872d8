//! OSC/UDP transmitter sink.
//!
//! Sends each bpm reading as a single OSC message with one int32
//! argument, the shape avatar runtimes (VRChat and friends) listen
//! for. Only this one fixed message is encoded; this is not a general
//! OSC implementation.

use crate::device::HeartRateSample;
use crate::output::{OutputSink, SinkError};
use std::net::UdpSocket;

pub struct OscSink {
    socket: UdpSocket,
    target: String,
    address: String,
}

impl OscSink {
    /// Bind a local UDP socket aimed at `target` (`host:port`).
    pub fn connect(target: &str, address: String) -> Result<Self, SinkError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| SinkError::Net(format!("bind: {e}")))?;
        Ok(Self {
            socket,
            target: target.to_string(),
            address,
        })
    }
}

impl OutputSink for OscSink {
    fn label(&self) -> &'static str {
        "osc"
    }

    fn write(&mut self, sample: &HeartRateSample) -> Result<(), SinkError> {
        let packet = encode_int_message(&self.address, i32::from(sample.bpm));
        self.socket
            .send_to(&packet, &self.target)
            .map_err(|e| SinkError::Net(format!("send to {}: {e}", self.target)))?;
        Ok(())
    }
}

/// Encode an OSC message carrying a single int32 argument.
///
/// Layout: padded address string, padded type-tag string `,i`, then the
/// big-endian value. All fields pad to 4-byte boundaries.
fn encode_int_message(address: &str, value: i32) -> Vec<u8> {
    let mut packet = Vec::with_capacity(address.len() + 12);
    push_padded_str(&mut packet, address);
    push_padded_str(&mut packet, ",i");
    packet.extend_from_slice(&value.to_be_bytes());
    packet
}

fn push_padded_str(packet: &mut Vec<u8>, s: &str) {
    packet.extend_from_slice(s.as_bytes());
    // NUL terminator plus padding to the next 4-byte boundary.
    let pad = 4 - (s.len() % 4);
    packet.extend(std::iter::repeat(0u8).take(pad));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_alignment() {
        let packet = encode_int_message("/avatar/parameters/HR", 72);
        assert_eq!(packet.len() % 4, 0);
        assert!(packet.starts_with(b"/avatar/parameters/HR\0"));
        assert_eq!(&packet[packet.len() - 4..], &72i32.to_be_bytes());
    }

    #[test]
    fn test_encode_type_tag() {
        let packet = encode_int_message("/hr", 1);
        // "/hr\0" then ",i\0\0" then the value.
        assert_eq!(&packet[0..4], b"/hr\0");
        assert_eq!(&packet[4..8], b",i\0\0");
        assert_eq!(packet.len(), 12);
    }

    #[test]
    fn test_send_to_local_listener() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        let target = listener.local_addr().unwrap().to_string();

        let mut sink = OscSink::connect(&target, "/hr".to_string()).unwrap();
        sink.write(&HeartRateSample::new(99)).unwrap();

        let mut buf = [0u8; 64];
        listener
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();
        let (len, _) = listener.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], encode_int_message("/hr", 99).as_slice());
    }
}
