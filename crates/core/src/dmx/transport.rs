use std::time::Duration;

use serialport::{DataBits, Parity, SerialPort, StopBits};

use crate::error::{LumenError, Result};

use super::frame::Frame;

/// DMX512 break duration, asserted line-low before every frame.
pub const DMX512_BREAK_US: u32 = 88;
/// Mark-after-break duration, asserted line-high after the break.
pub const DMX512_MAB_US: u32 = 12;
/// Serial baud rate DMX512 is specified at (8N2, 250 kbaud).
pub const DMX512_BAUD: u32 = 250_000;

pub trait DmxTransport: Send {
    /// Opens the transport. Returns whether the port is open; never panics
    /// on failure to connect — callers surface `PortUnavailable` instead.
    fn connect(&mut self) -> Result<bool>;

    /// Serializes and sends one DMX512 packet for the given universe: break,
    /// mark-after-break, then the 513-byte `[0x00, ch1..ch512]` buffer.
    fn send_frame(&mut self, universe: u8, frame: &Frame) -> Result<()>;

    fn enable(&mut self);
    fn disable(&mut self);
    fn is_enabled(&self) -> bool;
}

/// Serial-port implementation of [`DmxTransport`], driving an RS-485/DMX512
/// transceiver directly: assert break, release into mark-after-break, then
/// write the 513-byte packet at 250 kbaud, 8 data bits, no parity, 2 stop
/// bits. Only one universe is addressed per port.
pub struct SerialDmxTransport {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
    enabled: bool,
}

impl SerialDmxTransport {
    pub fn new(port_name: impl Into<String>) -> Self {
        Self { port_name: port_name.into(), port: None, enabled: true }
    }
}

impl DmxTransport for SerialDmxTransport {
    fn connect(&mut self) -> Result<bool> {
        let port = serialport::new(&self.port_name, DMX512_BAUD)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::Two)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| LumenError::PortUnavailable(e.to_string()))?;
        self.port = Some(port);
        Ok(true)
    }

    fn send_frame(&mut self, _universe: u8, frame: &Frame) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let Some(port) = &mut self.port else {
            return Err(LumenError::PortUnavailable("dmx transport not connected".into()));
        };

        let mut packet = [0u8; 513];
        packet[1..].copy_from_slice(frame);

        port.set_break().map_err(|e| LumenError::PortUnavailable(e.to_string()))?;
        std::thread::sleep(Duration::from_micros(DMX512_BREAK_US as u64));
        port.clear_break().map_err(|e| LumenError::PortUnavailable(e.to_string()))?;
        std::thread::sleep(Duration::from_micros(DMX512_MAB_US as u64));

        port.write_all(&packet).map_err(|e| LumenError::PortUnavailable(e.to_string()))?;
        Ok(())
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.port = None;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_timing_constants_match_dmx512() {
        assert_eq!(DMX512_BREAK_US, 88);
        assert_eq!(DMX512_MAB_US, 12);
        assert_eq!(DMX512_BAUD, 250_000);
    }

    #[test]
    fn disabled_transport_drops_sends_without_error() {
        let mut transport = SerialDmxTransport::new("/dev/ttyDMX0");
        transport.disable();
        let frame = [0u8; 512];
        assert!(transport.send_frame(0, &frame).is_ok());
    }

    #[test]
    fn send_without_connect_reports_port_unavailable() {
        let mut transport = SerialDmxTransport::new("/dev/ttyDMX0");
        let frame = [0u8; 512];
        let err = transport.send_frame(0, &frame).unwrap_err();
        assert!(matches!(err, LumenError::PortUnavailable(_)));
    }
}
