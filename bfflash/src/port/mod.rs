//! Port abstraction for serial communication with radios.
//!
//! The protocol drivers are written against the [`Port`] trait so they can
//! be exercised with mock ports in tests; the `native` feature provides the
//! [`serialport`]-backed implementation used by the CLI.
//!
//! Two line disciplines exist in this family:
//!
//! - UV-5R clone protocol: 9600 baud, 8N1, RTS/CTS hardware flow control.
//! - UV-17 / DM-32UV protocols: 115200 baud, 8N1, no flow control.
//!
//! Both assert DTR and RTS high when the port opens.

#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read/write timeout.
    pub timeout: Duration,
    /// Flow control (hardware for the UV-5R family, none otherwise).
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 115200,
            timeout: Duration::from_millis(1500),
            flow_control: FlowControl::None,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the flow control mode.
    #[must_use]
    pub fn with_flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// Hardware flow control (RTS/CTS).
    Hardware,
}

/// Serial port information, as reported by enumeration.
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
}

/// Unified port trait for serial communication.
///
/// Data bits, parity, and stop bits are fixed at 8N1 for every protocol in
/// this family, so only baud, timeout, flow control, and the DTR/RTS lines
/// are configurable.
pub trait Port: Read + Write + Send {
    /// Set the read/write timeout.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Get the current timeout.
    fn timeout(&self) -> Duration;

    /// Get the current baud rate.
    fn baud_rate(&self) -> u32;

    /// Discard anything pending in the input/output buffers.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Set DTR and RTS pin states together.
    fn set_control_lines(&mut self, dtr: bool, rts: bool) -> Result<()>;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes and flush, failing if fewer bytes are accepted.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }

    /// Drain and discard any stale bytes in the receive buffer.
    ///
    /// Runs with a very short timeout so a silent line returns quickly.
    /// Call before any handshake. Returns the number of bytes discarded.
    fn drain(&mut self) -> Result<usize> {
        let previous = self.timeout();
        self.set_timeout(DRAIN_TIMEOUT)?;

        let mut junk = 0usize;
        let mut buf = [0u8; 256];
        loop {
            match self.read(&mut buf) {
                Ok(0) => break,
                Ok(m) => junk += m,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => {
                    self.set_timeout(previous)?;
                    return Err(crate::error::Error::Io(e));
                }
            }
        }

        self.set_timeout(previous)?;
        if junk > 0 {
            log::debug!("Drained {junk} stale byte(s)");
        }
        Ok(junk)
    }
}

/// Timeout used by [`Port::drain`] to collect stale bytes.
pub const DRAIN_TIMEOUT: Duration = Duration::from_millis(5);

/// Port stand-in for simulate/dry-run flows that must never reach a
/// device. Any actual I/O attempt fails.
#[derive(Debug, Default)]
pub struct NullPort;

impl Read for NullPort {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "null port",
        ))
    }
}

impl Write for NullPort {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "null port",
        ))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Port for NullPort {
    fn set_timeout(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::ZERO
    }

    fn baud_rate(&self) -> u32 {
        0
    }

    fn clear_buffers(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }

    fn set_control_lines(&mut self, _dtr: bool, _rts: bool) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn drain(&mut self) -> Result<usize> {
        Ok(0)
    }
}

/// Trait for listing available serial ports.
///
/// Separated from `Port` because it is a static operation that does not
/// require an open port instance.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>>;
}

#[cfg(feature = "native")]
pub use native::{NativePort, NativePortEnumerator};
