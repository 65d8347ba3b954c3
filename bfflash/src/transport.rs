//! Transport helpers shared by every protocol driver.
//!
//! [`TransportExt`] adds deadline-based exact reads, stream scanning, and
//! paced writes on top of the raw [`Port`] byte I/O. `read_exact_timeout`
//! either returns exactly the requested bytes or fails with
//! [`Error::Timeout`]; a partial read is never silently truncated.

use std::io::ErrorKind;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::port::Port;

/// ACK byte shared by every protocol in this family.
pub const ACK: u8 = 0x06;

/// Extension methods over [`Port`] used by the protocol state machines.
pub trait TransportExt: Port {
    /// Read exactly `n` bytes, failing with `Timeout` once `timeout` has
    /// elapsed without the full count arriving.
    fn read_exact_timeout(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::with_capacity(n);
        let mut buf = [0u8; 256];

        while out.len() < n {
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!(
                    "reading {n} bytes (got {})",
                    out.len()
                )));
            }
            let want = (n - out.len()).min(buf.len());
            match self.read(&mut buf[..want]) {
                Ok(0) => thread::sleep(Duration::from_millis(1)),
                Ok(m) => out.extend_from_slice(&buf[..m]),
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }

        trace!("<<< {}", hex(&out));
        Ok(out)
    }

    /// Read a single byte within `timeout`.
    fn read_byte(&mut self, timeout: Duration) -> Result<u8> {
        Ok(self.read_exact_timeout(1, timeout)?[0])
    }

    /// Discard stream bytes until `wanted` appears.
    ///
    /// Up to `max_scan` bytes are examined; empty reads keep waiting until
    /// `deadline` elapses. Used to resynchronise on a frame start byte when
    /// the radio emits noise between phases.
    fn read_until_byte(&mut self, wanted: u8, max_scan: usize, deadline: Duration) -> Result<()> {
        let end = Instant::now() + deadline;
        let mut scanned = 0usize;
        let mut buf = [0u8; 1];

        while scanned < max_scan {
            if Instant::now() >= end {
                return Err(Error::Timeout(format!(
                    "waiting for byte 0x{wanted:02X} (scanned {scanned})"
                )));
            }
            match self.read(&mut buf) {
                Ok(1) => {
                    scanned += 1;
                    if buf[0] == wanted {
                        if scanned > 1 {
                            debug!("Discarded {} noise byte(s) before 0x{wanted:02X}", scanned - 1);
                        }
                        return Ok(());
                    }
                }
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }

        Err(Error::Framing(format!(
            "start byte 0x{wanted:02X} not found within {max_scan} bytes"
        )))
    }

    /// Write `data` one byte at a time with `gap` between bytes.
    ///
    /// The UV-5R bootloader misses bytes sent back to back at 9600 baud;
    /// 10 ms pacing is required there and nowhere else.
    fn write_all_paced(&mut self, data: &[u8], gap: Duration) -> Result<()> {
        for &b in data {
            self.write_all_bytes(&[b])?;
            thread::sleep(gap);
        }
        trace!(">>> {} (paced)", hex(data));
        Ok(())
    }

    /// Read one byte and require it to be the 0x06 ACK.
    fn expect_ack(&mut self, timeout: Duration) -> Result<()> {
        let b = self.read_byte(timeout)?;
        if b != ACK {
            return Err(Error::Protocol(format!(
                "expected ACK 0x06, got 0x{b:02X}"
            )));
        }
        Ok(())
    }
}

impl<P: Port + ?Sized> TransportExt for P {}

pub(crate) fn hex(data: &[u8]) -> String {
    let shown = &data[..data.len().min(32)];
    let mut s: String = shown.iter().map(|b| format!("{b:02X}")).collect();
    if data.len() > shown.len() {
        s.push_str("...");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockPort;

    #[test]
    fn test_read_exact_returns_all_bytes() {
        let mut port = MockPort::new(&[0x01, 0x02, 0x03]);
        let data = port
            .read_exact_timeout(3, Duration::from_millis(100))
            .unwrap();
        assert_eq!(data, vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_read_exact_times_out_on_partial() {
        let mut port = MockPort::new(&[0x01]);
        let err = port
            .read_exact_timeout(4, Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[test]
    fn test_read_until_byte_skips_noise() {
        let mut port = MockPort::new(&[0x00, 0x13, 0xAA, 0x42]);
        port.read_until_byte(0xAA, 16, Duration::from_millis(100))
            .unwrap();
        assert_eq!(port.read_byte(Duration::from_millis(100)).unwrap(), 0x42);
    }

    #[test]
    fn test_read_until_byte_respects_scan_limit() {
        let mut port = MockPort::new(&[0u8; 8]);
        let err = port
            .read_until_byte(0xAA, 4, Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(err, Error::Framing(_)));
    }

    #[test]
    fn test_drain_discards_stale_not_script() {
        let mut port = MockPort::with_stale(&[0x55, 0x55, 0x55], &[0x06]);
        assert_eq!(port.drain().unwrap(), 3);
        assert_eq!(port.read_byte(Duration::from_millis(10)).unwrap(), 0x06);
    }

    #[test]
    fn test_expect_ack_rejects_other_bytes() {
        let mut port = MockPort::new(&[0x15]);
        let err = port.expect_ack(Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
