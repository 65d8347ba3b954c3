//! Scripted mock port for driving protocol state machines in tests.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;
use crate::port::Port;

/// Mock serial port with a scripted read stream and captured writes.
///
/// Reads pop from `stale` first (bytes that [`Port::clear_buffers`]
/// discards, standing in for line noise present before a handshake), then
/// from `script` (the device's planned responses). An exhausted stream
/// reads as `TimedOut`, matching the serialport crate's behavior.
pub struct MockPort {
    stale: VecDeque<u8>,
    script: VecDeque<u8>,
    /// Everything the driver wrote, in order.
    pub written: Vec<u8>,
    /// Panic on any write; used to prove a gate fired before I/O.
    pub panic_on_write: bool,
    timeout: Duration,
}

impl MockPort {
    /// New mock whose reads return `script` in order.
    pub fn new(script: &[u8]) -> Self {
        Self {
            stale: VecDeque::new(),
            script: script.iter().copied().collect(),
            written: Vec::new(),
            panic_on_write: false,
            timeout: Duration::from_millis(100),
        }
    }

    /// New mock with stale junk ahead of the scripted responses.
    pub fn with_stale(stale: &[u8], script: &[u8]) -> Self {
        Self {
            stale: stale.iter().copied().collect(),
            ..Self::new(script)
        }
    }

    /// New mock that panics on the first write.
    pub fn panicking() -> Self {
        Self {
            panic_on_write: true,
            ..Self::new(&[])
        }
    }

    /// Append more scripted response bytes.
    pub fn push_script(&mut self, bytes: &[u8]) {
        self.script.extend(bytes.iter().copied());
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let source = if self.stale.is_empty() {
            &mut self.script
        } else {
            &mut self.stale
        };
        if source.is_empty() {
            return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(source.len());
        for b in buf.iter_mut().take(n) {
            *b = source.pop_front().expect("len checked");
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        assert!(!self.panic_on_write, "unexpected write to mock port");
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Port for MockPort {
    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn baud_rate(&self) -> u32 {
        115200
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.stale.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn set_control_lines(&mut self, _dtr: bool, _rts: bool) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn drain(&mut self) -> Result<usize> {
        let n = self.stale.len();
        self.stale.clear();
        Ok(n)
    }
}
