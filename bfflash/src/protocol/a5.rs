//! UV-17 family boot-logo upload protocol (A5 framing).
//!
//! Runs at 115200 baud, 8N1, no flow control.
//!
//! ## Frame format
//!
//! ```text
//! +------+-----+---------+--------+---------+--------+
//! | 0xA5 | cmd | addr    | length | payload | CRC16  |
//! +------+-----+---------+--------+---------+--------+
//! | 1    | 1   | 2 (BE)  | 2 (BE) | var     | 2 (BE) |
//! +------+-----+---------+--------+---------+--------+
//! ```
//!
//! The CRC is CRC16-XMODEM over every byte after the 0xA5 start byte.
//!
//! ## Sequence
//!
//! 1. `PROGRAMBFNORMALU` → 0x06
//! 2. `D` (enter logo mode, no response, settle ≥200 ms)
//! 3. init frame (0x02, "PROGRAM") → echo with 'Y'
//! 4. config frame (0x04 at 0x4504) → echo ACK
//! 5. setup frame (0x03) → echo ACK
//! 6. write frames (0x57) per chunk → 0xEE data-ACK or 0x57+'Y' echo
//! 7. complete frame (0x06, "Over") → 0x00 or nothing (both fine)

use std::thread;
use std::time::Duration;

use byteorder::{BigEndian, WriteBytesExt};
use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::crc::crc16_xmodem;
use crate::transport::{TransportExt, ACK};

/// 16-byte handshake string for the UV-17 family.
pub const HANDSHAKE_MAGIC: &[u8; 16] = b"PROGRAMBFNORMALU";

/// Logo panel dimensions.
pub const IMAGE_SIZE: (u32, u32) = (160, 128);

/// Full RGB565 stream length for the panel.
pub const IMAGE_BYTES: usize = (IMAGE_SIZE.0 * IMAGE_SIZE.1 * 2) as usize;

/// Default write-frame chunk size.
pub const DEFAULT_CHUNK: usize = 1024;

/// Config/setup mode byte shipped by the vendor tool (0x0C appears in its
/// resources as a compressed-mode value but is never sent).
pub const DEFAULT_CONFIG_MODE: u8 = 0x29;

/// A5 command bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Session init ("PROGRAM").
    Init = 0x02,
    /// Transfer setup.
    Setup = 0x03,
    /// Panel configuration (address 0x4504).
    Config = 0x04,
    /// Transfer complete ("Over").
    Complete = 0x06,
    /// Image data write.
    Write = 0x57,
    /// Data-ACK sent by some radios instead of a write echo.
    WriteAck = 0xEE,
}

/// One A5 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A5Frame {
    /// Command byte.
    pub cmd: u8,
    /// 16-bit address field.
    pub addr: u16,
    /// Frame payload.
    pub payload: Vec<u8>,
}

impl A5Frame {
    /// Create a frame.
    pub fn new(cmd: u8, addr: u16, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            cmd,
            addr,
            payload: payload.into(),
        }
    }

    /// Serialise to wire bytes (start byte, header, payload, CRC).
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.payload.len());
        buf.push(0xA5);
        buf.push(self.cmd);
        buf.write_u16::<BigEndian>(self.addr).unwrap();
        buf.write_u16::<BigEndian>(self.payload.len() as u16).unwrap();
        buf.extend_from_slice(&self.payload);

        let crc = crc16_xmodem(&buf[1..]);
        buf.write_u16::<BigEndian>(crc).unwrap();
        buf
    }
}

/// Split a payload into `(offset, chunk)` pairs at monotonically increasing
/// offsets, zero-padding the final chunk to the full chunk size.
pub fn split_chunks(payload: &[u8], chunk_size: usize) -> Vec<(u16, Vec<u8>)> {
    let mut out = Vec::new();
    for offset in (0..payload.len()).step_by(chunk_size) {
        let mut chunk = payload[offset..(offset + chunk_size).min(payload.len())].to_vec();
        chunk.resize(chunk_size, 0x00);
        out.push((offset as u16, chunk));
    }
    out
}

/// Boot-logo uploader for UV-17Pro / UV-5RM radios.
pub struct LogoUploader<'a, P: Port> {
    port: &'a mut P,
    timeout: Duration,
    chunk_size: usize,
    config_mode: u8,
    mode_switch_delay: Duration,
    frame_delay: Duration,
}

impl<'a, P: Port> LogoUploader<'a, P> {
    /// Create an uploader over an open port.
    pub fn new(port: &'a mut P) -> Self {
        Self {
            port,
            timeout: Duration::from_millis(2000),
            chunk_size: DEFAULT_CHUNK,
            config_mode: DEFAULT_CONFIG_MODE,
            mode_switch_delay: Duration::from_millis(200),
            frame_delay: Duration::from_millis(10),
        }
    }

    /// Override the write-frame chunk size (1..=65535).
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Override the config/setup mode byte.
    #[must_use]
    pub fn with_config_mode(mut self, mode: u8) -> Self {
        self.config_mode = mode;
        self
    }

    /// Override the response timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shrink the inter-frame settle delays (tests use zero).
    #[must_use]
    pub fn with_delays(mut self, mode_switch: Duration, frame: Duration) -> Self {
        self.mode_switch_delay = mode_switch;
        self.frame_delay = frame;
        self
    }

    fn send_frame(&mut self, frame: &A5Frame) -> Result<()> {
        let bytes = frame.build();
        debug!(
            "A5 >>> cmd=0x{:02X} addr=0x{:04X} len={}",
            frame.cmd,
            frame.addr,
            frame.payload.len()
        );
        self.port.write_all_bytes(&bytes)?;
        thread::sleep(self.frame_delay);
        Ok(())
    }

    /// Read one response frame, validating framing and CRC.
    fn read_frame(&mut self) -> Result<A5Frame> {
        let header = self.port.read_exact_timeout(6, self.timeout)?;
        if header[0] != 0xA5 {
            return Err(Error::Framing(format!(
                "bad A5 start byte 0x{:02X}",
                header[0]
            )));
        }
        let cmd = header[1];
        let addr = u16::from(header[2]) << 8 | u16::from(header[3]);
        let len = usize::from(header[4]) << 8 | usize::from(header[5]);

        let payload = self.port.read_exact_timeout(len, self.timeout)?;
        let crc_bytes = self.port.read_exact_timeout(2, self.timeout)?;
        let want = u16::from(crc_bytes[0]) << 8 | u16::from(crc_bytes[1]);

        let mut covered = header[1..].to_vec();
        covered.extend_from_slice(&payload);
        let got = crc16_xmodem(&covered);
        if got != want {
            return Err(Error::Framing(format!(
                "A5 CRC mismatch: got 0x{got:04X}, want 0x{want:04X}"
            )));
        }

        Ok(A5Frame { cmd, addr, payload })
    }

    /// Send a frame and require an echo-style ACK (same command, payload
    /// starting with 'Y').
    fn exchange_expect_echo(&mut self, frame: &A5Frame, what: &str) -> Result<()> {
        self.send_frame(frame)?;
        let resp = self.read_frame()?;
        if resp.cmd != frame.cmd || resp.payload.first() != Some(&b'Y') {
            return Err(Error::Protocol(format!(
                "{what}: unexpected response cmd=0x{:02X}",
                resp.cmd
            )));
        }
        Ok(())
    }

    /// Step 1: handshake.
    pub fn handshake(&mut self) -> Result<()> {
        info!("A5 handshake...");
        self.port.drain()?;
        self.port.write_all_bytes(HANDSHAKE_MAGIC)?;
        match self.port.read_byte(self.timeout) {
            Ok(ACK) => Ok(()),
            Ok(b) => Err(Error::NoContact(format!(
                "handshake expected 0x06, got 0x{b:02X}"
            ))),
            Err(Error::Timeout(_)) => Err(Error::NoContact(
                "no handshake response; is the radio powered on?".into(),
            )),
            Err(e) => Err(e),
        }
    }

    /// Step 2: enter logo mode. No response is expected.
    pub fn enter_logo_mode(&mut self) -> Result<()> {
        self.port.write_all_bytes(b"D")?;
        thread::sleep(self.mode_switch_delay);
        Ok(())
    }

    /// Step 3: init frame.
    pub fn send_init(&mut self) -> Result<()> {
        let frame = A5Frame::new(Command::Init as u8, 0x0000, &b"PROGRAM"[..]);
        self.exchange_expect_echo(&frame, "init frame")
    }

    /// Step 4: config frame at 0x4504.
    pub fn send_config(&mut self) -> Result<()> {
        let payload = vec![0x00, 0x00, self.config_mode, 0x00, 0x00, 0x01];
        let frame = A5Frame::new(Command::Config as u8, 0x4504, payload);
        self.exchange_expect_echo(&frame, "config frame")
    }

    /// Step 5: setup frame.
    pub fn send_setup(&mut self) -> Result<()> {
        let payload = vec![0x00, 0x00, self.config_mode, 0x00];
        let frame = A5Frame::new(Command::Setup as u8, 0x0000, payload);
        self.exchange_expect_echo(&frame, "setup frame")
    }

    /// Step 6: stream the image payload in write frames.
    ///
    /// Each chunk is acknowledged either by a 0xEE data-ACK (any payload)
    /// or by a 0x57 echo whose payload starts with 'Y'; both count as
    /// success.
    pub fn send_image(
        &mut self,
        payload: &[u8],
        mut progress: impl FnMut(usize, usize),
    ) -> Result<()> {
        let total = payload.len();
        if total > usize::from(u16::MAX) {
            return Err(Error::Config(format!(
                "payload too large for 16-bit frame addresses ({total} bytes)"
            )));
        }
        let mut sent = 0usize;

        info!(
            "Sending {total} bytes of image data in {}-byte chunks...",
            self.chunk_size
        );
        for (offset, chunk) in split_chunks(payload, self.chunk_size) {
            let frame = A5Frame::new(Command::Write as u8, offset, chunk);
            self.send_frame(&frame)?;

            let resp = self.read_frame()?;
            let echo_ok =
                resp.cmd == Command::Write as u8 && resp.payload.first() == Some(&b'Y');
            if resp.cmd != Command::WriteAck as u8 && !echo_ok {
                return Err(Error::Protocol(format!(
                    "write at offset 0x{offset:04X}: unexpected response cmd=0x{:02X}",
                    resp.cmd
                )));
            }

            sent += frame.payload.len();
            progress(sent.min(total), total);
        }
        Ok(())
    }

    /// Step 7: completion frame. Some radios reset immediately and never
    /// answer; silence is success.
    pub fn send_complete(&mut self) -> Result<()> {
        let frame = A5Frame::new(Command::Complete as u8, 0x0000, &b"Over"[..]);
        self.send_frame(&frame)?;

        match self.port.read_byte(Duration::from_millis(500)) {
            Ok(0x00) | Err(Error::Timeout(_)) => Ok(()),
            Ok(b) => {
                warn!("Completion: unexpected response 0x{b:02X}, continuing");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Run the full upload sequence for an RGB565 payload.
    pub fn upload(
        &mut self,
        payload: &[u8],
        progress: impl FnMut(usize, usize),
    ) -> Result<()> {
        self.handshake()?;
        self.enter_logo_mode()?;
        self.send_init()?;
        self.send_config()?;
        self.send_setup()?;
        self.send_image(payload, progress)?;
        self.send_complete()?;
        info!("Logo upload complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockPort;

    fn uploader(port: &mut MockPort) -> LogoUploader<'_, MockPort> {
        LogoUploader::new(port)
            .with_timeout(Duration::from_millis(50))
            .with_delays(Duration::ZERO, Duration::ZERO)
    }

    fn echo_ack(cmd: Command) -> Vec<u8> {
        A5Frame::new(cmd as u8, 0x0000, &b"Y"[..]).build()
    }

    #[test]
    fn test_write_frame_structure() {
        // 1024-byte payload: 8 bytes of framing + 1024 = 1032 total,
        // length field big-endian 0x0400.
        let frame = A5Frame::new(Command::Write as u8, 0x0000, vec![0xAB; 1024]);
        let bytes = frame.build();
        assert_eq!(bytes.len(), 1032);
        assert_eq!(bytes[0], 0xA5);
        assert_eq!(bytes[1], 0x57);
        assert_eq!(&bytes[4..6], &[0x04, 0x00]);
    }

    #[test]
    fn test_frame_crc_covers_post_start_bytes() {
        let frame = A5Frame::new(Command::Init as u8, 0x0000, &b"PROGRAM"[..]);
        let bytes = frame.build();
        let crc = crc16_xmodem(&bytes[1..bytes.len() - 2]);
        assert_eq!(
            &bytes[bytes.len() - 2..],
            &[(crc >> 8) as u8, (crc & 0xFF) as u8]
        );
    }

    #[test]
    fn test_chunking_full_image() {
        // 40960-byte payload splits into exactly 40 chunks at offsets
        // 0, 1024, ..., 39*1024.
        let payload = vec![0x12; IMAGE_BYTES];
        let chunks = split_chunks(&payload, DEFAULT_CHUNK);
        assert_eq!(chunks.len(), 40);
        for (i, (offset, chunk)) in chunks.iter().enumerate() {
            assert_eq!(*offset as usize, i * 1024);
            assert_eq!(chunk.len(), 1024);
        }
    }

    #[test]
    fn test_chunking_pads_final_chunk() {
        let payload = vec![0xFF; 1500];
        let chunks = split_chunks(&payload, DEFAULT_CHUNK);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].0, 1024);
        assert_eq!(chunks[1].1.len(), 1024);
        assert_eq!(&chunks[1].1[476..], &vec![0x00; 548][..]);
    }

    #[test]
    fn test_upload_with_data_ack_responses() {
        let mut script = vec![ACK];
        script.extend(echo_ack(Command::Init));
        script.extend(echo_ack(Command::Config));
        script.extend(echo_ack(Command::Setup));
        for _ in 0..2 {
            // 0xEE data-ACK with an arbitrary payload
            script.extend(A5Frame::new(Command::WriteAck as u8, 0x0000, vec![0x04]).build());
        }
        script.push(0x00);

        let mut port = MockPort::new(&script);
        let payload = vec![0x33; 2048];
        uploader(&mut port).upload(&payload, |_, _| {}).unwrap();
    }

    #[test]
    fn test_upload_with_write_echo_responses() {
        // Radios that echo 0x57 + 'Y' must succeed identically
        let mut script = vec![ACK];
        script.extend(echo_ack(Command::Init));
        script.extend(echo_ack(Command::Config));
        script.extend(echo_ack(Command::Setup));
        for _ in 0..2 {
            script.extend(echo_ack(Command::Write));
        }
        // No completion byte at all: tolerated

        let mut port = MockPort::new(&script);
        let payload = vec![0x33; 2048];
        uploader(&mut port).upload(&payload, |_, _| {}).unwrap();
    }

    #[test]
    fn test_upload_rejects_unexpected_write_response() {
        let mut script = vec![ACK];
        script.extend(echo_ack(Command::Init));
        script.extend(echo_ack(Command::Config));
        script.extend(echo_ack(Command::Setup));
        script.extend(A5Frame::new(0x7F, 0x0000, vec![]).build());

        let mut port = MockPort::new(&script);
        let payload = vec![0x33; 1024];
        let err = uploader(&mut port)
            .upload(&payload, |_, _| {})
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_handshake_rejects_wrong_byte() {
        let mut port = MockPort::new(&[0x15]);
        let err = uploader(&mut port).handshake().unwrap_err();
        assert!(matches!(err, Error::NoContact(_)));
    }

    #[test]
    fn test_read_frame_rejects_bad_crc() {
        let mut bytes = A5Frame::new(Command::Init as u8, 0, &b"Y"[..]).build();
        let n = bytes.len();
        bytes.swap(n - 2, n - 1);

        let mut port = MockPort::new(&bytes);
        let mut up = uploader(&mut port);
        let err = up.read_frame().unwrap_err();
        assert!(matches!(err, Error::Framing(_)));
    }

    #[test]
    fn test_config_frame_carries_mode_byte() {
        let mut port = MockPort::new(&echo_ack(Command::Config));
        let mut up = uploader(&mut port).with_config_mode(0x0C);
        up.send_config().unwrap();
        // addr 0x4504, payload byte 2 is the mode
        assert_eq!(&port.written[2..4], &[0x45, 0x04]);
        assert_eq!(port.written[8], 0x0C);
    }
}
