//! DM-32UV "PowerOnPicture" boot-image protocol.
//!
//! Runs at 115200 baud, DTR and RTS asserted.
//!
//! ## Vendor BIN container
//!
//! ```text
//! +--------+---------+---------+----------+------------------------+
//! | 0x1000 | width   | height  | reserved | RGB565 payload         |
//! | u16 LE | u16 LE  | u16 LE  | 2 bytes  | width * height * 2 B   |
//! +--------+---------+---------+----------+------------------------+
//! ```
//!
//! Only the payload is transmitted; the 8-byte header stays on disk.
//!
//! ## Wire flow
//!
//! A fixed preflight chain (`PSEARCH`, `PASSSTA`, two `V` queries, a `G`
//! command answered by a 0x106-byte `S` block, a marker, `PROGRAM`, 0x02)
//! is followed by `W` packets:
//!
//! ```text
//! 0x57 | addr (24-bit LE) | length (u16 LE) | payload   → 0x06
//! ```
//!
//! The address base the vendor tool derives from the `S` block was never
//! conclusively recovered; it is exposed as [`PictureUploader::with_base_addr`]
//! and defaults to 0.

use std::time::Duration;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::port::Port;
use crate::transport::{TransportExt, ACK};

/// BIN container magic (little-endian on disk).
pub const BIN_MAGIC: u16 = 0x1000;

/// BIN container header length.
pub const BIN_HEADER_LEN: usize = 8;

/// Default screen dimensions for the DM-32UV.
pub const SCREEN_SIZE: (u32, u32) = (240, 320);

/// Default W-packet chunk size.
pub const DEFAULT_CHUNK: usize = 0x1000;

/// Length of the `S` status block read during preflight.
const S_BLOCK_LEN: usize = 0x106;

/// Parsed vendor BIN header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinHeader {
    /// Image width in pixels.
    pub width: u16,
    /// Image height in pixels.
    pub height: u16,
    /// Reserved byte 6, preserved as read.
    pub flags6: u8,
    /// Reserved byte 7, preserved as read.
    pub flags7: u8,
}

impl BinHeader {
    /// Serialise the 8-byte header.
    pub fn to_bytes(self) -> [u8; BIN_HEADER_LEN] {
        let magic = BIN_MAGIC.to_le_bytes();
        let w = self.width.to_le_bytes();
        let h = self.height.to_le_bytes();
        [magic[0], magic[1], w[0], w[1], h[0], h[1], self.flags6, self.flags7]
    }
}

/// Build a vendor BIN from an RGB565 payload.
pub fn build_bin(width: u16, height: u16, payload: &[u8]) -> Result<Vec<u8>> {
    let expected = usize::from(width) * usize::from(height) * 2;
    if payload.len() != expected {
        return Err(Error::Format(format!(
            "payload is {} bytes, expected {expected} for {width}x{height}",
            payload.len()
        )));
    }

    let header = BinHeader {
        width,
        height,
        flags6: 0,
        flags7: 0,
    };
    let mut out = header.to_bytes().to_vec();
    out.extend_from_slice(payload);
    Ok(out)
}

/// Parse a vendor BIN into its header and RGB565 payload.
pub fn parse_bin(blob: &[u8]) -> Result<(BinHeader, &[u8])> {
    if blob.len() < BIN_HEADER_LEN {
        return Err(Error::Truncated("BIN too short for 8-byte header".into()));
    }
    let magic = u16::from_le_bytes([blob[0], blob[1]]);
    if magic != BIN_MAGIC {
        return Err(Error::Format(format!(
            "unexpected BIN magic 0x{magic:04X} (expected 0x{BIN_MAGIC:04X})"
        )));
    }

    let header = BinHeader {
        width: u16::from_le_bytes([blob[2], blob[3]]),
        height: u16::from_le_bytes([blob[4], blob[5]]),
        flags6: blob[6],
        flags7: blob[7],
    };

    let payload = &blob[BIN_HEADER_LEN..];
    let expected = usize::from(header.width) * usize::from(header.height) * 2;
    if payload.len() != expected {
        return Err(Error::Truncated(format!(
            "BIN payload is {} bytes, expected {expected} for {}x{}",
            payload.len(),
            header.width,
            header.height
        )));
    }

    Ok((header, payload))
}

/// Picture uploader for DM-32 series radios.
pub struct PictureUploader<'a, P: Port> {
    port: &'a mut P,
    timeout: Duration,
    ack_timeout: Duration,
    base_addr: u32,
    chunk_size: usize,
}

impl<'a, P: Port> PictureUploader<'a, P> {
    /// Create an uploader over an open port.
    pub fn new(port: &'a mut P) -> Self {
        Self {
            port,
            timeout: Duration::from_millis(500),
            ack_timeout: Duration::from_millis(5000),
            base_addr: 0,
            chunk_size: DEFAULT_CHUNK,
        }
    }

    /// Set the 24-bit address base added to W-packet offsets.
    pub fn with_base_addr(mut self, base_addr: u32) -> Result<Self> {
        if base_addr > 0xFF_FFFF {
            return Err(Error::Config("base_addr must fit in 24 bits".into()));
        }
        self.base_addr = base_addr;
        Ok(self)
    }

    /// Set the W-packet chunk size (1..=65535).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_size > 0xFFFF {
            return Err(Error::Config("chunk_size must be 1..=65535".into()));
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }

    /// Override the preflight/ACK timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, timeout: Duration, ack_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.ack_timeout = ack_timeout;
        self
    }

    /// Run one `V` query (0x56 ...) and swallow its variable-length body.
    fn v_query(&mut self, tail: u8) -> Result<()> {
        self.port
            .write_all_bytes(&[0x56, 0x00, 0x00, if tail == 0x0D { 0x40 } else { 0x00 }, tail])?;
        let hdr = self.port.read_exact_timeout(3, self.timeout)?;
        if hdr[0] != 0x56 {
            return Err(Error::Protocol(format!(
                "V(0x{tail:02X}) bad response header 0x{:02X}",
                hdr[0]
            )));
        }
        let body_len = usize::from(hdr[2]);
        if body_len > 0 {
            let body = self.port.read_exact_timeout(body_len, self.timeout)?;
            debug!("V(0x{tail:02X}) body {} bytes", body.len());
        }
        Ok(())
    }

    /// Run the vendor preflight chain. Every response must arrive in order.
    pub fn preflight(&mut self) -> Result<()> {
        info!("DM-32UV preflight...");
        self.port.drain()?;

        // PSEARCH, retried: the radio may need a beat to notice the host
        let mut found = false;
        for attempt in 1..=5 {
            self.port.write_all_bytes(b"PSEARCH")?;
            match self.port.read_exact_timeout(8, self.timeout) {
                Ok(resp) if resp[0] == ACK => {
                    found = true;
                    break;
                }
                Ok(resp) => debug!("PSEARCH attempt {attempt}: first byte 0x{:02X}", resp[0]),
                Err(Error::Timeout(_)) => debug!("PSEARCH attempt {attempt}: no response"),
                Err(e) => return Err(e),
            }
        }
        if !found {
            return Err(Error::NoContact("PSEARCH failed after 5 attempts".into()));
        }

        self.port.write_all_bytes(b"PASSSTA")?;
        let resp = self.port.read_exact_timeout(8, self.timeout)?;
        if resp[0] != ACK {
            return Err(Error::Protocol(format!(
                "PASSSTA rejected (first byte 0x{:02X})",
                resp[0]
            )));
        }

        self.v_query(0x0D)?;
        self.v_query(0x0E)?;

        self.port
            .write_all_bytes(&[0x47, 0x00, 0x00, 0x00, 0x00, 0x01])?;
        let s_block = self.port.read_exact_timeout(S_BLOCK_LEN, self.timeout)?;
        if s_block[0] != b'S' {
            return Err(Error::Protocol(format!(
                "S-block invalid (first byte 0x{:02X})",
                s_block[0]
            )));
        }
        debug!("S-block head: {}", crate::transport::hex(&s_block[..32]));

        self.port
            .write_all_bytes(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0C])?;

        self.port.write_all_bytes(b"PROGRAM")?;
        self.port.expect_ack(self.timeout)?;

        // Some firmware revisions ACK the final 0x02, some stay silent
        self.port.write_all_bytes(&[0x02])?;
        match self.port.read_byte(self.timeout) {
            Ok(ACK) | Err(Error::Timeout(_)) => {}
            Ok(b) => debug!("0x02 answered with 0x{b:02X}; continuing"),
            Err(e) => return Err(e),
        }

        info!("Preflight complete");
        Ok(())
    }

    /// Stream an RGB565 payload in W packets at strictly ascending offsets.
    pub fn send_payload(
        &mut self,
        payload: &[u8],
        mut progress: impl FnMut(usize, usize),
    ) -> Result<()> {
        let total = payload.len();
        let mut sent = 0usize;

        for offset in (0..total).step_by(self.chunk_size) {
            let chunk = &payload[offset..(offset + self.chunk_size).min(total)];
            let addr = (self.base_addr + offset as u32) & 0xFF_FFFF;

            let mut pkt = Vec::with_capacity(6 + chunk.len());
            pkt.push(0x57);
            pkt.extend_from_slice(&addr.to_le_bytes()[..3]);
            pkt.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
            pkt.extend_from_slice(chunk);

            self.port.write_all_bytes(&pkt)?;
            self.port.expect_ack(self.ack_timeout)?;

            sent += chunk.len();
            progress(sent, total);
        }

        info!("Picture payload sent ({sent} bytes)");
        Ok(())
    }

    /// Upload a vendor BIN: validate, preflight, stream the payload.
    pub fn upload_bin(
        &mut self,
        bin: &[u8],
        progress: impl FnMut(usize, usize),
    ) -> Result<BinHeader> {
        let (header, payload) = parse_bin(bin)?;
        self.preflight()?;
        self.send_payload(payload, progress)?;
        Ok(header)
    }
}
