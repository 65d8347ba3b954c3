//! UV-5R family clone protocol (block-level memory image transfer).
//!
//! Runs at 9600 baud, 8N1, RTS/CTS on. The radio enters programming mode
//! after a 7-byte magic (sent one byte per 10 ms), answers block requests
//! with an echoed header, and hands back an 8-byte identification that
//! becomes the clone image prefix.
//!
//! ## Clone image layout
//!
//! ```text
//! bytes 0..8            radio identification (AA .. DD)
//! bytes 8..8+0x1800     main memory, radio addresses 0x0000..0x1800
//! bytes 8+0x1800..      aux memory, radio addresses 0x1EC0..0x2000
//! ```
//!
//! A radio address `A` therefore lives at image index `A + 8`.
//!
//! Some UV-5R hardware drops one byte around 0x1FCF when that range is read
//! in 64-byte blocks; the probe in [`CloneProtocol::identify`] detects the
//! quirk and later transfers switch to 16-byte blocks over 0x1FC0..0x2000.

use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::port::Port;
use crate::registry;
use crate::transport::{TransportExt, ACK};

/// Length of the identification prefix in a clone image.
pub const IDENT_LEN: usize = 8;

/// Main memory range transferred by the clone protocol.
pub const MAIN_RANGE: (u16, u16) = (0x0000, 0x1800);

/// Auxiliary memory range transferred by the clone protocol.
pub const AUX_RANGE: (u16, u16) = (0x1EC0, 0x2000);

/// Start of the range affected by the dropped-byte quirk.
pub const QUIRK_RANGE: (u16, u16) = (0x1FC0, 0x2000);

/// Block size for reads.
pub const READ_BLOCK: u8 = 0x40;

/// Block size for writes (and quirk-range reads).
pub const SMALL_BLOCK: u8 = 0x10;

const PACING: Duration = Duration::from_millis(10);
const BLOCK_DELAY: Duration = Duration::from_millis(50);

/// What the handshake and version probe learned about the radio.
#[derive(Debug, Clone)]
pub struct Identification {
    /// 8-byte identification, starting 0xAA and ending 0xDD.
    pub ident: Vec<u8>,
    /// Raw firmware version bytes (version block bytes 48..62).
    pub version: Vec<u8>,
    /// Model name matched from the version string, or "Unknown".
    pub model: String,
    /// True if the radio needs the 16-byte-block workaround.
    pub has_dropped_byte: bool,
    /// True for legacy BFB firmware (BFB < 291).
    pub is_original_fw: bool,
}

/// One verification mismatch reported by [`CloneProtocol::verify_clone`].
#[derive(Debug, Clone)]
pub struct VerifyMismatch {
    /// Radio address of the block.
    pub address: u16,
    /// Block size compared.
    pub size: u8,
    /// Bytes read back from the radio.
    pub radio: Vec<u8>,
    /// Expected bytes from the reference image.
    pub reference: Vec<u8>,
}

/// Clone protocol driver. Owns the port exclusively for one operation.
pub struct CloneProtocol<'a, P: Port> {
    port: &'a mut P,
    timeout: Duration,
    block_delay: Duration,
    ident: Option<Vec<u8>>,
    has_dropped_byte: bool,
}

impl<'a, P: Port> CloneProtocol<'a, P> {
    /// Create a driver over an open port.
    pub fn new(port: &'a mut P) -> Self {
        Self {
            port,
            timeout: Duration::from_millis(1000),
            block_delay: BLOCK_DELAY,
            ident: None,
            has_dropped_byte: false,
        }
    }

    /// Override the per-read timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the post-block settle delay (tests use zero).
    #[must_use]
    pub fn with_block_delay(mut self, delay: Duration) -> Self {
        self.block_delay = delay;
        self
    }

    /// Identification from the last successful handshake, if any.
    pub fn ident(&self) -> Option<&[u8]> {
        self.ident.as_deref()
    }

    /// Perform the programming-mode handshake with one magic sequence.
    ///
    /// Sends the 7 magic bytes at 10 ms pacing, reads the ACK, requests the
    /// identification with 0x02, accumulates bytes until 0xDD (at most 12),
    /// validates the 0xAA..0xDD envelope, confirms, and normalises 12-byte
    /// idents to 8 bytes by dropping 0x01 fillers.
    pub fn handshake(&mut self, magic: &[u8], retries: usize) -> Result<Vec<u8>> {
        if magic.len() != 7 {
            return Err(Error::Config(format!(
                "magic must be 7 bytes, got {}",
                magic.len()
            )));
        }

        let mut last = None;
        for attempt in 0..=retries {
            match self.try_handshake(magic) {
                Ok(ident) => {
                    self.ident = Some(ident.clone());
                    return Ok(ident);
                }
                Err(e) => {
                    if attempt < retries {
                        warn!("Handshake attempt {} failed: {e}, retrying", attempt + 1);
                        thread::sleep(Duration::from_millis(200));
                    }
                    last = Some(e);
                }
            }
        }

        Err(last.unwrap_or_else(|| Error::NoContact("handshake failed".into())))
    }

    fn try_handshake(&mut self, magic: &[u8]) -> Result<Vec<u8>> {
        self.port.drain()?;

        debug!("Sending magic: {}", crate::transport::hex(magic));
        self.port.write_all_paced(magic, PACING)?;

        match self.port.read_byte(self.timeout) {
            Ok(ACK) => {}
            Ok(b) => {
                return Err(Error::NoContact(format!(
                    "no ACK after magic (got 0x{b:02X})"
                )))
            }
            Err(Error::Timeout(_)) => {
                return Err(Error::NoContact("no response to magic".into()))
            }
            Err(e) => return Err(e),
        }

        // Request identification
        self.port.write_all_bytes(&[0x02])?;

        let mut response = Vec::with_capacity(12);
        for _ in 0..12 {
            let b = self.port.read_byte(self.timeout)?;
            response.push(b);
            if b == 0xDD {
                break;
            }
        }

        if response.len() != 8 && response.len() != 12 {
            return Err(Error::Protocol(format!(
                "invalid ident length {} (expected 8 or 12)",
                response.len()
            )));
        }
        if response.first() != Some(&0xAA) || response.last() != Some(&0xDD) {
            return Err(Error::Protocol(format!(
                "invalid ident envelope: {}",
                crate::transport::hex(&response)
            )));
        }

        // Confirm and read the second ACK
        self.port.write_all_bytes(&[ACK])?;
        match self.port.read_byte(self.timeout) {
            Ok(ACK) => {}
            Ok(b) => {
                return Err(Error::NoContact(format!(
                    "no second ACK (got 0x{b:02X})"
                )))
            }
            Err(Error::Timeout(_)) => return Err(Error::NoContact("no second ACK".into())),
            Err(e) => return Err(e),
        }

        // 12-byte idents (UV-6) carry 0x01 fillers
        let ident: Vec<u8> = if response.len() == 12 {
            response
                .into_iter()
                .filter(|&b| b != 0x01)
                .take(IDENT_LEN)
                .collect()
        } else {
            response
        };

        info!("Handshake OK, ident {}", crate::transport::hex(&ident));
        Ok(ident)
    }

    /// Identify the radio: try candidate magics, then probe the firmware
    /// version and the dropped-byte quirk.
    ///
    /// With `magics` empty, the registry's candidate order is used.
    pub fn identify(&mut self, magics: &[&[u8]]) -> Result<Identification> {
        let registry_order = registry::magic_candidates();
        let candidates: &[&[u8]] = if magics.is_empty() {
            &registry_order
        } else {
            magics
        };

        let mut last = None;
        let mut ident = None;
        for magic in candidates {
            debug!("Trying magic {}", crate::transport::hex(magic));
            match self.handshake(magic, 0) {
                Ok(id) => {
                    ident = Some(id);
                    break;
                }
                Err(e @ Error::NoContact(_)) => last = Some(e),
                Err(e) => return Err(e),
            }
        }
        let Some(ident) = ident else {
            return Err(Error::NoContact(format!(
                "radio did not respond to any magic ({})",
                last.map_or_else(|| "no candidates".to_string(), |e| e.to_string())
            )));
        };

        let (version, has_dropped_byte) = self.probe_firmware_version()?;
        self.has_dropped_byte = has_dropped_byte;

        let model = registry::detect_model(&version)
            .map_or_else(|| "Unknown".to_string(), |m| m.name.to_string());
        let is_original_fw = is_original_firmware(&version);

        info!(
            "Identified {model}, fw={:?}, dropped_byte={has_dropped_byte}",
            String::from_utf8_lossy(&version)
        );

        Ok(Identification {
            ident,
            version,
            model,
            has_dropped_byte,
            is_original_fw,
        })
    }

    /// Read the firmware version and detect the dropped-byte quirk.
    fn probe_firmware_version(&mut self) -> Result<(Vec<u8>, bool)> {
        // Warm-up read; unsticks first reads on newer firmware
        let _ = self.read_block(0x1E80, READ_BLOCK, true)?;

        let version_block = self.read_block(0x1EC0, READ_BLOCK, false)?;
        let version = version_block[48..62].to_vec();

        let probe = self.read_block(QUIRK_RANGE.0, READ_BLOCK, false)?;
        let dropped = probe[15] == 0xFF;

        Ok((version, dropped))
    }

    /// Read one memory block.
    ///
    /// `first_block` skips the leading ACK wait, which the radio only sends
    /// from the second request onward.
    pub fn read_block(&mut self, addr: u16, size: u8, first_block: bool) -> Result<Vec<u8>> {
        let request = [b'S', (addr >> 8) as u8, (addr & 0xFF) as u8, size];
        self.port.write_all_bytes(&request)?;

        if !first_block {
            self.port.expect_ack(self.timeout).map_err(|e| match e {
                Error::Protocol(msg) => {
                    Error::Protocol(format!("read request at 0x{addr:04X}: {msg}"))
                }
                other => other,
            })?;
        }

        let header = self.port.read_exact_timeout(4, self.timeout)?;
        let resp_addr = u16::from(header[1]) << 8 | u16::from(header[2]);
        if header[0] != b'X' {
            return Err(Error::Protocol(format!(
                "invalid response command 0x{:02X} at 0x{addr:04X}",
                header[0]
            )));
        }
        if resp_addr != addr || header[3] != size {
            return Err(Error::Protocol(format!(
                "response mismatch at 0x{addr:04X}: got (0x{resp_addr:04X}, {})",
                header[3]
            )));
        }

        let data = self.port.read_exact_timeout(size as usize, self.timeout)?;
        self.port.write_all_bytes(&[ACK])?;
        thread::sleep(self.block_delay);

        Ok(data)
    }

    /// Write one memory block (at most 255 bytes) and wait for the ACK.
    pub fn write_block(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        if data.len() > 255 {
            return Err(Error::Config(format!(
                "block too large: {} bytes (max 255)",
                data.len()
            )));
        }

        let mut msg = vec![b'X', (addr >> 8) as u8, (addr & 0xFF) as u8, data.len() as u8];
        msg.extend_from_slice(data);
        self.port.write_all_bytes(&msg)?;
        thread::sleep(self.block_delay);

        self.port.expect_ack(self.timeout).map_err(|e| match e {
            Error::Protocol(msg) => Error::Protocol(format!("write at 0x{addr:04X}: {msg}")),
            other => other,
        })
    }

    /// Block addresses and sizes for one read pass, honoring the quirk.
    fn read_plan(&self) -> Vec<(u16, u8, bool)> {
        let mut plan = Vec::new();
        let mut first = true;
        for addr in (MAIN_RANGE.0..MAIN_RANGE.1).step_by(READ_BLOCK as usize) {
            plan.push((addr, READ_BLOCK, first));
            first = false;
        }
        if self.has_dropped_byte {
            for addr in (AUX_RANGE.0..QUIRK_RANGE.0).step_by(READ_BLOCK as usize) {
                plan.push((addr, READ_BLOCK, false));
            }
            for addr in (QUIRK_RANGE.0..QUIRK_RANGE.1).step_by(SMALL_BLOCK as usize) {
                plan.push((addr, SMALL_BLOCK, false));
            }
        } else {
            for addr in (AUX_RANGE.0..AUX_RANGE.1).step_by(READ_BLOCK as usize) {
                plan.push((addr, READ_BLOCK, false));
            }
        }
        plan
    }

    /// Download the complete memory image, prefixed with the ident.
    pub fn download_clone(&mut self, mut progress: impl FnMut(usize, usize)) -> Result<Vec<u8>> {
        if self.ident.is_none() {
            self.identify(&[])?;
        }
        let mut data = self.ident.clone().unwrap_or_default();

        let plan = self.read_plan();
        let total: usize = plan.iter().map(|&(_, size, _)| size as usize).sum();
        let mut done = 0usize;

        info!("Downloading clone ({total} bytes)...");
        for (addr, size, first) in plan {
            let block = self.read_block(addr, size, first)?;
            data.extend_from_slice(&block);
            done += size as usize;
            progress(done, total);
        }

        info!("Download complete: {} bytes", data.len());
        Ok(data)
    }

    /// Upload a clone image. The 8-byte ident prefix is not transmitted.
    ///
    /// Dropped-byte radios only take aux writes over 0x1FC0..0x2000; the
    /// vendor tool never touches 0x1EC0..0x1FC0 on that hardware and
    /// neither does this.
    pub fn upload_clone(
        &mut self,
        image: &[u8],
        mut progress: impl FnMut(usize, usize),
    ) -> Result<()> {
        let main_len = (MAIN_RANGE.1 - MAIN_RANGE.0) as usize;
        if image.len() < IDENT_LEN + main_len {
            return Err(Error::Format(format!(
                "clone image too small: {} bytes (minimum {})",
                image.len(),
                IDENT_LEN + main_len
            )));
        }
        if self.ident.is_none() {
            self.identify(&[])?;
        }

        let aux_start = if self.has_dropped_byte {
            QUIRK_RANGE.0
        } else {
            AUX_RANGE.0
        };
        let aux_span = (AUX_RANGE.1 - aux_start) as usize;
        let aux_avail = image
            .len()
            .saturating_sub(IDENT_LEN + main_len + (aux_start - AUX_RANGE.0) as usize);
        let total = main_len + aux_span.min(aux_avail);
        let mut done = 0usize;

        info!("Uploading clone ({total} bytes)...");
        for addr in (MAIN_RANGE.0..MAIN_RANGE.1).step_by(SMALL_BLOCK as usize) {
            let offset = IDENT_LEN + addr as usize;
            self.write_block(addr, &image[offset..offset + SMALL_BLOCK as usize])?;
            done += SMALL_BLOCK as usize;
            progress(done, total);
        }

        for addr in (aux_start..AUX_RANGE.1).step_by(SMALL_BLOCK as usize) {
            let offset = IDENT_LEN + main_len + (addr - AUX_RANGE.0) as usize;
            if offset >= image.len() {
                break;
            }
            let end = (offset + SMALL_BLOCK as usize).min(image.len());
            self.write_block(addr, &image[offset..end])?;
            done += end - offset;
            progress(done, total);
        }

        info!("Upload complete");
        Ok(())
    }

    /// Read back the transferred ranges and compare against `image`.
    ///
    /// Remember the ident prefix: radio address `A` is compared against
    /// `image[A + 8]`. Returns the list of mismatching blocks (empty means
    /// verified).
    pub fn verify_clone(&mut self, image: &[u8]) -> Result<Vec<VerifyMismatch>> {
        let mut mismatches = Vec::new();

        for (addr, size, first) in self.read_plan() {
            let radio = self.read_block(addr, size, first)?;

            let offset = image_offset(addr) + IDENT_LEN;
            let reference = image
                .get(offset..offset + size as usize)
                .unwrap_or(&[])
                .to_vec();

            if radio != reference {
                mismatches.push(VerifyMismatch {
                    address: addr,
                    size,
                    radio,
                    reference,
                });
            }
        }

        info!("Verify complete: {} mismatch(es)", mismatches.len());
        Ok(mismatches)
    }
}

/// Offset of a radio address within the image body (before the ident
/// prefix is applied).
fn image_offset(addr: u16) -> usize {
    if addr >= AUX_RANGE.0 {
        (MAIN_RANGE.1 - MAIN_RANGE.0) as usize + (addr - AUX_RANGE.0) as usize
    } else {
        addr as usize
    }
}

/// True for legacy BFB firmware older than BFB291.
fn is_original_firmware(version: &[u8]) -> bool {
    let Some(pos) = version.windows(3).position(|w| w == b"BFB") else {
        return false;
    };
    let digits = &version[pos + 3..];
    let digits: Vec<u8> = digits
        .iter()
        .take(3)
        .copied()
        .take_while(u8::is_ascii_digit)
        .collect();
    if digits.len() != 3 {
        return false;
    }
    let number: u32 = String::from_utf8_lossy(&digits).parse().unwrap_or(u32::MAX);
    number < 291
}
