//! Vendor firmware-update protocol for `.BF` packaged firmware.
//!
//! Runs at 115200 baud, 8N1, no flow control.
//!
//! ## Frame format
//!
//! ```text
//! +------+-----+------+--------+---------+--------+------+
//! | 0xAA | cmd | args | length | payload | CRC16  | 0xEF |
//! +------+-----+------+--------+---------+--------+------+
//! | 1    | 1   | 1    | 2 (BE) | var     | 2 (BE) | 1    |
//! +------+-----+------+--------+---------+--------+------+
//! ```
//!
//! The CRC is CRC16-CCITT (poly 0x1021, init 0) over
//! `[cmd, args, len_hi, len_lo, payload...]`.
//!
//! A response with `args == 6` is success; any other value places an error
//! code from `{0xE1..0xE5}` in the `cmd` field. A data-check error (0xE2)
//! retries the same packet; everything else aborts.

use std::thread;
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use log::{debug, info, warn};

use crate::codec::bf::{BfHeader, HEADER_SIZE, PACKAGE_SIZE};
use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::crc::crc16_ccitt;
use crate::transport::TransportExt;

/// Frame start byte.
pub const FRAME_START: u8 = 0xAA;

/// Frame terminator byte.
pub const FRAME_END: u8 = 0xEF;

/// `args` value that marks a successful response.
pub const ARGS_SUCCESS: u8 = 6;

/// Framed handshake command ("BOOTLOADER").
pub const CMD_HANDSHAKE: u8 = 0x01;

/// Firmware data chunk.
pub const CMD_DATA: u8 = 0x03;

/// Region-1 package count announcement.
pub const CMD_REGION1_COUNT: u8 = 0x04;

/// Region-2 package count announcement.
pub const CMD_REGION2_COUNT: u8 = 0x05;

/// Enter bootloader (framed mode).
pub const CMD_INTO_BOOT: u8 = 0x42;

/// End of update.
pub const CMD_UPDATE_END: u8 = 0x45;

/// Default flash base for firmware images.
pub const FW_FLASH_BASE: u32 = 0x0800_1000;

/// Firmware size ceiling used by the vector-table window.
pub const FW_FLASH_LIMIT: usize = 60 * 1024;

/// Minimum plausible firmware size; smaller images are refused unless the
/// caller explicitly allows them.
pub const MIN_FIRMWARE_BYTES: usize = 10 * 1024;

/// Signatures of flash-dumper payloads, matched case-insensitively.
pub const DUMPER_SIGNATURES: [&[u8]; 5] = [
    b"FLASH DUMPER",
    b"BD4VOW",
    b"FLASHDUMPER",
    b"DUMPER BY",
    b"BOOTLOADER ***",
];

/// One vendor-protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorFrame {
    /// Command byte (or error code in a failed response).
    pub cmd: u8,
    /// Command arguments byte (6 marks success in responses).
    pub args: u8,
    /// Frame payload.
    pub data: Vec<u8>,
}

impl VendorFrame {
    /// Create a frame.
    pub fn new(cmd: u8, args: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            cmd,
            args,
            data: data.into(),
        }
    }

    /// Serialise to wire bytes.
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn build(&self) -> Vec<u8> {
        debug_assert!(self.data.len() <= 0xFFFF);

        let mut buf = Vec::with_capacity(8 + self.data.len());
        buf.push(FRAME_START);
        buf.push(self.cmd);
        buf.push(self.args);
        buf.write_u16::<BigEndian>(self.data.len() as u16).unwrap();
        buf.extend_from_slice(&self.data);

        let crc = crc16_ccitt(&buf[1..]);
        buf.write_u16::<BigEndian>(crc).unwrap();
        buf.push(FRAME_END);
        buf
    }

    /// Parse a complete frame, validating framing and CRC.
    pub fn parse(blob: &[u8]) -> Result<Self> {
        if blob.len() < 8 {
            return Err(Error::Framing("vendor packet too short".into()));
        }
        if blob[0] != FRAME_START {
            return Err(Error::Framing("missing 0xAA start byte".into()));
        }
        if blob[blob.len() - 1] != FRAME_END {
            return Err(Error::Framing("missing 0xEF end byte".into()));
        }

        let data_len = usize::from(BigEndian::read_u16(&blob[3..5]));
        let expected = 8 + data_len;
        if blob.len() != expected {
            return Err(Error::Framing(format!(
                "packet length mismatch: got {}, expected {expected}",
                blob.len()
            )));
        }

        let data = blob[5..5 + data_len].to_vec();
        let want = BigEndian::read_u16(&blob[5 + data_len..7 + data_len]);
        let got = crc16_ccitt(&blob[1..5 + data_len]);
        if got != want {
            return Err(Error::Framing(format!(
                "CRC mismatch: got 0x{got:04X}, want 0x{want:04X}"
            )));
        }

        Ok(Self {
            cmd: blob[1],
            args: blob[2],
            data,
        })
    }
}

/// Human-readable classification of a device error code.
fn describe_error(code: u8) -> &'static str {
    match code {
        0xE1 => "handshake code error",
        0xE2 => "data check error",
        0xE3 => "address error",
        0xE4 => "flash write error",
        0xE5 => "command error",
        _ => "unknown error",
    }
}

/// Statistics returned by [`VendorFlasher::send_bf`].
#[derive(Debug, Clone, Copy)]
pub struct SendStats {
    /// Region 1 length from the header.
    pub region1_len: usize,
    /// Region 2 length from the header (normalised).
    pub region2_len: usize,
    /// 1024-byte packages sent for region 1.
    pub packages1: usize,
    /// 1024-byte packages sent for region 2.
    pub packages2: usize,
}

/// Vendor firmware flasher. Transmits BF payload bytes as stored (the
/// bootloader descrambles on-device).
pub struct VendorFlasher<'a, P: Port> {
    port: &'a mut P,
    timeout: Duration,
    retries: usize,
    model_tag: Vec<u8>,
    retry_delay: Duration,
    handshake_retry_delay: Duration,
    post_handshake_delay: Duration,
}

impl<'a, P: Port> VendorFlasher<'a, P> {
    /// Create a flasher over an open port with the default model tag.
    pub fn new(port: &'a mut P) -> Self {
        Self {
            port,
            timeout: Duration::from_millis(1000),
            retries: 5,
            model_tag: b"BFNORMAL".to_vec(),
            retry_delay: Duration::from_millis(60),
            handshake_retry_delay: Duration::from_millis(80),
            post_handshake_delay: Duration::from_millis(20),
        }
    }

    /// Override the model tag inserted into the raw handshake.
    #[must_use]
    pub fn with_model_tag(mut self, tag: impl Into<Vec<u8>>) -> Self {
        self.model_tag = tag.into();
        self
    }

    /// Override the per-read timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shrink the retry/settle delays (tests use zero).
    #[must_use]
    pub fn with_delays(mut self, retry: Duration, handshake_retry: Duration, post: Duration) -> Self {
        self.retry_delay = retry;
        self.handshake_retry_delay = handshake_retry;
        self.post_handshake_delay = post;
        self
    }

    /// Phase A: raw (unframed) handshake.
    ///
    /// `PROGRAM<tag>U` → 0x06, `UPDATE` → 0x06, 20 ms settle, drain.
    /// Retried up to 5 times with 80 ms pauses.
    pub fn handshake(&mut self) -> Result<()> {
        let mut greeting = b"PROGRAM".to_vec();
        greeting.extend_from_slice(&self.model_tag);
        greeting.push(b'U');

        let mut last = None;
        for attempt in 1..=self.retries {
            let step = (|| -> Result<()> {
                self.port.clear_buffers()?;
                self.port.write_all_bytes(&greeting)?;
                self.port.expect_ack(self.timeout)?;
                self.port.write_all_bytes(b"UPDATE")?;
                self.port.expect_ack(self.timeout)?;
                Ok(())
            })();

            match step {
                Ok(()) => {
                    thread::sleep(self.post_handshake_delay);
                    self.port.drain()?;
                    info!("Vendor handshake OK");
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.retries {
                        debug!("Handshake attempt {attempt} failed: {e}");
                        thread::sleep(self.handshake_retry_delay);
                    }
                    last = Some(e);
                }
            }
        }

        Err(Error::NoContact(format!(
            "vendor handshake failed after {} attempts: {}",
            self.retries,
            last.map_or_else(String::new, |e| e.to_string())
        )))
    }

    /// Read one framed response, tolerating noise before the start byte.
    pub fn read_frame(&mut self) -> Result<VendorFrame> {
        let deadline = self.timeout.max(Duration::from_secs(1)) * 4;
        self.port.read_until_byte(FRAME_START, 8192, deadline)?;

        let header = self.port.read_exact_timeout(4, self.timeout)?;
        let data_len = usize::from(header[2]) << 8 | usize::from(header[3]);
        let data = self.port.read_exact_timeout(data_len, self.timeout)?;
        let tail = self.port.read_exact_timeout(3, self.timeout)?;

        let mut raw = vec![FRAME_START];
        raw.extend_from_slice(&header);
        raw.extend_from_slice(&data);
        raw.extend_from_slice(&tail);
        VendorFrame::parse(&raw)
    }

    /// Send a packet and classify the response, retrying data-check errors
    /// and timeouts up to the retry budget.
    fn exchange(&mut self, cmd: u8, args: u8, data: &[u8]) -> Result<VendorFrame> {
        let pkt = VendorFrame::new(cmd, args, data).build();

        let mut last = None;
        for attempt in 1..=self.retries {
            self.port.write_all_bytes(&pkt)?;

            match self.read_frame() {
                Ok(resp) if resp.args == ARGS_SUCCESS => return Ok(resp),
                Ok(resp) if resp.cmd == 0xE2 => {
                    warn!(
                        "Radio reported data check error; retry {attempt}/{}",
                        self.retries
                    );
                    last = Some(Error::Device {
                        code: resp.cmd,
                        message: describe_error(resp.cmd).into(),
                    });
                }
                Ok(resp) => {
                    return Err(Error::Device {
                        code: resp.cmd,
                        message: describe_error(resp.cmd).into(),
                    })
                }
                Err(e @ Error::Timeout(_)) => {
                    debug!("cmd 0x{cmd:02X} timed out; retry {attempt}/{}", self.retries);
                    last = Some(e);
                }
                Err(e) => return Err(e),
            }

            if attempt < self.retries {
                thread::sleep(self.retry_delay);
            }
        }

        Err(last.unwrap_or_else(|| {
            Error::Protocol(format!("cmd 0x{cmd:02X} failed with no response"))
        }))
    }

    /// Phase B: enter framed bootloader mode.
    ///
    /// Some devices never answer cmd 0x42 because they are already in
    /// framed mode; a timeout there is tolerated and only the framed
    /// `BOOTLOADER` handshake is mandatory.
    pub fn enter_bootloader(&mut self) -> Result<()> {
        thread::sleep(self.post_handshake_delay);
        self.port.clear_buffers()?;

        let into_boot = VendorFrame::new(CMD_INTO_BOOT, 0, vec![]).build();
        self.port.write_all_bytes(&into_boot)?;
        match self.read_frame() {
            Ok(resp) if resp.args == ARGS_SUCCESS => {}
            Ok(resp) => debug!("into-boot answered cmd=0x{:02X}; continuing", resp.cmd),
            Err(Error::Timeout(_)) | Err(Error::Framing(_)) => {
                debug!("into-boot unanswered; device may already be in framed mode");
            }
            Err(e) => return Err(e),
        }

        self.exchange(CMD_HANDSHAKE, 0, b"BOOTLOADER")?;
        info!("Bootloader handshake OK");
        Ok(())
    }

    /// Phase C: stream both BF regions and close the update.
    ///
    /// The BF payload is sent as stored (still scrambled); chunks are
    /// exactly 1024 bytes with 0xFF padding on the tail.
    pub fn send_bf(
        &mut self,
        bf_blob: &[u8],
        mut progress: impl FnMut(usize, usize),
    ) -> Result<SendStats> {
        let header = BfHeader::parse(bf_blob)?;
        let region1_len = header.region1_len as usize;
        let region2_len = header.region2_len as usize;
        if HEADER_SIZE + region1_len + region2_len > bf_blob.len() {
            return Err(Error::Truncated(
                "BF file truncated relative to header lengths".into(),
            ));
        }

        let pkg1 = region1_len.div_ceil(PACKAGE_SIZE);
        let pkg2 = region2_len.div_ceil(PACKAGE_SIZE);
        let total = (pkg1 + pkg2) * PACKAGE_SIZE;
        let mut done = 0usize;

        info!("BF regions: {region1_len}B ({pkg1} pkg) + {region2_len}B ({pkg2} pkg)");
        self.enter_bootloader()?;

        self.exchange(CMD_REGION1_COUNT, 0, &[pkg1 as u8])?;
        for i in 0..pkg1 {
            let chunk = package(bf_blob, HEADER_SIZE + i * PACKAGE_SIZE);
            self.exchange(CMD_DATA, i as u8, &chunk)?;
            done += PACKAGE_SIZE;
            progress(done, total);
        }

        // The region-2 count is announced even when it is zero
        self.exchange(CMD_REGION2_COUNT, 0, &[pkg2 as u8])?;
        for i in 0..pkg2 {
            let chunk = package(bf_blob, HEADER_SIZE + region1_len + i * PACKAGE_SIZE);
            self.exchange(CMD_DATA, i as u8, &chunk)?;
            done += PACKAGE_SIZE;
            progress(done, total);
        }

        self.exchange(CMD_UPDATE_END, 0, &[])?;
        info!("Vendor update end sent");

        Ok(SendStats {
            region1_len,
            region2_len,
            packages1: pkg1,
            packages2: pkg2,
        })
    }
}

/// Extract one 1024-byte package starting at `offset`, padded with 0xFF.
fn package(blob: &[u8], offset: usize) -> Vec<u8> {
    let end = (offset + PACKAGE_SIZE).min(blob.len());
    let mut chunk = blob[offset.min(end)..end].to_vec();
    chunk.resize(PACKAGE_SIZE, 0xFF);
    chunk
}

/// Vector-table plausibility report for a decrypted firmware image.
#[derive(Debug, Clone)]
pub struct VectorTableReport {
    /// True when the image looks consistent with the start address.
    pub plausible: bool,
    /// Why the verdict was reached.
    pub reason: String,
    /// Initial stack pointer (word 0).
    pub sp: u32,
    /// Reset handler (word 1, with the Thumb bit).
    pub reset: u32,
}

/// Heuristic Cortex-M vector-table check. Does not touch the radio.
pub fn analyze_vector_table(firmware: &[u8], start_address: u32) -> VectorTableReport {
    if firmware.len() < 8 {
        return VectorTableReport {
            plausible: false,
            reason: "image too small to contain a vector table".into(),
            sp: 0,
            reset: 0,
        };
    }

    let sp = u32::from_le_bytes([firmware[0], firmware[1], firmware[2], firmware[3]]);
    let reset = u32::from_le_bytes([firmware[4], firmware[5], firmware[6], firmware[7]]);
    let reset_addr = reset & !1;

    let mut report = VectorTableReport {
        plausible: false,
        reason: String::new(),
        sp,
        reset,
    };

    if !(0x2000_0000..=0x2008_0000).contains(&sp) {
        report.reason = "initial SP not in expected SRAM range".into();
        return report;
    }
    if reset & 1 == 0 {
        report.reason = "reset handler is not Thumb (LSB is 0)".into();
        return report;
    }

    let span = firmware.len().min(FW_FLASH_LIMIT) as u32;
    if !(start_address..start_address + span).contains(&reset_addr) {
        report.reason = format!(
            "reset handler 0x{reset_addr:08X} outside [0x{start_address:08X}, 0x{:08X})",
            start_address + span
        );
        return report;
    }

    report.plausible = true;
    report.reason = "vector table looks consistent for start address".into();
    report
}

/// Pre-flight refusals for a decrypted region-1 firmware image.
///
/// Returns accumulated warnings on success; fails with [`Error::Unsafe`]
/// when the image is suspiciously small (unless `allow_small`) or carries a
/// dumper signature without `firmware_type == "dumper"`.
pub fn check_firmware_image(
    firmware: &[u8],
    firmware_type: Option<&str>,
    allow_small: bool,
) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if firmware.len() < MIN_FIRMWARE_BYTES && !allow_small {
        return Err(Error::Unsafe(format!(
            "firmware too small ({} bytes); pass allow_small for intentional tiny images",
            firmware.len()
        )));
    }

    let upper: Vec<u8> = firmware.iter().map(u8::to_ascii_uppercase).collect();
    let matched: Vec<&str> = DUMPER_SIGNATURES
        .iter()
        .filter(|sig| upper.windows(sig.len()).any(|w| w == **sig))
        .map(|sig| std::str::from_utf8(sig).unwrap_or(""))
        .collect();

    if !matched.is_empty() {
        warnings.push(format!(
            "firmware contains dumper-like signatures: {}",
            matched.join(", ")
        ));
        if firmware_type != Some("dumper") {
            return Err(Error::Unsafe(
                "this firmware appears to be a dumper image; refusing unless \
                 firmware_type is explicitly \"dumper\""
                    .into(),
            ));
        }
    }

    Ok(warnings)
}
