//! High-level workflow actions.
//!
//! Each action composes transport, protocol, codec, and the safety gate
//! into one operation and reports a uniform [`OperationResult`]. Expected
//! protocol failures (timeouts, refusals, device errors) become
//! `ok = false` results rather than propagating; the caller decides how to
//! render them.
//!
//! Actions are generic over [`Port`] so the full path can be driven by a
//! mock in tests. Write paths fail fast when the write flag is missing,
//! before any byte reaches the port, and run the full permission gate
//! again at the last moment before the first mutating transfer.

use std::collections::HashMap;
use std::path::Path;

use log::info;
use sha2::{Digest, Sha256};

use crate::codec::logo::{self, BitmapLayout, PixelOrder};
use crate::codec::bf;
use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::a5::{self, LogoUploader};
use crate::protocol::clone::CloneProtocol;
use crate::protocol::dm32uv::{self, PictureUploader};
use crate::protocol::vendor::{
    analyze_vector_table, check_firmware_image, VendorFlasher, FW_FLASH_BASE,
};
use crate::registry::{self, ProtocolKind};
use crate::safety::{require_write_permission, SafetyContext};

/// Reject a known model whose registry entry does not speak `expected`.
fn check_protocol(model: &str, expected: ProtocolKind) -> Result<()> {
    if let Some(entry) = registry::get_model(model) {
        if entry.protocol != expected {
            return Err(Error::Unsupported(format!(
                "{} does not use the {expected:?} protocol",
                entry.name
            )));
        }
    }
    Ok(())
}

/// Uniform outcome record for every workflow action.
#[derive(Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OperationResult {
    /// Whether the operation completed successfully.
    pub ok: bool,
    /// Operation name (e.g., "read_clone").
    pub operation: String,
    /// Detected or specified radio model.
    pub model: String,
    /// Target region description.
    pub region: String,
    /// Number of bytes processed.
    pub bytes_len: usize,
    /// Hash values (sha256, before/after).
    pub hashes: HashMap<String, String>,
    /// Non-blocking issues encountered.
    pub warnings: Vec<String>,
    /// Blocking errors that caused failure.
    pub errors: Vec<String>,
    /// Additional operation-specific data.
    pub metadata: HashMap<String, String>,
    /// Key step lines recorded during the operation.
    pub logs: Vec<String>,
    /// Raw bytes produced by the operation (clone images), not serialised.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub payload: Option<Vec<u8>>,
}

impl OperationResult {
    /// Create a successful result.
    pub fn success(operation: &str) -> Self {
        Self {
            ok: true,
            operation: operation.to_string(),
            ..Self::default()
        }
    }

    /// Create a failed result carrying one error.
    pub fn failure(operation: &str, error: &Error) -> Self {
        let mut result = Self {
            ok: false,
            operation: operation.to_string(),
            ..Self::default()
        };
        result.push_error(error);
        result
    }

    /// Add a warning message.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Add an error message and mark the result as failed.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.ok = false;
    }

    /// Add a log line.
    pub fn add_log(&mut self, message: impl Into<String>) {
        self.logs.push(message.into());
    }

    /// Record an [`Error`] with its remediation hint, failing the result.
    pub fn push_error(&mut self, error: &Error) {
        self.add_error(error.to_string());
        if let Some(hint) = error.remediation() {
            self.add_warning(hint);
        }
    }

    /// Human-readable summary suitable for CLI output.
    pub fn to_summary(&self) -> String {
        let mut lines = vec![format!(
            "[{}] {}",
            if self.ok { "SUCCESS" } else { "FAILED" },
            self.operation
        )];
        if !self.model.is_empty() {
            lines.push(format!("  Model: {}", self.model));
        }
        if !self.region.is_empty() {
            lines.push(format!("  Region: {}", self.region));
        }
        if self.bytes_len > 0 {
            lines.push(format!("  Bytes: {}", self.bytes_len));
        }
        let mut hashes: Vec<_> = self.hashes.iter().collect();
        hashes.sort();
        for (name, value) in hashes {
            lines.push(format!("  {name}: {value}"));
        }
        for warning in &self.warnings {
            lines.push(format!("  warning: {warning}"));
        }
        for error in &self.errors {
            lines.push(format!("  error: {error}"));
        }
        lines.join("\n")
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn hex_string(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02X}")).collect()
}

/// Fail fast when writes are disabled, before any port traffic.
///
/// Rules 1 and 2 of the permission gate need no device knowledge; checking
/// them here guarantees a refused operation never transmits a byte. The
/// full gate still runs later with the detected model.
fn precheck_write_enabled(ctx: &SafetyContext) -> Result<()> {
    if !ctx.simulate && !ctx.write_enabled {
        return Err(Error::Unsafe(
            "write flag required: pass --write (CLI) or acknowledge the risk (UI)".into(),
        ));
    }
    Ok(())
}

/// Identify the radio over the clone protocol.
pub fn identify_radio<P: Port>(port: &mut P) -> OperationResult {
    let mut result = OperationResult::success("identify");

    let mut proto = CloneProtocol::new(port);
    match proto.identify(&[]) {
        Ok(id) => {
            result.model = id.model.clone();
            result.metadata.insert("ident".into(), hex_string(&id.ident));
            result.metadata.insert(
                "version".into(),
                String::from_utf8_lossy(&id.version).trim().to_string(),
            );
            result
                .metadata
                .insert("has_dropped_byte".into(), id.has_dropped_byte.to_string());
            result
                .metadata
                .insert("is_original_fw".into(), id.is_original_fw.to_string());
            if result.model == "Unknown" {
                result.add_warning("Model could not be identified from the firmware version");
            }
        }
        Err(e) => return OperationResult::failure("identify", &e),
    }

    result
}

/// Download the full memory image from the radio.
///
/// On success the clone bytes are in `result.payload` and their SHA-256 in
/// `result.hashes["sha256"]`. Identification failures produce `ok = false`
/// with an empty model field.
pub fn read_clone<P: Port>(
    port: &mut P,
    mut progress: impl FnMut(&str, usize, usize),
) -> OperationResult {
    let mut result = OperationResult::success("read_clone");

    let mut proto = CloneProtocol::new(port);
    let ident = match proto.identify(&[]) {
        Ok(id) => id,
        Err(e) => return OperationResult::failure("read_clone", &e),
    };
    result.model = ident.model.clone();
    result
        .metadata
        .insert("ident".into(), hex_string(&ident.ident));
    result
        .metadata
        .insert("has_dropped_byte".into(), ident.has_dropped_byte.to_string());
    result.add_log(format!("identified {}", ident.model));

    let clone = match proto.download_clone(|done, total| progress("download", done, total)) {
        Ok(data) => data,
        Err(e) => {
            result.push_error(&e);
            return result;
        }
    };

    result.bytes_len = clone.len();
    result.hashes.insert("sha256".into(), sha256_hex(&clone));
    result.add_log(format!("downloaded {} bytes", clone.len()));
    result.payload = Some(clone);
    result
}

/// Patch a logo into a clone image held in memory.
fn patch_bytes(image: &mut [u8], offset: usize, patch: &[u8]) -> Result<()> {
    let end = offset
        .checked_add(patch.len())
        .ok_or_else(|| Error::Config("patch range overflows".into()))?;
    if end > image.len() {
        return Err(Error::Config(format!(
            "patch out of range (end 0x{end:X}, image 0x{:X})",
            image.len()
        )));
    }
    image[offset..end].copy_from_slice(patch);
    Ok(())
}

/// Options for [`flash_logo_clone`].
#[derive(Debug, Clone)]
pub struct LogoCloneOptions {
    /// Logo dimensions.
    pub size: (u32, u32),
    /// Bit-packing layout.
    pub layout: BitmapLayout,
    /// Apply Floyd-Steinberg dithering.
    pub dither: bool,
}

impl Default for LogoCloneOptions {
    fn default() -> Self {
        Self {
            size: (128, 64),
            layout: BitmapLayout::RowMsb,
            dither: false,
        }
    }
}

/// Flash a boot logo over the clone protocol.
///
/// Converts the image to a packed bitmap, downloads the clone, keeps an
/// in-memory backup (reported by hash), patches
/// `bytes [offset, offset + len)`, passes the safety gate, uploads, and
/// verifies by reading back. In simulate mode nothing touches the port.
pub fn flash_logo_clone<P: Port>(
    port: &mut P,
    image_path: impl AsRef<Path>,
    offset: usize,
    options: &LogoCloneOptions,
    ctx: &mut SafetyContext,
    mut progress: impl FnMut(&str, usize, usize),
) -> OperationResult {
    let mut result = OperationResult::success("flash_logo_clone");
    result.region = format!("logo at 0x{offset:06X}");

    if let Err(e) = precheck_write_enabled(ctx) {
        return OperationResult::failure("flash_logo_clone", &e);
    }

    let logo_bytes = match logo::convert_monochrome(
        &image_path,
        options.size,
        options.layout,
        options.dither,
    ) {
        Ok(bytes) => bytes,
        Err(e) => return OperationResult::failure("flash_logo_clone", &e),
    };
    result.bytes_len = logo_bytes.len();
    result
        .hashes
        .insert("logo_sha256".into(), sha256_hex(&logo_bytes));

    if ctx.simulate {
        result.model = ctx.model.clone();
        result.metadata.insert("simulated".into(), "true".into());
        result.add_warning("Simulation mode - no write performed");
        return result;
    }

    let mut proto = CloneProtocol::new(port);
    let ident = match proto.identify(&[]) {
        Ok(id) => id,
        Err(e) => {
            result.push_error(&e);
            return result;
        }
    };
    result.model = ident.model.clone();
    ctx.model = ident.model.clone();

    if let Some(entry) = registry::get_model(&ident.model) {
        if !entry.caps.write_clone {
            result.push_error(&Error::Unsupported(format!(
                "{} does not support clone writes",
                entry.name
            )));
            return result;
        }
    }

    progress("download", 0, 100);
    let clone = match proto.download_clone(|done, total| progress("download", done, total)) {
        Ok(data) => data,
        Err(e) => {
            result.push_error(&e);
            return result;
        }
    };
    result
        .hashes
        .insert("before".into(), sha256_hex(&clone));
    result
        .metadata
        .insert("clone_size".into(), clone.len().to_string());
    result.add_log(format!("backup hash {}", sha256_hex(&clone)));

    let mut patched = clone;
    if let Err(e) = patch_bytes(&mut patched, offset, &logo_bytes) {
        result.push_error(&e);
        return result;
    }
    result.hashes.insert("after".into(), sha256_hex(&patched));

    if let Err(e) =
        require_write_permission(ctx, &result.region, logo_bytes.len(), Some(offset as u32))
    {
        result.push_error(&e);
        return result;
    }

    progress("upload", 0, 100);
    if let Err(e) = proto.upload_clone(&patched, |done, total| progress("upload", done, total)) {
        result.push_error(&e);
        return result;
    }

    progress("verify", 0, 100);
    match proto.verify_clone(&patched) {
        Ok(mismatches) if mismatches.is_empty() => {
            result.metadata.insert("verified".into(), "true".into());
        }
        Ok(mismatches) => {
            result.metadata.insert("verified".into(), "false".into());
            result.add_error(format!(
                "readback verification failed at {} block(s), first at 0x{:04X}",
                mismatches.len(),
                mismatches[0].address
            ));
        }
        Err(e) => result.push_error(&e),
    }

    result
}

/// Flash a boot logo to a UV-17 family radio via the A5 protocol.
pub fn flash_logo_a5<P: Port>(
    port: &mut P,
    image_path: impl AsRef<Path>,
    pixel_order: PixelOrder,
    ctx: &mut SafetyContext,
    mut progress: impl FnMut(&str, usize, usize),
) -> OperationResult {
    let mut result = OperationResult::success("flash_logo_a5");
    result.model = ctx.model.clone();
    result.region = format!("logo panel {}x{}", a5::IMAGE_SIZE.0, a5::IMAGE_SIZE.1);

    if let Err(e) = precheck_write_enabled(ctx) {
        return OperationResult::failure("flash_logo_a5", &e);
    }
    if let Err(e) = check_protocol(&ctx.model, ProtocolKind::Uv17Pro) {
        return OperationResult::failure("flash_logo_a5", &e);
    }

    let payload = match logo::convert_to_rgb565(&image_path, a5::IMAGE_SIZE, pixel_order) {
        Ok(bytes) => bytes,
        Err(e) => return OperationResult::failure("flash_logo_a5", &e),
    };
    result.bytes_len = payload.len();
    result.hashes.insert("sha256".into(), sha256_hex(&payload));

    if ctx.simulate {
        result.metadata.insert("simulated".into(), "true".into());
        result.add_warning("Simulation mode - no write performed");
        return result;
    }

    if let Err(e) = require_write_permission(ctx, &result.region, payload.len(), None) {
        result.push_error(&e);
        return result;
    }

    let mut uploader = LogoUploader::new(port);
    match uploader.upload(&payload, |done, total| progress("upload", done, total)) {
        Ok(()) => {
            result.add_log("logo upload complete");
            result
                .metadata
                .insert("chunks".into(), payload.len().div_ceil(a5::DEFAULT_CHUNK).to_string());
        }
        Err(e) => result.push_error(&e),
    }
    result
}

/// Flash a boot picture to a DM-32UV radio.
pub fn flash_picture<P: Port>(
    port: &mut P,
    image_path: impl AsRef<Path>,
    base_addr: u32,
    ctx: &mut SafetyContext,
    mut progress: impl FnMut(&str, usize, usize),
) -> OperationResult {
    let mut result = OperationResult::success("flash_picture");
    result.model = ctx.model.clone();
    result.region = format!(
        "picture panel {}x{}",
        dm32uv::SCREEN_SIZE.0,
        dm32uv::SCREEN_SIZE.1
    );

    if let Err(e) = precheck_write_enabled(ctx) {
        return OperationResult::failure("flash_picture", &e);
    }
    if let Err(e) = check_protocol(&ctx.model, ProtocolKind::Dm32uvPicture) {
        return OperationResult::failure("flash_picture", &e);
    }

    let payload = match logo::convert_to_rgb565(&image_path, dm32uv::SCREEN_SIZE, PixelOrder::Rgb)
    {
        Ok(bytes) => bytes,
        Err(e) => return OperationResult::failure("flash_picture", &e),
    };
    result.bytes_len = payload.len();
    result.hashes.insert("sha256".into(), sha256_hex(&payload));

    if ctx.simulate {
        result.metadata.insert("simulated".into(), "true".into());
        result.add_warning("Simulation mode - no write performed");
        return result;
    }

    if let Err(e) = require_write_permission(ctx, &result.region, payload.len(), Some(base_addr)) {
        result.push_error(&e);
        return result;
    }

    let uploader = PictureUploader::new(port).with_base_addr(base_addr);
    let mut uploader = match uploader {
        Ok(up) => up,
        Err(e) => {
            result.push_error(&e);
            return result;
        }
    };

    if let Err(e) = uploader.preflight() {
        result.push_error(&e);
        return result;
    }
    match uploader.send_payload(&payload, |done, total| progress("upload", done, total)) {
        Ok(()) => result.add_log("picture upload complete"),
        Err(e) => result.push_error(&e),
    }
    result
}

/// Options for [`flash_firmware_bf`].
#[derive(Debug, Clone)]
pub struct FirmwareOptions {
    /// Model tag inserted into the raw handshake (`PROGRAM<tag>U`).
    pub model_tag: String,
    /// Declared firmware type; `"dumper"` acknowledges dumper images.
    pub firmware_type: Option<String>,
    /// Accept firmware smaller than the plausibility floor.
    pub allow_small: bool,
}

impl Default for FirmwareOptions {
    fn default() -> Self {
        Self {
            model_tag: "BFNORMAL".to_string(),
            firmware_type: None,
            allow_small: false,
        }
    }
}

/// Flash a wrapped `.BF` firmware package via the vendor protocol.
///
/// The package is unwrapped and decrypted for analysis only; the refusal
/// rules (size floor, dumper signatures, vector-table sanity) run against
/// the decrypted region 1 before the safety gate. The wire transfer sends
/// the original, still-scrambled bytes.
pub fn flash_firmware_bf<P: Port>(
    port: &mut P,
    bf_bytes: &[u8],
    ctx: &mut SafetyContext,
    opts: &FirmwareOptions,
    mut progress: impl FnMut(&str, usize, usize),
) -> OperationResult {
    let firmware_type = opts.firmware_type.as_deref();
    let allow_small = opts.allow_small;
    let mut result = OperationResult::success("flash_firmware_bf");
    result.model = ctx.model.clone();
    result.region = "firmware".to_string();

    if let Err(e) = precheck_write_enabled(ctx) {
        return OperationResult::failure("flash_firmware_bf", &e);
    }
    if let Some(entry) = registry::get_model(&ctx.model) {
        if !entry.caps.flash_firmware {
            return OperationResult::failure(
                "flash_firmware_bf",
                &Error::Unsupported(format!(
                    "{} does not support the vendor firmware protocol",
                    entry.name
                )),
            );
        }
    }

    // Decrypt region 1 for analysis; region 2 is stored unscrambled in
    // vendor files, and the transfer sends the original bytes anyway.
    let (firmware, _config, header) = match bf::unwrap(bf_bytes, true, false) {
        Ok(parts) => parts,
        Err(e) => return OperationResult::failure("flash_firmware_bf", &e),
    };
    result.bytes_len = bf_bytes.len();
    result
        .metadata
        .insert("region1_len".into(), header.region1_len.to_string());
    result
        .metadata
        .insert("region2_len".into(), header.region2_len.to_string());
    result
        .hashes
        .insert("region1_sha256".into(), sha256_hex(&firmware));

    match check_firmware_image(&firmware, firmware_type, allow_small) {
        Ok(warnings) => {
            for w in warnings {
                result.add_warning(w);
            }
        }
        Err(e) => {
            result.push_error(&e);
            return result;
        }
    }

    let vt = analyze_vector_table(&firmware, FW_FLASH_BASE);
    result
        .metadata
        .insert("vector_table_plausible".into(), vt.plausible.to_string());
    result
        .metadata
        .insert("vector_table_reason".into(), vt.reason.clone());
    if !vt.plausible && firmware_type != Some("dumper") {
        result.push_error(&Error::Unsafe(format!(
            "firmware vector table implausible: {}",
            vt.reason
        )));
        return result;
    }

    if ctx.simulate {
        result.metadata.insert("simulated".into(), "true".into());
        result.add_warning("Simulation mode - no write performed");
        return result;
    }

    if let Err(e) = require_write_permission(ctx, "firmware", bf_bytes.len(), None) {
        result.push_error(&e);
        return result;
    }

    let mut flasher = VendorFlasher::new(port).with_model_tag(opts.model_tag.as_bytes());
    if let Err(e) = flasher.handshake() {
        result.push_error(&e);
        return result;
    }
    match flasher.send_bf(bf_bytes, |done, total| progress("flash", done, total)) {
        Ok(stats) => {
            result
                .metadata
                .insert("packages1".into(), stats.packages1.to_string());
            result
                .metadata
                .insert("packages2".into(), stats.packages2.to_string());
            result.add_log("firmware update stream complete");
            info!("Firmware update finished");
        }
        Err(e) => result.push_error(&e),
    }
    result
}

/// Patch a logo into a clone image file without touching a radio.
pub fn patch_logo_offline(
    clone_path: impl AsRef<Path>,
    image_path: impl AsRef<Path>,
    offset: usize,
    options: &LogoCloneOptions,
) -> OperationResult {
    let mut result = OperationResult::success("patch_logo_offline");
    result.region = format!("0x{offset:06X}");

    let clone = match std::fs::read(&clone_path) {
        Ok(data) => data,
        Err(e) => return OperationResult::failure("patch_logo_offline", &Error::Io(e)),
    };

    let logo_bytes = match logo::convert_monochrome(
        &image_path,
        options.size,
        options.layout,
        options.dither,
    ) {
        Ok(bytes) => bytes,
        Err(e) => return OperationResult::failure("patch_logo_offline", &e),
    };
    result.bytes_len = logo_bytes.len();

    result.hashes.insert("before".into(), sha256_hex(&clone));
    let mut patched = clone;
    if let Err(e) = patch_bytes(&mut patched, offset, &logo_bytes) {
        result.push_error(&e);
        return result;
    }
    result.hashes.insert("after".into(), sha256_hex(&patched));

    if let Err(e) = std::fs::write(&clone_path, &patched) {
        result.push_error(&Error::Io(e));
        return result;
    }
    result.add_log(format!(
        "patched {} bytes at 0x{offset:06X}",
        result.bytes_len
    ));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::CONFIRMATION_TOKEN;
    use crate::testutil::MockPort;

    #[test]
    fn test_result_summary_mentions_status() {
        let mut result = OperationResult::success("read_clone");
        result.model = "UV5R".into();
        assert!(result.to_summary().contains("SUCCESS"));
        result.add_error("boom");
        assert!(result.to_summary().contains("FAILED"));
    }

    #[test]
    fn test_read_clone_no_contact_yields_empty_model() {
        let mut port = MockPort::new(&[]);
        let result = read_clone(&mut port, |_, _, _| {});
        assert!(!result.ok);
        assert!(result.model.is_empty());
        assert!(result.errors[0].contains("No contact"));
    }

    #[test]
    fn test_flash_firmware_refused_without_write_flag_before_io() {
        // A port that panics on write proves the gate fires first
        let mut port = MockPort::panicking();
        let mut ctx = SafetyContext::new("UV-5RM");
        let fw = vec![0u8; 16 * 1024];
        let blob = bf::wrap(&fw, &[], true, false);

        let result = flash_firmware_bf(
            &mut port,
            &blob,
            &mut ctx,
            &FirmwareOptions::default(),
            |_, _, _| {},
        );
        assert!(!result.ok);
        assert!(result.errors[0].contains("write flag required"));
    }

    #[test]
    fn test_flash_firmware_small_image_refused() {
        let mut port = MockPort::panicking();
        let mut ctx = SafetyContext::new("UV-5RM")
            .with_write_enabled(true)
            .with_token(CONFIRMATION_TOKEN);
        let blob = bf::wrap(&vec![0u8; 2048], &[], true, false);

        let result = flash_firmware_bf(
            &mut port,
            &blob,
            &mut ctx,
            &FirmwareOptions::default(),
            |_, _, _| {},
        );
        assert!(!result.ok);
        assert!(result.errors[0].contains("too small"));

        // allow_small clears the size refusal; the vector table check is
        // next in line and must reject the zero-filled image.
        let mut ctx = SafetyContext::new("UV-5RM")
            .with_write_enabled(true)
            .with_token(CONFIRMATION_TOKEN);
        let opts = FirmwareOptions {
            allow_small: true,
            ..FirmwareOptions::default()
        };
        let result = flash_firmware_bf(&mut port, &blob, &mut ctx, &opts, |_, _, _| {});
        assert!(!result.ok);
        assert!(result.errors[0].contains("vector table"));
    }

    #[test]
    fn test_flash_firmware_simulate_skips_port() {
        let mut port = MockPort::panicking();
        let mut ctx = SafetyContext::new("UV-5RM").with_simulate(true);

        let mut fw = vec![0u8; 16 * 1024];
        fw[0..4].copy_from_slice(&0x2000_4000u32.to_le_bytes());
        fw[4..8].copy_from_slice(&(FW_FLASH_BASE + 0x101).to_le_bytes());
        let blob = bf::wrap(&fw, &[], true, false);

        let result = flash_firmware_bf(
            &mut port,
            &blob,
            &mut ctx,
            &FirmwareOptions::default(),
            |_, _, _| {},
        );
        assert!(result.ok, "errors: {:?}", result.errors);
        assert_eq!(result.metadata.get("simulated").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_wrong_protocol_model_is_unsupported() {
        // A clone-protocol radio cannot take an A5 logo upload
        let mut port = MockPort::panicking();
        let mut ctx = SafetyContext::new("UV5R")
            .with_write_enabled(true)
            .with_token(CONFIRMATION_TOKEN);
        let result = flash_logo_a5(
            &mut port,
            "/nonexistent.png",
            crate::codec::logo::PixelOrder::Bgr,
            &mut ctx,
            |_, _, _| {},
        );
        assert!(!result.ok);
        assert!(result.errors[0].contains("Unsupported"));
    }

    #[test]
    fn test_patch_bytes_bounds() {
        let mut image = vec![0u8; 32];
        patch_bytes(&mut image, 8, &[1, 2, 3]).unwrap();
        assert_eq!(&image[8..11], &[1, 2, 3]);
        assert!(patch_bytes(&mut image, 30, &[1, 2, 3]).is_err());
    }
}
