//! End-to-end scenarios driven against a scripted mock port.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Duration;

use bfflash::actions::{self, LogoCloneOptions};
use bfflash::codec::logo::{convert_to_rgb565, PixelOrder};
use bfflash::protocol::a5::{A5Frame, LogoUploader, IMAGE_BYTES, IMAGE_SIZE};
use bfflash::protocol::vendor::VendorFrame;
use bfflash::protocol::CloneProtocol;
use bfflash::safety::SafetyContext;
use bfflash::{Error, Port};

const ACK: u8 = 0x06;

/// Scripted mock port for integration scenarios.
struct ScriptedPort {
    script: VecDeque<u8>,
    written: Vec<u8>,
    panic_on_write: bool,
    timeout: Duration,
}

impl ScriptedPort {
    fn new(script: &[u8]) -> Self {
        Self {
            script: script.iter().copied().collect(),
            written: Vec::new(),
            panic_on_write: false,
            timeout: Duration::from_millis(100),
        }
    }

    fn panicking() -> Self {
        Self {
            panic_on_write: true,
            ..Self::new(&[])
        }
    }
}

impl Read for ScriptedPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.script.is_empty() {
            return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(self.script.len());
        for b in buf.iter_mut().take(n) {
            *b = self.script.pop_front().expect("len checked");
        }
        Ok(n)
    }
}

impl Write for ScriptedPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        assert!(!self.panic_on_write, "unexpected write to mock port");
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Port for ScriptedPort {
    fn set_timeout(&mut self, timeout: Duration) -> bfflash::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn baud_rate(&self) -> u32 {
        115200
    }

    fn clear_buffers(&mut self) -> bfflash::Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn set_control_lines(&mut self, _dtr: bool, _rts: bool) -> bfflash::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> bfflash::Result<()> {
        Ok(())
    }

    fn drain(&mut self) -> bfflash::Result<usize> {
        // Scripted responses are not stale line noise
        Ok(0)
    }
}

/// Write a solid-colour PNG and return its path.
fn solid_png(dir: &tempfile::TempDir, name: &str, (w, h): (u32, u32), rgb: [u8; 3]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let img = image::RgbImage::from_pixel(w, h, image::Rgb(rgb));
    img.save(&path).expect("png written");
    path
}

/// Append one scripted clone-protocol block read response.
fn script_block_read(script: &mut Vec<u8>, addr: u16, data: &[u8], first: bool) {
    if !first {
        script.push(ACK);
    }
    script.push(b'X');
    script.push((addr >> 8) as u8);
    script.push((addr & 0xFF) as u8);
    script.push(data.len() as u8);
    script.extend_from_slice(data);
}

/// S1: a solid red 160x128 PNG converts to exactly 40960 bytes of
/// repeated `00 F8` under pixel order "rgb".
#[test]
fn s1_red_png_converts_to_repeated_f800() {
    let dir = tempfile::tempdir().unwrap();
    let path = solid_png(&dir, "red.png", IMAGE_SIZE, [255, 0, 0]);

    let bytes = convert_to_rgb565(&path, IMAGE_SIZE, PixelOrder::Rgb).unwrap();
    assert_eq!(bytes.len(), IMAGE_BYTES);
    for pair in bytes.chunks(2) {
        assert_eq!(pair, &[0x00, 0xF8]);
    }
}

/// S2: a captured handshake replay identifies a UV5R without the
/// dropped-byte quirk when the probe block's byte 15 is not 0xFF.
#[test]
fn s2_identify_uv5r_from_handshake_replay() {
    let mut script = Vec::new();
    // Handshake: magic -> ACK, 0x02 -> ident, ACK -> ACK
    script.push(ACK);
    script.extend_from_slice(&[0xAA, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xDD]);
    script.push(ACK);

    // Warm-up block 0x1E80
    script_block_read(&mut script, 0x1E80, &[0u8; 64], true);

    // Version block 0x1EC0 with "BFB297" at bytes 48..
    let mut version_block = [0x20u8; 64];
    version_block[48..54].copy_from_slice(b"BFB297");
    script_block_read(&mut script, 0x1EC0, &version_block, false);

    // Quirk probe block 0x1FC0; byte 15 is NOT 0xFF
    let mut probe_block = [0u8; 64];
    probe_block[15] = 0x42;
    script_block_read(&mut script, 0x1FC0, &probe_block, false);

    let mut port = ScriptedPort::new(&script);
    let mut proto = CloneProtocol::new(&mut port).with_block_delay(Duration::ZERO);
    let id = proto.identify(&[]).unwrap();

    assert_eq!(id.model, "UV5R");
    assert!(!id.has_dropped_byte);
    assert_eq!(id.version[..6], *b"BFB297");
}

/// S3: a BF whose decrypted region 1 is 2 KiB fails with an "unsafe"
/// refusal unless small firmware is explicitly allowed.
#[test]
fn s3_small_firmware_needs_explicit_override() {
    let blob = bfflash::codec::bf::wrap(&vec![0u8; 2048], &[], true, false);
    let mut port = ScriptedPort::panicking();

    let mut ctx = SafetyContext::new("UV-5RM")
        .with_write_enabled(true)
        .with_token("WRITE");
    let result = actions::flash_firmware_bf(
        &mut port,
        &blob,
        &mut ctx,
        &actions::FirmwareOptions::default(),
        |_, _, _| {},
    );
    assert!(!result.ok);
    assert!(result.errors[0].contains("too small"));
}

/// S4: simulate mode never touches the transport and reports success
/// with `simulated=true`.
#[test]
fn s4_flash_logo_simulate_never_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = solid_png(&dir, "logo.png", (128, 64), [0, 0, 0]);

    let mut port = ScriptedPort::panicking();
    let mut ctx = SafetyContext::new("UV5R").with_simulate(true);
    let result = actions::flash_logo_clone(
        &mut port,
        &path,
        0x1000,
        &LogoCloneOptions::default(),
        &mut ctx,
        |_, _, _| {},
    );

    assert!(result.ok, "errors: {:?}", result.errors);
    assert_eq!(
        result.metadata.get("simulated").map(String::as_str),
        Some("true")
    );
    assert!(port.written.is_empty());
}

/// Safety gate: with the write flag off, a mutating action fails before
/// any byte reaches the port (which would panic on write).
#[test]
fn safety_gate_fires_before_any_transmission() {
    let dir = tempfile::tempdir().unwrap();
    let path = solid_png(&dir, "logo.png", (128, 64), [0, 0, 0]);

    let mut port = ScriptedPort::panicking();
    let mut ctx = SafetyContext::new("UV5R");
    let result = actions::flash_logo_clone(
        &mut port,
        &path,
        0x1000,
        &LogoCloneOptions::default(),
        &mut ctx,
        |_, _, _| {},
    );

    assert!(!result.ok);
    assert!(result.errors[0].contains("write flag required"));
}

/// S5: a vendor frame with swapped CRC bytes fails unpack with a CRC
/// framing error.
#[test]
fn s5_swapped_crc_bytes_fail_framing() {
    let mut frame = VendorFrame::new(0x03, 0x00, vec![0xAA, 0xBB, 0xCC]).build();
    let n = frame.len();
    frame.swap(n - 3, n - 2);

    match VendorFrame::parse(&frame).unwrap_err() {
        Error::Framing(msg) => assert!(msg.contains("CRC mismatch")),
        other => panic!("expected Framing, got {other:?}"),
    }
}

/// S6: an A5 upload succeeds identically whether the radio answers write
/// frames with 0xEE data-ACKs or with 0x57 + 'Y' echoes.
#[test]
fn s6_a5_upload_accepts_both_ack_styles() {
    let payload = vec![0x5A; IMAGE_BYTES];
    let chunks = IMAGE_BYTES.div_ceil(1024);

    for echo_style in [false, true] {
        let mut script = vec![ACK];
        for cmd in [0x02u8, 0x04, 0x03] {
            script.extend(A5Frame::new(cmd, 0x0000, &b"Y"[..]).build());
        }
        for _ in 0..chunks {
            if echo_style {
                script.extend(A5Frame::new(0x57, 0x0000, &b"Y"[..]).build());
            } else {
                script.extend(A5Frame::new(0xEE, 0x0000, vec![0x04]).build());
            }
        }
        script.push(0x00);

        let mut port = ScriptedPort::new(&script);
        let mut uploader = LogoUploader::new(&mut port)
            .with_timeout(Duration::from_millis(50))
            .with_delays(Duration::ZERO, Duration::ZERO);

        let mut last = (0usize, 0usize);
        uploader
            .upload(&payload, |done, total| last = (done, total))
            .unwrap_or_else(|e| panic!("echo_style={echo_style}: {e}"));
        assert_eq!(last.1, IMAGE_BYTES);
    }
}
