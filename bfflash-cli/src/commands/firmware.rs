//! Firmware flashing and BF container commands.

use std::path::Path;

use anyhow::{bail, Context, Result};
use console::style;

use bfflash::actions::{self, FirmwareOptions};
use bfflash::codec::bf;

use crate::commands::{emit_result, expert_enabled, open_fast_port, progress_bar, SafetyArgs};

/// Flash a wrapped `.BF` firmware package via the vendor protocol.
#[allow(clippy::too_many_arguments)]
pub fn flash_firmware_bf(
    port_name: &str,
    file: &Path,
    model: &str,
    model_tag: &str,
    firmware_type: Option<&str>,
    allow_small: bool,
    safety: &SafetyArgs,
    json: bool,
) -> Result<i32> {
    if (allow_small || firmware_type.is_some()) && !expert_enabled() {
        bail!(
            "--allow-small and --firmware-type are expert-only flags; \
             set BFFLASH_EXPERT=1 to unlock them"
        );
    }

    let bf_bytes =
        std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
    let mut ctx = safety.to_context(model);
    let opts = FirmwareOptions {
        model_tag: model_tag.to_string(),
        firmware_type: firmware_type.map(str::to_string),
        allow_small,
    };

    if ctx.simulate || !ctx.write_enabled {
        let mut port = bfflash::NullPort;
        let result =
            actions::flash_firmware_bf(&mut port, &bf_bytes, &mut ctx, &opts, |_, _, _| {});
        return Ok(emit_result(&result, json));
    }

    let mut port = open_fast_port(port_name)?;
    println!(
        "{} Flashing firmware {} ({} bytes)...",
        style("→").cyan(),
        file.display(),
        bf_bytes.len()
    );
    println!(
        "{} Do not power off or disconnect the radio during the update.",
        style("!").red().bold()
    );

    let pb = progress_bar();
    let result = actions::flash_firmware_bf(&mut port, &bf_bytes, &mut ctx, &opts, {
        let pb = &pb;
        move |_, current, total| {
            if total > 0 {
                pb.set_position((current * 100 / total) as u64);
            }
        }
    });
    pb.finish_and_clear();

    Ok(emit_result(&result, json))
}

/// Unwrap a `.BF` file into its decrypted region binaries.
///
/// Region 2 is written as stored unless `descramble_region2` is set;
/// vendor files carry it unscrambled.
pub fn bf_unpack(
    file: &Path,
    output: &Path,
    keep_scrambled: bool,
    descramble_region2: bool,
) -> Result<i32> {
    let blob = std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;

    let (region1, region2, header) = bf::unwrap(&blob, !keep_scrambled, descramble_region2)
        .with_context(|| format!("cannot unwrap {}", file.display()))?;

    std::fs::write(output, &region1)
        .with_context(|| format!("cannot write {}", output.display()))?;
    println!(
        "{} region 1: {} bytes -> {}",
        style("✓").green(),
        region1.len(),
        output.display()
    );

    if !region2.is_empty() {
        let mut config_path = output.as_os_str().to_owned();
        config_path.push(".data");
        std::fs::write(&config_path, &region2)
            .with_context(|| format!("cannot write {}", Path::new(&config_path).display()))?;
        println!(
            "{} region 2: {} bytes -> {}",
            style("✓").green(),
            region2.len(),
            Path::new(&config_path).display()
        );
    }

    println!(
        "  header: regions={}, region1={}B, region2={}B",
        header.region_count, header.region1_len, header.region2_len
    );
    Ok(0)
}

/// Wrap firmware (and optional config data) into a `.BF` file.
///
/// Region 2 passes through unscrambled unless `scramble_region2` is set,
/// matching the vendor wrap tool.
pub fn bf_pack(
    firmware: &Path,
    config: Option<&Path>,
    output: &Path,
    no_scramble: bool,
    scramble_region2: bool,
) -> Result<i32> {
    let fw = std::fs::read(firmware)
        .with_context(|| format!("cannot read {}", firmware.display()))?;
    let data = match config {
        Some(path) => std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?,
        None => Vec::new(),
    };

    let blob = bf::wrap(&fw, &data, !no_scramble, scramble_region2);
    std::fs::write(output, &blob)
        .with_context(|| format!("cannot write {}", output.display()))?;
    println!(
        "{} wrote {} ({} bytes, {} region(s))",
        style("✓").green(),
        output.display(),
        blob.len(),
        if data.is_empty() { 1 } else { 2 }
    );
    Ok(0)
}
