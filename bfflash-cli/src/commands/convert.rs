//! `convert-image` and `list-ports` commands.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use bfflash::codec::logo::{self, BitmapLayout, PixelOrder};
use bfflash::{PortEnumerator, PortInfo};

/// Convert an image to a radio byte stream and write it to `output`.
#[allow(clippy::too_many_arguments)]
pub fn convert_image(
    image: &Path,
    output: &Path,
    size: (u32, u32),
    mono: bool,
    pixel_order: PixelOrder,
    layout: BitmapLayout,
    dither: bool,
) -> Result<i32> {
    let bytes = if mono {
        logo::convert_monochrome(image, size, layout, dither)?
    } else {
        logo::convert_to_rgb565(image, size, pixel_order)?
    };

    std::fs::write(output, &bytes)
        .with_context(|| format!("cannot write {}", output.display()))?;
    println!(
        "{} {} -> {} ({} bytes, {}x{} {})",
        style("✓").green(),
        image.display(),
        output.display(),
        bytes.len(),
        size.0,
        size.1,
        if mono {
            format!("{layout:?}")
        } else {
            format!("RGB565/{pixel_order:?}")
        }
    );
    Ok(0)
}

/// List available serial ports.
pub fn list_ports(json: bool) -> Result<i32> {
    let ports = bfflash::NativePortEnumerator::list_ports()?;

    if json {
        let entries: Vec<serde_json::Value> = ports.iter().map(port_json).collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(0);
    }

    if ports.is_empty() {
        println!("  {}", style("No serial ports found").dim());
        return Ok(0);
    }

    println!("{}", style("Available Serial Ports").bold().underlined());
    for port in &ports {
        let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            format!(" ({vid:04X}:{pid:04X})")
        } else {
            String::new()
        };
        let product = port
            .product
            .as_deref()
            .map(|p| format!(" - {}", style(p).dim()))
            .unwrap_or_default();
        println!(
            "  {} {}{}{}",
            style("•").green(),
            style(&port.name).cyan(),
            vid_pid,
            product
        );
    }
    Ok(0)
}

fn port_json(port: &PortInfo) -> serde_json::Value {
    serde_json::json!({
        "name": port.name,
        "vid": port.vid,
        "pid": port.pid,
        "manufacturer": port.manufacturer,
        "product": port.product,
    })
}
