//! Logo and picture flashing commands.

use std::path::Path;

use anyhow::Result;
use console::style;

use bfflash::actions::{self, LogoCloneOptions};
use bfflash::codec::logo::{BitmapLayout, PixelOrder};

use crate::commands::{
    emit_result, open_clone_port, open_fast_port, progress_bar, SafetyArgs,
};

/// Flash a monochrome boot logo by patching the clone image (UV-5R family).
#[allow(clippy::too_many_arguments)]
pub fn flash_logo(
    port_name: &str,
    image: &Path,
    offset: usize,
    size: (u32, u32),
    layout: BitmapLayout,
    dither: bool,
    safety: &SafetyArgs,
    json: bool,
) -> Result<i32> {
    // Model is filled in by identification during the action
    let mut ctx = safety.to_context("");

    let options = LogoCloneOptions {
        size,
        layout,
        dither,
    };

    let run = |ctx: &mut bfflash::SafetyContext| -> Result<bfflash::OperationResult> {
        if ctx.simulate || !ctx.write_enabled {
            // Simulations and refused writes never open the port
            let mut port = bfflash::NullPort;
            return Ok(actions::flash_logo_clone(
                &mut port,
                image,
                offset,
                &options,
                ctx,
                |_, _, _| {},
            ));
        }
        let mut port = open_clone_port(port_name)?;
        let pb = progress_bar();
        let result = actions::flash_logo_clone(&mut port, image, offset, &options, ctx, {
            let pb = &pb;
            move |step, current, total| {
                pb.set_message(step.to_string());
                if total > 0 {
                    pb.set_position((current * 100 / total) as u64);
                }
            }
        });
        pb.finish_and_clear();
        Ok(result)
    };

    println!(
        "{} Flashing logo {} at offset 0x{offset:06X}...",
        style("→").cyan(),
        image.display()
    );
    let result = run(&mut ctx)?;
    Ok(emit_result(&result, json))
}

/// Flash a colour boot logo via the A5 protocol (UV-17 family).
pub fn flash_logo_a5(
    port_name: &str,
    image: &Path,
    model: &str,
    pixel_order: PixelOrder,
    safety: &SafetyArgs,
    json: bool,
) -> Result<i32> {
    let mut ctx = safety.to_context(model);

    if ctx.simulate || !ctx.write_enabled {
        let mut port = bfflash::NullPort;
        let result =
            actions::flash_logo_a5(&mut port, image, pixel_order, &mut ctx, |_, _, _| {});
        return Ok(emit_result(&result, json));
    }

    let mut port = open_fast_port(port_name)?;
    println!(
        "{} Uploading logo {} to {model}...",
        style("→").cyan(),
        image.display()
    );

    let pb = progress_bar();
    let result = actions::flash_logo_a5(&mut port, image, pixel_order, &mut ctx, {
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

/// Flash a boot picture via the DM-32UV protocol.
pub fn flash_picture(
    port_name: &str,
    image: &Path,
    model: &str,
    base_addr: u32,
    safety: &SafetyArgs,
    json: bool,
) -> Result<i32> {
    let mut ctx = safety.to_context(model);

    if ctx.simulate || !ctx.write_enabled {
        let mut port = bfflash::NullPort;
        let result = actions::flash_picture(&mut port, image, base_addr, &mut ctx, |_, _, _| {});
        return Ok(emit_result(&result, json));
    }

    let mut port = open_fast_port(port_name)?;
    println!(
        "{} Uploading picture {} to {model}...",
        style("→").cyan(),
        image.display()
    );

    let pb = progress_bar();
    let result = actions::flash_picture(&mut port, image, base_addr, &mut ctx, {
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

/// Patch a logo into a clone image file on disk (no radio).
pub fn patch_logo(
    clone: &Path,
    image: &Path,
    offset: usize,
    size: (u32, u32),
    layout: BitmapLayout,
    dither: bool,
    json: bool,
) -> Result<i32> {
    let options = LogoCloneOptions {
        size,
        layout,
        dither,
    };
    let result = actions::patch_logo_offline(clone, image, offset, &options);
    Ok(emit_result(&result, json))
}
