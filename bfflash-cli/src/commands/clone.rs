//! `identify` and `read-clone` commands.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use log::debug;

use bfflash::actions;

use crate::commands::{emit_result, open_clone_port, progress_bar};

/// Identify the connected radio over the clone protocol.
pub fn identify(port_name: &str, json: bool) -> Result<i32> {
    let mut port = open_clone_port(port_name)?;
    println!(
        "{} Identifying radio on {}...",
        style("→").cyan(),
        port_name
    );

    let result = actions::identify_radio(&mut port);
    Ok(emit_result(&result, json))
}

/// Download the full memory image and write it to `output`.
pub fn read_clone(port_name: &str, output: &Path, json: bool) -> Result<i32> {
    let mut port = open_clone_port(port_name)?;
    println!(
        "{} Reading clone from {}...",
        style("→").cyan(),
        port_name
    );

    let pb = progress_bar();
    let mut result = actions::read_clone(&mut port, |step, current, total| {
        pb.set_message(step.to_string());
        if total > 0 {
            pb.set_position((current * 100 / total) as u64);
        }
    });
    pb.finish_and_clear();

    if let Some(clone) = result.payload.take() {
        std::fs::write(output, &clone)
            .with_context(|| format!("cannot write {}", output.display()))?;
        debug!("Wrote {} bytes to {}", clone.len(), output.display());
        result
            .metadata
            .insert("output".into(), output.display().to_string());
    }

    Ok(emit_result(&result, json))
}
