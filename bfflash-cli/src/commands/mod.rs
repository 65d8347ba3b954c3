//! Command implementations and shared CLI plumbing.

pub mod clone;
pub mod convert;
pub mod firmware;
pub mod logo;

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use dialoguer::theme::ColorfulTheme;
use indicatif::{ProgressBar, ProgressStyle};

use bfflash::port::FlowControl;
use bfflash::{NativePort, OperationResult, SafetyContext, SerialConfig};

/// Safety flags shared by every mutating command.
#[derive(Debug, Args)]
pub struct SafetyArgs {
    /// Enable writing to the radio (required for any mutation).
    #[arg(long)]
    pub write: bool,

    /// Non-interactive confirmation token (must be WRITE).
    #[arg(long, value_name = "TOKEN")]
    pub confirm: Option<String>,

    /// Dry run: validate and report, never touch the radio.
    #[arg(long)]
    pub simulate: bool,
}

impl SafetyArgs {
    /// Build a [`SafetyContext`] for `model`, wiring up an interactive
    /// prompt when stdin is a terminal and no token was supplied.
    pub fn to_context(&self, model: &str) -> SafetyContext {
        let mut ctx = SafetyContext::new(model)
            .with_write_enabled(self.write)
            .with_simulate(self.simulate);

        if let Some(token) = &self.confirm {
            ctx = ctx.with_token(token.clone());
        } else if std::io::stdin().is_terminal() {
            ctx = ctx.with_prompt(Box::new(|question: &str| {
                dialoguer::Input::<String>::with_theme(&ColorfulTheme::default())
                    .with_prompt(question.to_string())
                    .allow_empty(true)
                    .interact_text()
                    .unwrap_or_default()
            }));
        }

        ctx
    }
}

/// Open the 9600-baud clone-protocol port (RTS/CTS on).
pub fn open_clone_port(port_name: &str) -> Result<NativePort> {
    let config = SerialConfig::new(port_name, 9600)
        .with_timeout(Duration::from_millis(1500))
        .with_flow_control(FlowControl::Hardware);
    NativePort::open(&config).with_context(|| format!("cannot open port {port_name}"))
}

/// Open a 115200-baud port (no flow control) for the UV-17 / DM-32UV
/// protocols.
pub fn open_fast_port(port_name: &str) -> Result<NativePort> {
    let config = SerialConfig::new(port_name, 115200).with_timeout(Duration::from_millis(1000));
    NativePort::open(&config).with_context(|| format!("cannot open port {port_name}"))
}

/// Standard progress bar.
pub fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    #[allow(clippy::unwrap_used)] // Static template string, unwrap is safe
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

/// True when expert-only dangerous flags are unlocked via the
/// `BFFLASH_EXPERT` environment variable.
pub fn expert_enabled() -> bool {
    std::env::var("BFFLASH_EXPERT").is_ok_and(|v| !v.is_empty() && v != "0")
}

/// Print an [`OperationResult`] and return the process exit code.
pub fn emit_result(result: &OperationResult, json: bool) -> i32 {
    if json {
        match serde_json::to_string_pretty(result) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Error: cannot serialise result: {e}"),
        }
    } else {
        println!("{}", result.to_summary());
        if result.ok {
            println!("{} {}", style("✓").green(), style("done").bold());
        }
    }
    i32::from(!result.ok)
}

/// Parse "WxH" into a dimension pair.
pub fn parse_size(value: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{value}', expected WIDTHxHEIGHT"))?;
    let w = w.trim().parse().map_err(|e| format!("invalid width: {e}"))?;
    let h = h.trim().parse().map_err(|e| format!("invalid height: {e}"))?;
    Ok((w, h))
}

/// Parse a decimal or 0x-prefixed hexadecimal number.
pub fn parse_number(value: &str) -> std::result::Result<u32, String> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex number: {e}"))
    } else {
        value.parse().map_err(|e| format!("invalid number: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("128x64").unwrap(), (128, 64));
        assert_eq!(parse_size("160X128").unwrap(), (160, 128));
        assert!(parse_size("128").is_err());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("4096").unwrap(), 4096);
        assert_eq!(parse_number("0x1000").unwrap(), 0x1000);
        assert!(parse_number("zz").is_err());
    }
}
