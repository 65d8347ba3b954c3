//! bfflash CLI - boot logos, clones, and firmware for Baofeng radios.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use env_logger::Env;
use std::path::PathBuf;

mod commands;

use commands::SafetyArgs;

/// bfflash - flash boot logos and firmware to Baofeng handheld radios.
#[derive(Parser)]
#[command(name = "bfflash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port to use (e.g. /dev/ttyUSB0, COM3).
    #[arg(short, long, env = "BFFLASH_PORT", global = true)]
    port: Option<String>,

    /// Verbose output level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit machine-readable JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// List available serial ports.
    ListPorts,

    /// Identify the connected radio (clone protocol).
    Identify,

    /// Download the radio's full memory image to a file.
    ReadClone {
        /// Output file for the clone image.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Flash a monochrome boot logo by patching the clone (UV-5R family).
    FlashLogo {
        /// Logo image file (PNG, JPG, BMP, ...).
        image: PathBuf,

        /// Clone-image offset of the logo (decimal or 0x hex).
        #[arg(long, value_parser = commands::parse_number)]
        offset: u32,

        /// Logo dimensions.
        #[arg(long, default_value = "128x64", value_parser = commands::parse_size)]
        size: (u32, u32),

        /// Bitmap layout (row_msb, row_lsb, page_msb, page_lsb).
        #[arg(long, default_value = "row_msb")]
        format: String,

        /// Apply Floyd-Steinberg dithering.
        #[arg(long)]
        dither: bool,

        #[command(flatten)]
        safety: SafetyArgs,
    },

    /// Upload a colour boot logo via the A5 protocol (UV-17 family).
    FlashLogoA5 {
        /// Logo image file.
        image: PathBuf,

        /// Radio model name (for reporting and the safety gate).
        #[arg(long, default_value = "UV-5RM")]
        model: String,

        /// RGB565 channel order (rgb or bgr).
        #[arg(long, default_value = "bgr")]
        pixel_order: String,

        #[command(flatten)]
        safety: SafetyArgs,
    },

    /// Upload a boot picture to a DM-32 series radio.
    FlashPicture {
        /// Picture image file.
        image: PathBuf,

        /// Radio model name.
        #[arg(long, default_value = "DM-32UV")]
        model: String,

        /// W-packet address base (decimal or 0x hex).
        #[arg(long, default_value = "0", value_parser = commands::parse_number)]
        base_addr: u32,

        #[command(flatten)]
        safety: SafetyArgs,
    },

    /// Flash a wrapped .BF firmware package (vendor protocol).
    FlashFirmwareBf {
        /// The .BF firmware file.
        file: PathBuf,

        /// Radio model name.
        #[arg(long, default_value = "UV-5RM")]
        model: String,

        /// Model tag for the raw handshake.
        #[arg(long, default_value = "BFNORMAL")]
        model_tag: String,

        /// Declared firmware type; "dumper" acknowledges dumper images
        /// (expert-only, requires BFFLASH_EXPERT=1).
        #[arg(long)]
        firmware_type: Option<String>,

        /// Accept firmware smaller than the plausibility floor
        /// (expert-only, requires BFFLASH_EXPERT=1).
        #[arg(long)]
        allow_small: bool,

        #[command(flatten)]
        safety: SafetyArgs,
    },

    /// Convert an image to an RGB565 or packed-bitmap byte stream.
    ConvertImage {
        /// Input image file.
        image: PathBuf,

        /// Output byte-stream file.
        #[arg(short, long)]
        output: PathBuf,

        /// Target dimensions.
        #[arg(long, default_value = "160x128", value_parser = commands::parse_size)]
        size: (u32, u32),

        /// Produce a 1-bpp packed bitmap instead of RGB565.
        #[arg(long)]
        mono: bool,

        /// RGB565 channel order (rgb or bgr).
        #[arg(long, default_value = "rgb")]
        pixel_order: String,

        /// Bitmap layout for --mono.
        #[arg(long, default_value = "row_msb")]
        format: String,

        /// Apply Floyd-Steinberg dithering for --mono.
        #[arg(long)]
        dither: bool,
    },

    /// Unwrap a .BF package into decrypted region binaries.
    BfUnpack {
        /// The .BF file.
        file: PathBuf,

        /// Output file for region 1 (region 2 lands next to it).
        #[arg(short, long)]
        output: PathBuf,

        /// Keep region 1 scrambled instead of decrypting it.
        #[arg(long)]
        keep_scrambled: bool,

        /// Also descramble region 2 (vendor files store it unscrambled).
        #[arg(long)]
        descramble_region2: bool,
    },

    /// Wrap firmware (and optional config data) into a .BF package.
    BfPack {
        /// Firmware binary.
        firmware: PathBuf,

        /// Optional config-data binary (region 2).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output .BF file.
        #[arg(short, long)]
        output: PathBuf,

        /// Skip the XOR scramble (debugging aid).
        #[arg(long)]
        no_scramble: bool,

        /// Also scramble region 2 (the vendor wrap tool leaves it plain).
        #[arg(long)]
        scramble_region2: bool,
    },

    /// Patch a logo into a clone image file on disk (no radio).
    PatchLogo {
        /// Clone image file to modify in place.
        clone: PathBuf,

        /// Logo image file.
        image: PathBuf,

        /// Clone-image offset of the logo.
        #[arg(long, value_parser = commands::parse_number)]
        offset: u32,

        /// Logo dimensions.
        #[arg(long, default_value = "128x64", value_parser = commands::parse_size)]
        size: (u32, u32),

        /// Bitmap layout.
        #[arg(long, default_value = "row_msb")]
        format: String,

        /// Apply Floyd-Steinberg dithering.
        #[arg(long)]
        dither: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", style("Error:").red().bold());
            1
        }
    };
    std::process::exit(code);
}

/// Serial port from flags, required by the device-facing commands.
fn require_port(cli: &Cli) -> Result<&str> {
    cli.port
        .as_deref()
        .context("no serial port specified; use -p or BFFLASH_PORT")
}

fn run(cli: &Cli) -> Result<i32> {
    match &cli.command {
        Commands::ListPorts => commands::convert::list_ports(cli.json),

        Commands::Identify => commands::clone::identify(require_port(cli)?, cli.json),

        Commands::ReadClone { output } => {
            commands::clone::read_clone(require_port(cli)?, output, cli.json)
        }

        Commands::FlashLogo {
            image,
            offset,
            size,
            format,
            dither,
            safety,
        } => commands::logo::flash_logo(
            require_port(cli)?,
            image,
            *offset as usize,
            *size,
            format.parse()?,
            *dither,
            safety,
            cli.json,
        ),

        Commands::FlashLogoA5 {
            image,
            model,
            pixel_order,
            safety,
        } => commands::logo::flash_logo_a5(
            require_port(cli)?,
            image,
            model,
            pixel_order.parse()?,
            safety,
            cli.json,
        ),

        Commands::FlashPicture {
            image,
            model,
            base_addr,
            safety,
        } => commands::logo::flash_picture(
            require_port(cli)?,
            image,
            model,
            *base_addr,
            safety,
            cli.json,
        ),

        Commands::FlashFirmwareBf {
            file,
            model,
            model_tag,
            firmware_type,
            allow_small,
            safety,
        } => commands::firmware::flash_firmware_bf(
            require_port(cli)?,
            file,
            model,
            model_tag,
            firmware_type.as_deref(),
            *allow_small,
            safety,
            cli.json,
        ),

        Commands::ConvertImage {
            image,
            output,
            size,
            mono,
            pixel_order,
            format,
            dither,
        } => commands::convert::convert_image(
            image,
            output,
            *size,
            *mono,
            pixel_order.parse()?,
            format.parse()?,
            *dither,
        ),

        Commands::BfUnpack {
            file,
            output,
            keep_scrambled,
            descramble_region2,
        } => commands::firmware::bf_unpack(file, output, *keep_scrambled, *descramble_region2),

        Commands::BfPack {
            firmware,
            config,
            output,
            no_scramble,
            scramble_region2,
        } => commands::firmware::bf_pack(
            firmware,
            config.as_deref(),
            output,
            *no_scramble,
            *scramble_region2,
        ),

        Commands::PatchLogo {
            clone,
            image,
            offset,
            size,
            format,
            dither,
        } => commands::logo::patch_logo(
            clone,
            image,
            *offset as usize,
            *size,
            format.parse()?,
            *dither,
            cli.json,
        ),
    }
}
