//! # bfflash
//!
//! A library for writing boot logos and firmware to Baofeng handheld
//! radios over a serial K-plug, covering:
//!
//! - the UV-5R family clone protocol (block-level memory image transfer)
//! - the UV-17 family A5-framed boot-logo protocol
//! - the vendor CRC16-framed `.BF` firmware update protocol
//! - the DM-32UV "PowerOnPicture" protocol
//! - the codecs these protocols consume: the `.BF` XOR-scrambled
//!   container and image-to-RGB565 / monochrome bitmap conversion
//!
//! Every mutating operation is gated by the [`safety`] controller: an
//! explicit write flag plus either the `WRITE` confirmation token or an
//! interactive prompt.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bfflash::{actions, safety::SafetyContext};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "native")]
//!     {
//!         let mut port = bfflash::NativePort::open_simple("/dev/ttyUSB0", 9600)?;
//!         let result = actions::read_clone(&mut port, |_, _, _| {});
//!         println!("{}", result.to_summary());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod actions;
pub mod codec;
pub mod error;
pub mod port;
pub mod protocol;
pub mod registry;
pub mod safety;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
pub use {
    actions::OperationResult,
    codec::logo::{BitmapLayout, PixelOrder},
    error::{Error, Result},
    port::{NullPort, Port, PortEnumerator, PortInfo, SerialConfig},
    protocol::{A5Frame, CloneProtocol, LogoUploader, PictureUploader, VendorFlasher, VendorFrame},
    registry::{ProtocolKind, RadioModel},
    safety::{require_write_permission, SafetyContext, CONFIRMATION_TOKEN},
    transport::TransportExt,
};
