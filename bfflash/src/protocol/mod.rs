//! Wire-protocol state machines.

pub mod a5;
pub mod clone;
pub mod crc;
pub mod dm32uv;
pub mod vendor;

pub use a5::{A5Frame, LogoUploader};
pub use clone::{CloneProtocol, Identification, VerifyMismatch};
pub use crc::{crc16_ccitt, crc16_xmodem};
pub use dm32uv::{BinHeader, PictureUploader};
pub use vendor::{VendorFlasher, VendorFrame};
