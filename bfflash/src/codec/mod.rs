//! Byte-stream codecs consumed by the protocol drivers.

pub mod bf;
pub mod logo;

pub use bf::{scramble, unwrap, wrap, BfHeader};
pub use logo::{
    convert_monochrome, convert_to_rgb565, decode_rgb565, encode_rgb565, pack_bits, unpack_bits,
    BitmapLayout, PixelOrder,
};
