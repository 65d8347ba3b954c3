//! Logo image codec.
//!
//! Converts arbitrary raster images into the byte streams the radios
//! expect: 16-bit RGB565 (little-endian on the wire) for the colour-screen
//! models, or 1-bpp packed bitmaps in one of four layouts for monochrome
//! displays. The inverse decoders are pixel-exact so previews and tests can
//! round-trip the packed data.

use std::path::Path;
use std::str::FromStr;

use image::imageops::FilterType;
use image::{imageops, GrayImage, RgbImage};
use log::debug;

use crate::error::{Error, Result};

/// Which colour channel occupies the top 5 bits of an RGB565 word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelOrder {
    /// Red in bits 15..11 (standard RGB565).
    #[default]
    Rgb,
    /// Blue in bits 15..11 (what the UV-17 panel expects).
    Bgr,
}

impl FromStr for PixelOrder {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "rgb" => Ok(Self::Rgb),
            "bgr" => Ok(Self::Bgr),
            other => Err(Error::Config(format!(
                "invalid pixel order '{other}' (expected rgb or bgr)"
            ))),
        }
    }
}

/// Bit-packing layout for monochrome bitmaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitmapLayout {
    /// Row-major, bit 7 is the leftmost pixel.
    #[default]
    RowMsb,
    /// Row-major, bit 0 is the leftmost pixel.
    RowLsb,
    /// Pages of 8 vertically stacked pixels, top pixel in bit 7.
    PageMsb,
    /// Pages of 8 vertically stacked pixels, top pixel in bit 0.
    PageLsb,
}

impl FromStr for BitmapLayout {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().replace('-', "_").as_str() {
            "row_msb" | "row_major_msb" => Ok(Self::RowMsb),
            "row_lsb" | "row_major_lsb" => Ok(Self::RowLsb),
            "page_msb" | "page_major_msb" => Ok(Self::PageMsb),
            "page_lsb" | "page_major_lsb" => Ok(Self::PageLsb),
            other => Err(Error::Config(format!(
                "invalid bitmap layout '{other}' (expected row_msb, row_lsb, page_msb, or page_lsb)"
            ))),
        }
    }
}

/// Quantise an RGB888 pixel into a 5-6-5 word with the given channel order.
pub fn rgb565_word(r: u8, g: u8, b: u8, order: PixelOrder) -> u16 {
    let r5 = u16::from(r >> 3);
    let g6 = u16::from(g >> 2);
    let b5 = u16::from(b >> 3);
    match order {
        PixelOrder::Rgb => (r5 << 11) | (g6 << 5) | b5,
        PixelOrder::Bgr => (b5 << 11) | (g6 << 5) | r5,
    }
}

/// Pack an RGB image into RGB565 bytes, little-endian, row-major top-down.
///
/// The output length is exactly `2 * width * height`.
pub fn encode_rgb565(img: &RgbImage, order: PixelOrder) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 * img.width() as usize * img.height() as usize);
    for pixel in img.pixels() {
        let word = rgb565_word(pixel[0], pixel[1], pixel[2], order);
        out.extend_from_slice(&word.to_le_bytes());
    }
    out
}

/// Expand RGB565 bytes back into an RGB image for preview.
pub fn decode_rgb565(data: &[u8], width: u32, height: u32, order: PixelOrder) -> Result<RgbImage> {
    let expected = 2 * width as usize * height as usize;
    if data.len() != expected {
        return Err(Error::Format(format!(
            "RGB565 stream is {} bytes, expected {expected} for {width}x{height}",
            data.len()
        )));
    }

    let mut img = RgbImage::new(width, height);
    for (i, pixel) in img.pixels_mut().enumerate() {
        let word = u16::from_le_bytes([data[2 * i], data[2 * i + 1]]);
        let (hi5, mid6, lo5) = (
            ((word >> 11) & 0x1F) as u8,
            ((word >> 5) & 0x3F) as u8,
            (word & 0x1F) as u8,
        );
        let (r, b) = match order {
            PixelOrder::Rgb => (hi5, lo5),
            PixelOrder::Bgr => (lo5, hi5),
        };
        // 5/6-bit values expanded by bit replication
        pixel[0] = (r << 3) | (r >> 2);
        pixel[1] = (mid6 << 2) | (mid6 >> 4);
        pixel[2] = (b << 3) | (b >> 2);
    }
    Ok(img)
}

/// Load an image file and convert it to an RGB565 stream at exactly the
/// target dimensions.
pub fn convert_to_rgb565(
    input: impl AsRef<Path>,
    (width, height): (u32, u32),
    order: PixelOrder,
) -> Result<Vec<u8>> {
    let input = input.as_ref();
    let img = image::open(input)
        .map_err(|e| Error::Format(format!("cannot load {}: {e}", input.display())))?
        .resize_exact(width, height, FilterType::Lanczos3)
        .to_rgb8();

    debug!(
        "Converted {} to {width}x{height} RGB565 ({:?})",
        input.display(),
        order
    );
    Ok(encode_rgb565(&img, order))
}

/// Pack monochrome pixels (`true` = ink on) into bytes.
///
/// Row layouts emit `(width + 7) / 8` bytes per row; page layouts emit
/// `width` bytes per page of 8 rows.
pub fn pack_bits(pixels: &[bool], width: u32, height: u32, layout: BitmapLayout) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    debug_assert_eq!(pixels.len(), w * h);

    let at = |x: usize, y: usize| -> u8 { u8::from(pixels[y * w + x]) };
    let mut out = Vec::new();

    match layout {
        BitmapLayout::RowMsb | BitmapLayout::RowLsb => {
            for y in 0..h {
                for x0 in (0..w).step_by(8) {
                    let mut byte = 0u8;
                    for bit in 0..8 {
                        let x = x0 + bit;
                        if x < w && at(x, y) != 0 {
                            byte |= match layout {
                                BitmapLayout::RowMsb => 1 << (7 - bit),
                                _ => 1 << bit,
                            };
                        }
                    }
                    out.push(byte);
                }
            }
        }
        BitmapLayout::PageMsb | BitmapLayout::PageLsb => {
            let pages = h.div_ceil(8);
            for page in 0..pages {
                for x in 0..w {
                    let mut byte = 0u8;
                    for bit in 0..8 {
                        let y = page * 8 + bit;
                        if y < h && at(x, y) != 0 {
                            byte |= match layout {
                                BitmapLayout::PageMsb => 1 << (7 - bit),
                                _ => 1 << bit,
                            };
                        }
                    }
                    out.push(byte);
                }
            }
        }
    }

    out
}

/// Unpack bytes produced by [`pack_bits`] back into pixels.
pub fn unpack_bits(
    data: &[u8],
    width: u32,
    height: u32,
    layout: BitmapLayout,
) -> Result<Vec<bool>> {
    let (w, h) = (width as usize, height as usize);
    let expected = match layout {
        BitmapLayout::RowMsb | BitmapLayout::RowLsb => w.div_ceil(8) * h,
        BitmapLayout::PageMsb | BitmapLayout::PageLsb => w * h.div_ceil(8),
    };
    if data.len() != expected {
        return Err(Error::Format(format!(
            "bitmap is {} bytes, expected {expected} for {width}x{height} {layout:?}",
            data.len()
        )));
    }

    let mut pixels = vec![false; w * h];
    match layout {
        BitmapLayout::RowMsb | BitmapLayout::RowLsb => {
            let bytes_per_row = w.div_ceil(8);
            for y in 0..h {
                for x in 0..w {
                    let byte = data[y * bytes_per_row + x / 8];
                    let bit = match layout {
                        BitmapLayout::RowMsb => 7 - (x % 8),
                        _ => x % 8,
                    };
                    pixels[y * w + x] = (byte >> bit) & 1 != 0;
                }
            }
        }
        BitmapLayout::PageMsb | BitmapLayout::PageLsb => {
            for page in 0..h.div_ceil(8) {
                for x in 0..w {
                    let byte = data[page * w + x];
                    for bit in 0..8 {
                        let y = page * 8 + bit;
                        if y < h {
                            let shift = match layout {
                                BitmapLayout::PageMsb => 7 - bit,
                                _ => bit,
                            };
                            pixels[y * w + x] = (byte >> shift) & 1 != 0;
                        }
                    }
                }
            }
        }
    }

    Ok(pixels)
}

/// Load an image file, reduce it to 1 bpp, and pack it.
///
/// Thresholds at 50% grey, or runs Floyd–Steinberg dithering when `dither`
/// is set. A 1 bit means "ink on" (the source pixel was dark).
pub fn convert_monochrome(
    input: impl AsRef<Path>,
    (width, height): (u32, u32),
    layout: BitmapLayout,
    dither: bool,
) -> Result<Vec<u8>> {
    let input = input.as_ref();
    let mut gray: GrayImage = image::open(input)
        .map_err(|e| Error::Format(format!("cannot load {}: {e}", input.display())))?
        .resize_exact(width, height, FilterType::Lanczos3)
        .to_luma8();

    if dither {
        imageops::dither(&mut gray, &imageops::BiLevel);
    }

    let pixels: Vec<bool> = gray.pixels().map(|p| p[0] < 0x80).collect();
    debug!(
        "Converted {} to {width}x{height} monochrome ({layout:?}, dither={dither})",
        input.display()
    );
    Ok(pack_bits(&pixels, width, height, layout))
}
