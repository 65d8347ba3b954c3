//! BF firmware package codec.
//!
//! `.BF` files wrap one or two regions (firmware binary, optional config
//! data) behind a 16-byte big-endian header and a symmetric XOR scramble.
//!
//! ## Container layout
//!
//! ```text
//! +--------+----------------+----------------+----------+
//! | count  | region 1 len   | region 2 len   | reserved |
//! | 1 byte | u32 big-endian | u32 big-endian | 7 bytes  |
//! +--------+----------------+----------------+----------+
//! |              region 1 (scrambled)                   |
//! +-----------------------------------------------------+
//! |         region 2 (scrambled, if count == 2)         |
//! +-----------------------------------------------------+
//! ```
//!
//! Real-world files with `count == 1` frequently carry uninitialised
//! garbage in the region-2 length field; it is normalised to zero on parse.
//!
//! ## Scramble
//!
//! The payload is treated as 1024-byte packages. The first two and last two
//! packages pass through verbatim; of the rest, package `i` is XORed with
//! key `KDHT` when `i % 3 == 1`, with `RBGI` when `i % 3 == 2`, and passes
//! through when `i % 3 == 0`. Within an XORed package a byte `b` is left
//! alone when `b` is `0x00`, `0xFF`, the key byte, or the key byte's
//! complement. The transform is its own inverse.

use byteorder::{BigEndian, ByteOrder};
use log::debug;

use crate::error::{Error, Result};

/// Scramble package granularity.
pub const PACKAGE_SIZE: usize = 1024;

/// XOR key for packages where `i % 3 == 1`.
pub const XOR_KEY1: &[u8; 4] = b"KDHT";

/// XOR key for packages where `i % 3 == 2`.
pub const XOR_KEY2: &[u8; 4] = b"RBGI";

/// Container header size.
pub const HEADER_SIZE: usize = 16;

/// Parsed BF container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BfHeader {
    /// Number of wrapped regions (1 or 2).
    pub region_count: u8,
    /// Length of region 1 (the firmware binary).
    pub region1_len: u32,
    /// Length of region 2 (config data); forced to 0 when `region_count`
    /// is 1, regardless of the stored field.
    pub region2_len: u32,
    /// Reserved trailing header bytes, preserved as read.
    pub reserved: [u8; 7],
}

impl BfHeader {
    /// Parse the 16-byte header, normalising the region-2 length.
    pub fn parse(blob: &[u8]) -> Result<Self> {
        if blob.len() < HEADER_SIZE {
            return Err(Error::Truncated(
                "BF file too small for 16-byte header".into(),
            ));
        }

        let region_count = blob[0];
        if region_count != 1 && region_count != 2 {
            return Err(Error::Format(format!(
                "unsupported BF region count {region_count}"
            )));
        }

        let region1_len = BigEndian::read_u32(&blob[1..5]);
        let stored_region2 = BigEndian::read_u32(&blob[5..9]);
        // Single-region files leave this field uninitialised
        let region2_len = if region_count == 1 { 0 } else { stored_region2 };

        let mut reserved = [0u8; 7];
        reserved.copy_from_slice(&blob[9..16]);

        Ok(Self {
            region_count,
            region1_len,
            region2_len,
            reserved,
        })
    }
}

/// XOR one package with a 4-byte key, skipping the protected byte values.
fn xor_block(data: &mut [u8], key: &[u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        let k = key[i % 4];
        if *byte != 0x00 && *byte != 0xFF && *byte != k && *byte != (k ^ 0xFF) {
            *byte ^= k;
        }
    }
}

/// Apply the package scramble. Involution: `scramble(scramble(x)) == x`.
pub fn scramble(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    if data.is_empty() {
        return out;
    }

    let package_count = data.len().div_ceil(PACKAGE_SIZE);
    for i in 0..package_count {
        if i < 2 || i >= package_count.saturating_sub(2) {
            continue;
        }
        let start = i * PACKAGE_SIZE;
        let end = (start + PACKAGE_SIZE).min(out.len());
        match i % 3 {
            1 => xor_block(&mut out[start..end], XOR_KEY1),
            2 => xor_block(&mut out[start..end], XOR_KEY2),
            _ => {}
        }
    }
    out
}

/// Unwrap a BF container into its regions.
///
/// By default region 1 is descrambled and region 2 is returned as stored,
/// matching the upstream wrap tool.
pub fn unwrap(blob: &[u8], descramble_region1: bool, descramble_region2: bool) -> Result<(Vec<u8>, Vec<u8>, BfHeader)> {
    let header = BfHeader::parse(blob)?;

    let r1_end = HEADER_SIZE + header.region1_len as usize;
    if r1_end > blob.len() {
        return Err(Error::Truncated(
            "BF file truncated while reading region 1".into(),
        ));
    }
    let mut region1 = blob[HEADER_SIZE..r1_end].to_vec();

    let mut region2 = Vec::new();
    if header.region2_len > 0 {
        let r2_end = r1_end + header.region2_len as usize;
        if r2_end > blob.len() {
            return Err(Error::Truncated(
                "BF file truncated while reading region 2".into(),
            ));
        }
        region2 = blob[r1_end..r2_end].to_vec();
    }

    if descramble_region1 {
        region1 = scramble(&region1);
    }
    if descramble_region2 && !region2.is_empty() {
        region2 = scramble(&region2);
    }

    debug!(
        "Unwrapped BF: regions={}, region1={}B, region2={}B",
        header.region_count, header.region1_len, header.region2_len
    );
    Ok((region1, region2, header))
}

/// Wrap regions into a BF container.
///
/// Call sites conventionally scramble region 1 and pass region 2 through
/// as-is, matching the upstream wrap tool; both knobs are explicit so
/// files that scramble both regions can still be produced.
pub fn wrap(region1: &[u8], region2: &[u8], scramble_region1: bool, scramble_region2: bool) -> Vec<u8> {
    let r1 = if scramble_region1 {
        scramble(region1)
    } else {
        region1.to_vec()
    };
    let r2 = if scramble_region2 && !region2.is_empty() {
        scramble(region2)
    } else {
        region2.to_vec()
    };

    let mut out = vec![0u8; HEADER_SIZE];
    out[0] = if r2.is_empty() { 1 } else { 2 };
    BigEndian::write_u32(&mut out[1..5], r1.len() as u32);
    BigEndian::write_u32(&mut out[5..9], r2.len() as u32);
    // bytes 9..16 stay 0x00 (reserved)
    out.extend_from_slice(&r1);
    out.extend_from_slice(&r2);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 + 7) as u8).collect()
    }

    #[test]
    fn test_scramble_is_involution() {
        for len in [0, 1, 1024, 5000, 7 * PACKAGE_SIZE + 13] {
            let data = sample_payload(len);
            assert_eq!(scramble(&scramble(&data)), data, "len={len}");
        }
    }

    #[test]
    fn test_scramble_leaves_edges_verbatim() {
        let data = sample_payload(8 * PACKAGE_SIZE);
        let scrambled = scramble(&data);
        assert_eq!(&scrambled[..2 * PACKAGE_SIZE], &data[..2 * PACKAGE_SIZE]);
        assert_eq!(
            &scrambled[6 * PACKAGE_SIZE..],
            &data[6 * PACKAGE_SIZE..],
            "last two packages must pass through"
        );
        assert_ne!(scrambled, data, "middle packages must change");
    }

    #[test]
    fn test_scramble_protects_special_bytes() {
        // Package 4 (i % 3 == 1) is XORed with KDHT; protected values survive
        let mut data = vec![0u8; 7 * PACKAGE_SIZE];
        let base = 4 * PACKAGE_SIZE;
        data[base] = 0x00;
        data[base + 1] = 0xFF;
        data[base + 2] = XOR_KEY1[2];
        data[base + 3] = XOR_KEY1[3] ^ 0xFF;
        data[base + 4] = 0x42;

        let scrambled = scramble(&data);
        assert_eq!(scrambled[base], 0x00);
        assert_eq!(scrambled[base + 1], 0xFF);
        assert_eq!(scrambled[base + 2], XOR_KEY1[2]);
        assert_eq!(scrambled[base + 3], XOR_KEY1[3] ^ 0xFF);
        assert_eq!(scrambled[base + 4], 0x42 ^ XOR_KEY1[0]);
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let fw = sample_payload(5 * PACKAGE_SIZE + 100);
        let cfg = sample_payload(600);

        let blob = wrap(&fw, &cfg, true, true);
        assert_eq!(blob[0], 2);

        let (r1, r2, header) = unwrap(&blob, true, true).unwrap();
        assert_eq!(r1, fw);
        assert_eq!(r2, cfg);
        assert_eq!(header.region1_len as usize, fw.len());
        assert_eq!(header.region2_len as usize, cfg.len());
    }

    #[test]
    fn test_region_count_one_normalises_region2() {
        // count=1 with garbage in the region-2 length field
        let fw = sample_payload(2048);
        let mut blob = wrap(&fw, &[], false, false);
        BigEndian::write_u32(&mut blob[5..9], 0xDEAD_BEEF);

        let (r1, r2, header) = unwrap(&blob, false, false).unwrap();
        assert_eq!(header.region2_len, 0);
        assert!(r2.is_empty());
        assert_eq!(r1, fw);
    }

    #[test]
    fn test_unwrap_rejects_truncated_region() {
        let fw = sample_payload(2048);
        let mut blob = wrap(&fw, &[], false, false);
        blob.truncate(HEADER_SIZE + 100);

        let err = unwrap(&blob, false, false).unwrap_err();
        assert!(matches!(err, Error::Truncated(_)));
    }

    #[test]
    fn test_header_rejects_bad_region_count() {
        let mut blob = wrap(&sample_payload(64), &[], false, false);
        blob[0] = 9;
        assert!(matches!(
            BfHeader::parse(&blob).unwrap_err(),
            Error::Format(_)
        ));
    }
}
