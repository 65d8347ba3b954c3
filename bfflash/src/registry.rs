//! Static registry of supported radio models.
//!
//! One descriptor per model: wire protocol, baud rate, handshake magic,
//! firmware-version match patterns, logo geometry, and capabilities. The
//! table is read-only; actions look models up by name or by the version
//! string returned during identification.

use crate::codec::logo::PixelOrder;

/// Wire protocol variant a model speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    /// 9600-baud clone protocol with 7-byte magic (UV-5R family).
    Uv5r,
    /// 115200-baud A5-framed logo protocol (UV-17 family).
    Uv17Pro,
    /// 115200-baud PSEARCH/W-packet picture protocol (DM-32 series).
    Dm32uvPicture,
}

/// Logo geometry for a model.
#[derive(Debug, Clone, Copy)]
pub struct LogoRegion {
    /// Byte offset of the logo within the device memory or stream.
    pub offset: u32,
    /// Logo width in pixels.
    pub width: u32,
    /// Logo height in pixels.
    pub height: u32,
    /// RGB565 channel order the panel expects.
    pub pixel_order: PixelOrder,
}

/// What a model supports.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    /// Full memory image download.
    pub read_clone: bool,
    /// Full memory image upload.
    pub write_clone: bool,
    /// Boot logo upload.
    pub flash_logo: bool,
    /// Vendor `.BF` firmware update.
    pub flash_firmware: bool,
}

/// Declarative model descriptor. Immutable; created once in [`MODELS`].
#[derive(Debug, Clone, Copy)]
pub struct RadioModel {
    /// Model name as shown to the user.
    pub name: &'static str,
    /// Vendor name.
    pub vendor: &'static str,
    /// Wire protocol variant.
    pub protocol: ProtocolKind,
    /// Serial baud rate.
    pub baud_rate: u32,
    /// Handshake magic bytes.
    pub magic: &'static [u8],
    /// Patterns matched against the firmware version string.
    pub version_matchers: &'static [&'static [u8]],
    /// Logo geometry, when the model has a writable logo.
    pub logo: Option<LogoRegion>,
    /// Supported operations.
    pub caps: Capabilities,
}

/// Clone-protocol magics, tried in this order during identification.
pub const UV5R_MAGIC_291: &[u8] = &[0x50, 0xBB, 0xFF, 0x20, 0x12, 0x07, 0x25];
const UV5R_MAGIC_ORIG: &[u8] = &[0x50, 0xBB, 0xFF, 0x01, 0x25, 0x98, 0x4D];
const UV82_MAGIC: &[u8] = &[0x50, 0xBB, 0xFF, 0x20, 0x13, 0x01, 0x05];
const UV6_MAGIC: &[u8] = &[0x50, 0xBB, 0xFF, 0x20, 0x12, 0x08, 0x23];
const F11_MAGIC: &[u8] = &[0x50, 0xBB, 0xFF, 0x13, 0xA1, 0x11, 0xDD];
const A58_MAGIC: &[u8] = &[0x50, 0xBB, 0xFF, 0x20, 0x14, 0x04, 0x13];
const UV5G_MAGIC: &[u8] = &[0x50, 0xBB, 0xFF, 0x20, 0x12, 0x06, 0x25];
const UV6_MAGIC_ORIG: &[u8] = &[0x50, 0xBB, 0xFF, 0x12, 0x03, 0x98, 0x4D];

const CLONE_CAPS: Capabilities = Capabilities {
    read_clone: true,
    write_clone: true,
    flash_logo: true,
    flash_firmware: false,
};

/// The model registry. Read-only after initialisation.
pub static MODELS: &[RadioModel] = &[
    RadioModel {
        name: "UV5R",
        vendor: "Baofeng",
        protocol: ProtocolKind::Uv5r,
        baud_rate: 9600,
        magic: UV5R_MAGIC_291,
        version_matchers: &[b"BFS", b"BFB", b"N5R-2", b"N5R2", b"N5RV", b"BTS", b"D5R2", b"B5R2"],
        logo: None,
        caps: CLONE_CAPS,
    },
    RadioModel {
        name: "UV82",
        vendor: "Baofeng",
        protocol: ProtocolKind::Uv5r,
        baud_rate: 9600,
        magic: UV82_MAGIC,
        version_matchers: &[b"US2S2", b"B82S", b"BF82", b"N82-2", b"N822"],
        logo: None,
        caps: CLONE_CAPS,
    },
    RadioModel {
        name: "UV6",
        vendor: "Baofeng",
        protocol: ProtocolKind::Uv5r,
        baud_rate: 9600,
        magic: UV6_MAGIC,
        version_matchers: &[b"BF1", b"UV6"],
        logo: None,
        caps: CLONE_CAPS,
    },
    RadioModel {
        name: "F11",
        vendor: "Baofeng",
        protocol: ProtocolKind::Uv5r,
        baud_rate: 9600,
        magic: F11_MAGIC,
        version_matchers: &[b"USA"],
        logo: None,
        caps: CLONE_CAPS,
    },
    RadioModel {
        name: "F8HP",
        vendor: "Baofeng",
        protocol: ProtocolKind::Uv5r,
        baud_rate: 9600,
        magic: UV5R_MAGIC_291,
        version_matchers: &[b"BFP3V3 F", b"N5R-3", b"N5R3", b"F5R3", b"BFT"],
        logo: None,
        caps: CLONE_CAPS,
    },
    RadioModel {
        name: "UV-5RM",
        vendor: "Baofeng",
        protocol: ProtocolKind::Uv17Pro,
        baud_rate: 115200,
        magic: b"PROGRAMBFNORMALU",
        version_matchers: &[],
        logo: Some(LogoRegion {
            offset: 0,
            width: 160,
            height: 128,
            pixel_order: PixelOrder::Bgr,
        }),
        caps: Capabilities {
            read_clone: false,
            write_clone: false,
            flash_logo: true,
            flash_firmware: true,
        },
    },
    RadioModel {
        name: "UV-17Pro",
        vendor: "Baofeng",
        protocol: ProtocolKind::Uv17Pro,
        baud_rate: 115200,
        magic: b"PROGRAMBFNORMALU",
        version_matchers: &[],
        logo: Some(LogoRegion {
            offset: 0,
            width: 160,
            height: 128,
            pixel_order: PixelOrder::Bgr,
        }),
        caps: Capabilities {
            read_clone: false,
            write_clone: false,
            flash_logo: true,
            flash_firmware: true,
        },
    },
    RadioModel {
        name: "DM-32UV",
        vendor: "Baofeng",
        protocol: ProtocolKind::Dm32uvPicture,
        baud_rate: 115200,
        magic: b"PSEARCH",
        version_matchers: &[],
        logo: Some(LogoRegion {
            offset: 0,
            width: 240,
            height: 320,
            pixel_order: PixelOrder::Rgb,
        }),
        caps: Capabilities {
            read_clone: false,
            write_clone: false,
            flash_logo: true,
            flash_firmware: false,
        },
    },
];

/// Look a model up by name (case-insensitive).
pub fn get_model(name: &str) -> Option<&'static RadioModel> {
    MODELS
        .iter()
        .find(|m| m.name.eq_ignore_ascii_case(name.trim()))
}

/// Match a firmware version string against the registry.
pub fn detect_model(version: &[u8]) -> Option<&'static RadioModel> {
    MODELS.iter().find(|m| {
        m.version_matchers
            .iter()
            .any(|pat| version.windows(pat.len()).any(|w| w == *pat))
    })
}

/// Clone-protocol magic candidates in identification order.
pub fn magic_candidates() -> Vec<&'static [u8]> {
    vec![
        UV5R_MAGIC_291,
        UV5R_MAGIC_ORIG,
        UV82_MAGIC,
        UV6_MAGIC,
        F11_MAGIC,
        A58_MAGIC,
        UV5G_MAGIC,
        UV6_MAGIC_ORIG,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_model_case_insensitive() {
        assert_eq!(get_model("uv5r").unwrap().name, "UV5R");
        assert_eq!(get_model(" dm-32uv ").unwrap().name, "DM-32UV");
        assert!(get_model("nope").is_none());
    }

    #[test]
    fn test_detect_model_from_version() {
        assert_eq!(detect_model(b"  BFB297").unwrap().name, "UV5R");
        assert_eq!(detect_model(b"  B82S01").unwrap().name, "UV82");
        assert!(detect_model(b"ZZZ").is_none());
    }

    #[test]
    fn test_magic_candidates_start_with_modern_uv5r() {
        let magics = magic_candidates();
        assert_eq!(magics[0], UV5R_MAGIC_291);
        assert!(magics.iter().all(|m| m.len() == 7));
    }

    #[test]
    fn test_protocol_baud_pairing() {
        for model in MODELS {
            match model.protocol {
                ProtocolKind::Uv5r => assert_eq!(model.baud_rate, 9600),
                ProtocolKind::Uv17Pro | ProtocolKind::Dm32uvPicture => {
                    assert_eq!(model.baud_rate, 115200);
                }
            }
        }
    }
}
