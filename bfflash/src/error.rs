//! Error types for bfflash.

use std::io;
use thiserror::Error;

/// Result type for bfflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for bfflash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The port did not deliver bytes within the deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// I/O attempted on a port that is not open.
    #[error("Serial port is not open")]
    NotOpen,

    /// Wrong start/end byte, wrong length, or CRC mismatch on the wire.
    #[error("Framing error: {0}")]
    Framing(String),

    /// Echoed field mismatch, unexpected command byte, or other
    /// violation of the expected exchange.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Handshake never succeeded against any candidate magic.
    #[error("No contact with radio: {0}")]
    NoContact(String),

    /// Framed error code reported by the radio during a vendor-protocol
    /// exchange (0xE1..0xE5).
    #[error("Radio error 0x{code:02X}: {message}")]
    Device {
        /// Error code from the response command field.
        code: u8,
        /// Human-readable classification of the code.
        message: String,
    },

    /// Safety controller or firmware-sanity refusal. Never recovered.
    #[error("Refused: {0}")]
    Unsafe(String),

    /// BF package or BIN container fails structural validation.
    #[error("Truncated: {0}")]
    Truncated(String),

    /// Input data does not match the expected format.
    #[error("Format error: {0}")]
    Format(String),

    /// Operation not supported on the detected model.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Invalid caller-supplied parameter.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Suggested remediation for the error class, if a standard hint exists.
    ///
    /// The catalogue is intentionally short and stable so front-ends can
    /// show the same advice everywhere.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            #[cfg(feature = "native")]
            Self::Serial(_) => Some(
                "Close other serial applications (CHIRP, Arduino IDE) and check the USB driver.",
            ),
            Self::Io(_) => Some("Check the cable and USB connection."),
            Self::Timeout(_) => Some("Check the cable connection; power-cycle the radio and retry."),
            Self::NoContact(_) => Some(
                "Radio may be in the wrong mode or a different model. Power-cycle it and verify the model.",
            ),
            Self::Framing(_) | Self::Protocol(_) => {
                Some("Noisy or unstable link. Retry; try a different cable or USB port.")
            }
            Self::Device { .. } => Some("Power-cycle the radio and retry the operation."),
            Self::Unsafe(_) => {
                Some("Re-run with explicit write permission (--write and the WRITE confirmation).")
            }
            Self::Truncated(_) | Self::Format(_) => {
                Some("Check the input file; it may be incomplete or of the wrong type.")
            }
            Self::NotOpen | Self::Unsupported(_) | Self::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_detail() {
        let err = Error::Framing("CRC mismatch".into());
        assert!(err.to_string().contains("CRC mismatch"));
    }

    #[test]
    fn test_device_error_formats_code() {
        let err = Error::Device {
            code: 0xE2,
            message: "data check error".into(),
        };
        assert!(err.to_string().contains("0xE2"));
    }

    #[test]
    fn test_remediation_for_unsafe() {
        let err = Error::Unsafe("write flag required".into());
        assert!(err.remediation().unwrap().contains("--write"));
    }
}
