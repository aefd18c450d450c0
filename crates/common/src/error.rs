//! Common error types

use thiserror::Error;

/// Errors reported by the bridge library
///
/// Each variant maps to the integer status code of the C API, see
/// [`Error::code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Unexpected failure of the USB stack (context, enumeration, open)
    #[error("Low-level USB error: {0}")]
    LowLevel(String),

    /// Registry used before `init` or after `deinit`, or session not open
    #[error("Not initialized")]
    NotInitialized,

    /// Lookup or open found nothing matching
    #[error("No device found")]
    NoDeviceFound,

    /// Session is already open
    #[error("Device not ready: session already open")]
    NotReady,

    /// Packet-mode receive filled the requested length without seeing the
    /// last-packet flag
    #[error("Receive overflow: {received} elements without end of frame")]
    Overflow { received: usize },

    /// Control or bulk transfer failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Caller buffer cannot hold the requested number of elements
    #[error("Invalid buffer: needed {needed} bytes, got {available}")]
    InvalidBuffer { needed: usize, available: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Numeric error code as used by the C interface of the bridge driver
    ///
    /// Errors without a counterpart there map to the closest kind.
    pub fn code(&self) -> i32 {
        match self {
            Error::LowLevel(_) => -1,
            Error::NotInitialized => -2,
            Error::NoDeviceFound => -3,
            Error::NotReady => -4,
            Error::Overflow { .. } => -5,
            Error::Io(_) | Error::InvalidBuffer { .. } => -6,
            Error::Config(_) => -1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::LowLevel("ctx".into()).code(), -1);
        assert_eq!(Error::NotInitialized.code(), -2);
        assert_eq!(Error::NoDeviceFound.code(), -3);
        assert_eq!(Error::NotReady.code(), -4);
        assert_eq!(Error::Overflow { received: 3 }.code(), -5);
        assert_eq!(Error::Io("stall".into()).code(), -6);
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidBuffer {
            needed: 600,
            available: 512,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("needed 600"));
        assert!(msg.contains("got 512"));

        let err = Error::Overflow { received: 256 };
        assert!(format!("{}", err).contains("256 elements"));
    }
}
