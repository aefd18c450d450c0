//! Protocol error types

use thiserror::Error;

/// Wire-format errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Buffer too small for the structure being decoded
    #[error("Buffer too small: needed {needed}, got {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Register address outside the register map
    #[error("Invalid register address: {0}")]
    InvalidRegister(u16),

    /// Width code outside the 2-bit range
    #[error("Invalid width code: {0}")]
    InvalidWidthCode(u8),

    /// FIFO depth exponent outside the 5-bit range
    #[error("Invalid FIFO depth exponent: {0} (max: 31)")]
    InvalidFifoDepth(u8),
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
