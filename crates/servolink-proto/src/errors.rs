//! Protocol error types.

use thiserror::Error;

/// Result alias for framing operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Structural framing errors.
///
/// These never indicate a transport failure, only bytes that cannot be a
/// valid request frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer shorter than a header
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum required length
        expected: usize,
        /// Actual buffer length
        actual: usize,
    },

    /// Magic number mismatch
    #[error("invalid magic number")]
    InvalidMagic,

    /// Protocol version we do not speak
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Message kind not recognized
    #[error("unknown message kind: {0:#06x}")]
    UnknownKind(u16),

    /// Payload exceeds the protocol limit
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Claimed or actual payload size
        size: usize,
        /// Protocol maximum
        max: usize,
    },

    /// Header claims more payload than the buffer holds
    #[error("frame truncated: expected {expected} payload bytes, got {actual}")]
    FrameTruncated {
        /// Payload size claimed by header
        expected: usize,
        /// Payload bytes available
        actual: usize,
    },
}
