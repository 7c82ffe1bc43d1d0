//! Protocol error types.

use thiserror::Error;

/// Errors that can occur at the wire-protocol layer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload does not fit in a frame.
    #[error("payload too long: maximum {max} bytes, got {actual}")]
    PayloadTooLong {
        /// Maximum encodable payload length.
        max: usize,
        /// Requested payload length.
        actual: usize,
    },

    /// Header carries a codec version this implementation does not speak.
    ///
    /// When this is returned no other header field may be trusted.
    #[error("unsupported codec version: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version this codec implements.
        expected: u8,
        /// Version found in the header.
        actual: u8,
    },
}
