//! Byte transport collaborator boundary.

use thiserror::Error;

/// Errors surfaced by a transport implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The underlying read failed.
    #[error("transport read failed: {0}")]
    Read(String),

    /// The underlying write failed.
    #[error("transport write failed: {0}")]
    Write(String),
}

/// A serial byte link as seen by the server loop.
///
/// Reads are non-blocking: the poll loop consumes at most one byte per
/// cycle and never waits for input. Writes are allowed to block until the
/// hardware has accepted the whole buffer; there is no software timeout at
/// this layer.
pub trait Transport {
    /// Read one byte if one is available.
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError>;

    /// Write the complete buffer to the link.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}
