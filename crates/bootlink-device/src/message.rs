//! One in-flight RPC message.

use bootlink_protocol::Header;

/// The message record threaded through one poll cycle.
///
/// The payload bytes stay in the framer's buffer; this record carries the
/// decoded header and the one length value the cycle reuses: bytes
/// received before dispatch, bytes to send after. The two are never needed
/// at the same time because the request and its reply share the buffer.
#[derive(Debug, Clone, Copy)]
pub struct Message {
    /// Decoded request header; rewritten in place while building the reply.
    pub header: Header,
    /// Received length before dispatch, send length after.
    pub len: usize,
}

impl Message {
    /// Start a cycle from a decoded header and received payload length.
    pub fn new(header: Header, read_len: usize) -> Self {
        Message { header, len: read_len }
    }
}
