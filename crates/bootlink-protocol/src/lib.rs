//! Bootlink wire protocol
//!
//! This crate implements the wire-level protocol shared by the bootlink
//! device server and host client:
//!
//! - **Framer**: byte-at-a-time link-layer frame decoder and in-place
//!   encoder with a self-checking CRC-16 trailer
//! - **Codec**: the packed 24-bit message header and little-endian scalar
//!   accessors used to marshal method arguments and results
//! - **Constants**: frame format values, protocol reply codes, and the
//!   service/method id tables
//!
//! The framer owns the single frame buffer, and the request/response cycle
//! reuses it in place: a reply is built directly over the decoded request
//! payload and re-encoded without copying.

pub mod codec;
pub mod constants;
mod error;
pub mod framer;
pub mod types;

pub use codec::{read_header, write_header, Header};
pub use constants::*;
pub use error::ProtocolError;
pub use framer::{DecodeStatus, Framer};
pub use types::{AppId, BootAction, Status};
