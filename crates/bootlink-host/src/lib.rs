//! Host-side bootlink tooling.
//!
//! [`Client`] speaks the bootloader RPC service over any `Read + Write`
//! port, and [`upload`] drives the staged page-by-page flashing flow on
//! top of it. The `bootlink` binary wraps both in a CLI.

pub mod client;
pub mod upload;

pub use client::{Client, ClientError};
pub use upload::{upload, UploadReport};
