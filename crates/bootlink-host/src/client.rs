//! RPC client over a serial byte stream.
//!
//! The client mirrors the device server: one framer serves both
//! directions, each request gets exactly one reply frame, and sequence
//! numbers pair the two. Any port implementing `Read + Write` works; the
//! real CLI hands in a serial port, the tests a loopback device.

use std::io::{self, Read, Write};

use bootlink_protocol::constants::*;
use bootlink_protocol::{codec, AppId, BootAction, DecodeStatus, Framer, Header, ProtocolError, Status};
use log::{debug, trace};
use thiserror::Error;

/// Offset of the status byte in command replies.
const REPLY_STATUS_OFFSET: usize = 3;

/// Sequence numbers wrap in the header's 5-bit field.
const SEQUENCE_MASK: u8 = 0x1F;

/// Largest data chunk one writePageBuffer request can carry: the encodable
/// payload caps at `MAX_PAYLOAD_LEN - 1`, minus the header and the 3
/// argument bytes ahead of the data.
pub const MAX_CHUNK_LEN: usize = MAX_PAYLOAD_LEN - 1 - HEADER_LEN - 3;

/// Client-side failures.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A writePageBuffer data chunk does not fit in one frame.
    #[error("data chunk too long: maximum {max} bytes, got {actual}")]
    ChunkTooLong { max: usize, actual: usize },

    /// The configured flash page size cannot be staged over the wire.
    #[error("invalid page size: {0}")]
    InvalidPageSize(usize),

    /// The reply frame arrived but failed its checksum.
    #[error("reply frame failed its checksum")]
    CorruptReply,

    /// The reply pairs with a different request than the one sent.
    #[error("sequence mismatch: sent {sent}, reply carries {got}")]
    SequenceMismatch { sent: u8, got: u8 },

    /// The device could not dispatch the request.
    #[error("device rejected request: {0}")]
    Rejected(&'static str),

    /// The reply is shorter than the method's result layout.
    #[error("reply too short: {0} bytes")]
    ShortReply(usize),

    /// The request was dispatched but the command reported failure.
    #[error("command failed on device: {0}")]
    Command(Status),
}

fn rejection_name(code: u8) -> &'static str {
    match code {
        PROT_NO_SERVICE => "no such service",
        PROT_NO_METHOD => "no such method",
        PROT_BAD_SYNTAX => "bad argument syntax",
        PROT_UNAVAILABLE => "service unavailable",
        _ => "unknown protocol code",
    }
}

/// Bootloader service client.
pub struct Client<P: Read + Write> {
    port: P,
    framer: Framer,
    sequence: u8,
}

impl<P: Read + Write> Client<P> {
    pub fn new(port: P) -> Self {
        Client {
            port,
            framer: Framer::new(),
            sequence: 0,
        }
    }

    /// The underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Liveness check.
    pub fn ping(&mut self) -> Result<(), ClientError> {
        self.call(METHOD_PING, &[])?;
        Ok(())
    }

    /// Copy a chunk into the device's staging page buffer at `offset`.
    ///
    /// The chunk must fit one frame alongside the arguments; longer data
    /// is rejected here, before anything touches the port.
    pub fn write_page_buffer(&mut self, offset: u16, data: &[u8]) -> Result<(), ClientError> {
        if data.len() > MAX_CHUNK_LEN {
            return Err(ClientError::ChunkTooLong {
                max: MAX_CHUNK_LEN,
                actual: data.len(),
            });
        }

        let mut args = Vec::with_capacity(3 + data.len());
        args.push(data.len() as u8);
        args.extend_from_slice(&offset.to_le_bytes());
        args.extend_from_slice(data);
        self.command(METHOD_WRITE_PAGE_BUFFER, &args)
    }

    /// Reset the device's staging page buffer to the erased state.
    pub fn erase_page_buffer(&mut self) -> Result<(), ClientError> {
        self.call(METHOD_ERASE_PAGE_BUFFER, &[])?;
        Ok(())
    }

    /// Erase an application partition.
    pub fn erase_app(&mut self, app: AppId) -> Result<(), ClientError> {
        self.command(METHOD_ERASE_APP, &[app.to_wire()])
    }

    /// Commit the staging buffer to flash page `page_no`, gated on `crc`
    /// matching the device's view of the buffer.
    pub fn write_page(&mut self, app: AppId, page_no: u16, crc: u32) -> Result<(), ClientError> {
        let mut args = vec![app.to_wire()];
        args.extend_from_slice(&crc.to_le_bytes());
        args.extend_from_slice(&page_no.to_le_bytes());
        self.command(METHOD_WRITE_PAGE, &args)
    }

    /// Select the partition the device should execute on hand-off.
    pub fn set_boot_action(&mut self, action: BootAction) -> Result<(), ClientError> {
        self.command(METHOD_SET_BOOT_ACTION, &[action.to_wire()])
    }

    /// Arm the device's boot hand-off.
    pub fn boot(&mut self) -> Result<(), ClientError> {
        self.command(METHOD_BOOT, &[])
    }

    /// Issue a method that replies with a status byte.
    fn command(&mut self, method: u8, args: &[u8]) -> Result<(), ClientError> {
        let reply = self.call(method, args)?;
        if reply.len() < HEADER_LEN + 1 {
            return Err(ClientError::ShortReply(reply.len()));
        }

        let status = Status::from_wire(codec::read_i8(&reply, REPLY_STATUS_OFFSET));
        if !status.is_ok() {
            return Err(ClientError::Command(status));
        }
        Ok(())
    }

    /// One request/reply exchange, returning the reply payload.
    fn call(&mut self, method: u8, args: &[u8]) -> Result<Vec<u8>, ClientError> {
        let payload_len = HEADER_LEN + args.len();
        if payload_len >= MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLong {
                max: MAX_PAYLOAD_LEN - 1,
                actual: payload_len,
            }
            .into());
        }

        self.sequence = (self.sequence + 1) & SEQUENCE_MASK;
        let header = Header {
            service: SERVICE_BOOTLOADER,
            method,
            sequence: self.sequence,
            msg_type: MSG_TYPE_SINGLE_NORMAL,
            protocol: PROT_OK,
        };

        let payload = self.framer.payload_mut();
        codec::write_header(payload, &header);
        payload[HEADER_LEN..HEADER_LEN + args.len()].copy_from_slice(args);

        let total = self.framer.encode(HEADER_LEN + args.len())?;
        trace!("sending method {method} ({total} frame bytes)");
        self.port.write_all(self.framer.frame(total))?;
        self.port.flush()?;

        let reply = self.read_reply()?;
        if reply.sequence != self.sequence {
            return Err(ClientError::SequenceMismatch {
                sent: self.sequence,
                got: reply.sequence,
            });
        }
        if reply.protocol != PROT_OK {
            debug!("method {method} rejected with protocol code {}", reply.protocol);
            return Err(ClientError::Rejected(rejection_name(reply.protocol)));
        }

        Ok(self.framer.payload().to_vec())
    }

    /// Read bytes until one complete frame decodes.
    ///
    /// Blocks on the port; a slow or dead device surfaces as the port's
    /// own timeout error.
    fn read_reply(&mut self) -> Result<Header, ClientError> {
        let mut chunk = [0u8; 64];
        loop {
            let n = self.port.read(&mut chunk)?;
            if n == 0 {
                return Err(ClientError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "port closed while waiting for reply",
                )));
            }

            for &byte in &chunk[..n] {
                match self.framer.decode(byte) {
                    DecodeStatus::Incomplete => {}
                    DecodeStatus::ChecksumError => return Err(ClientError::CorruptReply),
                    DecodeStatus::FrameReady => {
                        if self.framer.decoded_len() < HEADER_LEN {
                            return Err(ClientError::ShortReply(self.framer.decoded_len()));
                        }
                        return Ok(codec::read_header(self.framer.payload())?);
                    }
                }
            }
        }
    }
}
