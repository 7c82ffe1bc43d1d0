//! Non-blocking serial server loop.
//!
//! `Server::poll` pulls at most one byte from the transport per call and
//! feeds it to the framer. Everything else happens only on the poll that
//! completes a frame: header validation, dispatch, and the reply write.
//! Frames that fail the checksum or carry a foreign codec version are
//! dropped without a reply, matching the link's self-recovery model.

use bootlink_protocol::{codec, DecodeStatus, Framer, ProtocolError};
use bootlink_protocol::constants::*;
use log::debug;
use thiserror::Error;

use crate::bootloader::Bootloader;
use crate::dispatch;
use crate::message::Message;
use crate::storage::Storage;
use crate::transport::{Transport, TransportError};

/// Outcome of a single poll step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// No byte was available.
    Idle,
    /// A byte was consumed but no frame completed.
    Pending,
    /// A frame completed but was discarded without a reply.
    Dropped,
    /// A frame was dispatched and its reply written.
    Replied,
}

/// Failures a poll step can surface to the caller.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Request/reply server over a byte transport.
///
/// The framer's buffer serves both directions: the decoded payload is
/// dispatched in place and the reply overwrites it.
pub struct Server<T: Transport> {
    transport: T,
    framer: Framer,
}

impl<T: Transport> Server<T> {
    pub fn new(transport: T) -> Self {
        Server {
            transport,
            framer: Framer::new(),
        }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Advance the receive state machine by at most one byte.
    pub fn poll<S: Storage>(
        &mut self,
        bootloader: &mut Bootloader<S>,
    ) -> Result<PollStatus, ServerError> {
        let byte = match self.transport.read_byte()? {
            Some(byte) => byte,
            None => return Ok(PollStatus::Idle),
        };

        match self.framer.decode(byte) {
            DecodeStatus::Incomplete => Ok(PollStatus::Pending),
            DecodeStatus::ChecksumError => Ok(PollStatus::Dropped),
            DecodeStatus::FrameReady => self.handle_frame(bootloader),
        }
    }

    fn handle_frame<S: Storage>(
        &mut self,
        bootloader: &mut Bootloader<S>,
    ) -> Result<PollStatus, ServerError> {
        let len = self.framer.decoded_len();
        if len < HEADER_LEN {
            debug!("dropping runt frame of {} bytes", len);
            return Ok(PollStatus::Dropped);
        }

        let header = match codec::read_header(self.framer.payload()) {
            Ok(header) => header,
            Err(err) => {
                debug!("dropping frame: {}", err);
                return Ok(PollStatus::Dropped);
            }
        };

        let mut message = Message::new(header, len);
        if let Err(err) = dispatch::dispatch(&mut message, self.framer.payload_mut(), bootloader) {
            debug!("dispatch failed: {}", err);
            message.header.msg_type = MSG_TYPE_SINGLE_NORMAL;
            message.header.protocol = err.protocol_code();
            codec::write_header(self.framer.payload_mut(), &message.header);
            message.len = HEADER_LEN;
        }

        let total = self.framer.encode(message.len)?;
        self.transport.write(self.framer.frame(total))?;
        Ok(PollStatus::Replied)
    }
}
