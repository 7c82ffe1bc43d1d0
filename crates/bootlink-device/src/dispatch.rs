//! Service and method dispatch.
//!
//! Dispatch is a two-level static lookup: the service id selects a service
//! handler, and the method id selects a shim inside it. Each shim reads its
//! arguments from fixed offsets in the message buffer, calls the command,
//! and builds the reply in the same buffer: packed header first, then for
//! most methods the command's signed status byte.
//!
//! Argument layouts are positional, packed for natural alignment with one
//! explicit pad slot after the 3-byte header. Shims validate the received
//! length against their layout before reading any offset; the scalar
//! accessors themselves do no bounds checking.

use bootlink_protocol::{codec, AppId, BootAction, Status};
use bootlink_protocol::constants::*;
use thiserror::Error;

use crate::bootloader::Bootloader;
use crate::message::Message;
use crate::storage::Storage;

/// Offset of the reply status byte, directly after the header.
const REPLY_STATUS_OFFSET: usize = 3;

// writePageBuffer arguments: the data length rides in the pad slot so the
// u16 offset lands aligned and the data bytes follow it.
const WPB_LEN_OFFSET: usize = 3;
const WPB_OFFSET_OFFSET: usize = 4;
const WPB_DATA_OFFSET: usize = 6;

// eraseApp / setBootAction: a single u8 in the pad slot.
const APP_ID_OFFSET: usize = 3;
const BOOT_ACTION_OFFSET: usize = 3;

// writePage arguments: u8 app id in the pad slot, then aligned u32 CRC and
// u16 page number.
const WP_APP_ID_OFFSET: usize = 3;
const WP_CRC_OFFSET: usize = 4;
const WP_PAGE_OFFSET: usize = 8;
const WP_ARGS_LEN: usize = 10;

/// Dispatch failures surfaced to the peer through the reply protocol code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// No service is registered under this id.
    #[error("no service with id {0}")]
    NoService(u8),

    /// The service has no method under this id.
    #[error("no method with id {0}")]
    NoMethod(u8),

    /// The message is shorter than the method's argument layout.
    #[error("message too short for arguments: need {need} bytes, got {got}")]
    BadSyntax {
        /// Bytes the layout requires.
        need: usize,
        /// Bytes actually received.
        got: usize,
    },
}

impl DispatchError {
    /// The reply protocol code for this failure.
    pub fn protocol_code(&self) -> u8 {
        match self {
            DispatchError::NoService(_) => PROT_NO_SERVICE,
            DispatchError::NoMethod(_) => PROT_NO_METHOD,
            DispatchError::BadSyntax { .. } => PROT_BAD_SYNTAX,
        }
    }
}

/// Registered services, closed over the wire id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Service {
    Bootloader,
}

impl Service {
    fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            SERVICE_BOOTLOADER => Some(Service::Bootloader),
            _ => None,
        }
    }
}

/// Methods of the bootloader service, closed over the wire id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BootloaderMethod {
    Ping,
    WritePageBuffer,
    ErasePageBuffer,
    EraseApp,
    WritePage,
    SetBootAction,
    Boot,
}

impl BootloaderMethod {
    fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            METHOD_PING => Some(BootloaderMethod::Ping),
            METHOD_WRITE_PAGE_BUFFER => Some(BootloaderMethod::WritePageBuffer),
            METHOD_ERASE_PAGE_BUFFER => Some(BootloaderMethod::ErasePageBuffer),
            METHOD_ERASE_APP => Some(BootloaderMethod::EraseApp),
            METHOD_WRITE_PAGE => Some(BootloaderMethod::WritePage),
            METHOD_SET_BOOT_ACTION => Some(BootloaderMethod::SetBootAction),
            METHOD_BOOT => Some(BootloaderMethod::Boot),
            _ => None,
        }
    }
}

/// Route a decoded message to its shim.
///
/// On success the shim has written the complete reply into `buf` and set
/// the message's send length. On failure nothing has been written; the
/// server builds the minimal error reply from the returned code.
pub fn dispatch<S: Storage>(
    message: &mut Message,
    buf: &mut [u8],
    bootloader: &mut Bootloader<S>,
) -> Result<(), DispatchError> {
    match Service::from_wire(message.header.service) {
        Some(Service::Bootloader) => bootloader_service(message, buf, bootloader),
        None => Err(DispatchError::NoService(message.header.service)),
    }
}

fn bootloader_service<S: Storage>(
    message: &mut Message,
    buf: &mut [u8],
    bootloader: &mut Bootloader<S>,
) -> Result<(), DispatchError> {
    match BootloaderMethod::from_wire(message.header.method) {
        Some(BootloaderMethod::Ping) => ping_shim(message, buf, bootloader),
        Some(BootloaderMethod::WritePageBuffer) => write_page_buffer_shim(message, buf, bootloader),
        Some(BootloaderMethod::ErasePageBuffer) => erase_page_buffer_shim(message, buf, bootloader),
        Some(BootloaderMethod::EraseApp) => erase_app_shim(message, buf, bootloader),
        Some(BootloaderMethod::WritePage) => write_page_shim(message, buf, bootloader),
        Some(BootloaderMethod::SetBootAction) => set_boot_action_shim(message, buf, bootloader),
        Some(BootloaderMethod::Boot) => boot_shim(message, buf, bootloader),
        None => Err(DispatchError::NoMethod(message.header.method)),
    }
}

/// Check the received length against a method's argument layout.
fn require_len(message: &Message, need: usize) -> Result<(), DispatchError> {
    if message.len < need {
        return Err(DispatchError::BadSyntax {
            need,
            got: message.len,
        });
    }
    Ok(())
}

/// Build a reply in place: header, then the status byte unless the method
/// replies header-only.
fn respond(message: &mut Message, buf: &mut [u8], status: Option<Status>) {
    message.header.msg_type = MSG_TYPE_SINGLE_NORMAL;
    message.header.protocol = PROT_OK;
    codec::write_header(buf, &message.header);

    match status {
        Some(status) => {
            codec::write_i8(buf, status.to_wire(), REPLY_STATUS_OFFSET);
            message.len = HEADER_LEN + 1;
        }
        None => message.len = HEADER_LEN,
    }
}

fn ping_shim<S: Storage>(
    message: &mut Message,
    buf: &mut [u8],
    bootloader: &mut Bootloader<S>,
) -> Result<(), DispatchError> {
    bootloader.ping();
    respond(message, buf, None);
    Ok(())
}

fn write_page_buffer_shim<S: Storage>(
    message: &mut Message,
    buf: &mut [u8],
    bootloader: &mut Bootloader<S>,
) -> Result<(), DispatchError> {
    require_len(message, WPB_DATA_OFFSET)?;
    let data_len = usize::from(codec::read_u8(buf, WPB_LEN_OFFSET));
    require_len(message, WPB_DATA_OFFSET + data_len)?;

    let offset = codec::read_u16(buf, WPB_OFFSET_OFFSET);
    let status =
        bootloader.write_page_buffer(offset, &buf[WPB_DATA_OFFSET..WPB_DATA_OFFSET + data_len]);

    respond(message, buf, Some(status));
    Ok(())
}

fn erase_page_buffer_shim<S: Storage>(
    message: &mut Message,
    buf: &mut [u8],
    bootloader: &mut Bootloader<S>,
) -> Result<(), DispatchError> {
    bootloader.erase_page_buffer();
    respond(message, buf, None);
    Ok(())
}

fn erase_app_shim<S: Storage>(
    message: &mut Message,
    buf: &mut [u8],
    bootloader: &mut Bootloader<S>,
) -> Result<(), DispatchError> {
    require_len(message, APP_ID_OFFSET + 1)?;

    let status = match AppId::from_wire(codec::read_u8(buf, APP_ID_OFFSET)) {
        Some(id) => bootloader.erase_app(id),
        None => Status::NoPartition,
    };

    respond(message, buf, Some(status));
    Ok(())
}

fn write_page_shim<S: Storage>(
    message: &mut Message,
    buf: &mut [u8],
    bootloader: &mut Bootloader<S>,
) -> Result<(), DispatchError> {
    require_len(message, WP_ARGS_LEN)?;

    let crc = codec::read_u32(buf, WP_CRC_OFFSET);
    let page_no = codec::read_u16(buf, WP_PAGE_OFFSET);
    let status = match AppId::from_wire(codec::read_u8(buf, WP_APP_ID_OFFSET)) {
        Some(id) => bootloader.write_page(id, page_no, crc),
        None => Status::NoPartition,
    };

    respond(message, buf, Some(status));
    Ok(())
}

fn set_boot_action_shim<S: Storage>(
    message: &mut Message,
    buf: &mut [u8],
    bootloader: &mut Bootloader<S>,
) -> Result<(), DispatchError> {
    require_len(message, BOOT_ACTION_OFFSET + 1)?;

    let status = match BootAction::from_wire(codec::read_u8(buf, BOOT_ACTION_OFFSET)) {
        Some(action) => bootloader.set_boot_action(action),
        None => Status::Failed,
    };

    respond(message, buf, Some(status));
    Ok(())
}

fn boot_shim<S: Storage>(
    message: &mut Message,
    buf: &mut [u8],
    bootloader: &mut Bootloader<S>,
) -> Result<(), DispatchError> {
    let status = bootloader.boot();
    respond(message, buf, Some(status));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimStorage;
    use bootlink_protocol::{Header, MAX_PAYLOAD_LEN};

    fn request(service: u8, method: u8, args: &[u8]) -> (Message, Vec<u8>) {
        let header = Header {
            service,
            method,
            sequence: 7,
            msg_type: MSG_TYPE_SINGLE_NORMAL,
            protocol: PROT_OK,
        };
        let mut buf = vec![0u8; MAX_PAYLOAD_LEN];
        codec::write_header(&mut buf, &header);
        buf[HEADER_LEN..HEADER_LEN + args.len()].copy_from_slice(args);
        (Message::new(header, HEADER_LEN + args.len()), buf)
    }

    #[test]
    fn test_unknown_service() {
        let (mut msg, mut buf) = request(9, METHOD_PING, &[]);
        let mut bl = Bootloader::new(SimStorage::new());

        let err = dispatch(&mut msg, &mut buf, &mut bl).unwrap_err();
        assert_eq!(err, DispatchError::NoService(9));
        assert_eq!(err.protocol_code(), PROT_NO_SERVICE);
    }

    #[test]
    fn test_unknown_method() {
        let (mut msg, mut buf) = request(SERVICE_BOOTLOADER, 0x3F, &[]);
        let mut bl = Bootloader::new(SimStorage::new());

        let err = dispatch(&mut msg, &mut buf, &mut bl).unwrap_err();
        assert_eq!(err, DispatchError::NoMethod(0x3F));
        assert_eq!(err.protocol_code(), PROT_NO_METHOD);
    }

    #[test]
    fn test_ping_replies_header_only() {
        let (mut msg, mut buf) = request(SERVICE_BOOTLOADER, METHOD_PING, &[]);
        let mut bl = Bootloader::new(SimStorage::new());

        dispatch(&mut msg, &mut buf, &mut bl).unwrap();
        assert_eq!(msg.len, HEADER_LEN);

        let reply = codec::read_header(&buf).unwrap();
        assert_eq!(reply.protocol, PROT_OK);
        assert_eq!(reply.sequence, 7);
        assert_eq!(reply.method, METHOD_PING);
    }

    #[test]
    fn test_write_page_buffer_arguments_and_reply() {
        // data_len 3 at offset 3, offset 0x0010 at 4..6, data at 6.
        let args = [3, 0x10, 0x00, 0xAA, 0xBB, 0xCC];
        let (mut msg, mut buf) = request(SERVICE_BOOTLOADER, METHOD_WRITE_PAGE_BUFFER, &args);
        let mut bl = Bootloader::new(SimStorage::new());

        dispatch(&mut msg, &mut buf, &mut bl).unwrap();
        assert_eq!(msg.len, HEADER_LEN + 1);
        assert_eq!(codec::read_i8(&buf, REPLY_STATUS_OFFSET), 0);
        assert_eq!(&bl.page_buffer()[0x10..0x13], &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_write_page_buffer_out_of_bounds_status() {
        let mut args = vec![10, 250, 0x00];
        args.extend_from_slice(&[0u8; 10]);
        let (mut msg, mut buf) = request(SERVICE_BOOTLOADER, METHOD_WRITE_PAGE_BUFFER, &args);
        let mut bl = Bootloader::new(SimStorage::new());

        dispatch(&mut msg, &mut buf, &mut bl).unwrap();
        assert_eq!(
            Status::from_wire(codec::read_i8(&buf, REPLY_STATUS_OFFSET)),
            Status::OutOfBounds
        );
    }

    #[test]
    fn test_truncated_arguments_are_bad_syntax() {
        // writePage needs 10 bytes; send only the app id.
        let (mut msg, mut buf) = request(SERVICE_BOOTLOADER, METHOD_WRITE_PAGE, &[0]);
        let mut bl = Bootloader::new(SimStorage::new());

        let err = dispatch(&mut msg, &mut buf, &mut bl).unwrap_err();
        assert_eq!(err, DispatchError::BadSyntax { need: 10, got: 4 });
        assert_eq!(err.protocol_code(), PROT_BAD_SYNTAX);
    }

    #[test]
    fn test_write_page_buffer_declared_len_beyond_message() {
        // Declared data length of 20 but only 2 data bytes on the wire.
        let args = [20, 0x00, 0x00, 0x01, 0x02];
        let (mut msg, mut buf) = request(SERVICE_BOOTLOADER, METHOD_WRITE_PAGE_BUFFER, &args);
        let mut bl = Bootloader::new(SimStorage::new());

        let err = dispatch(&mut msg, &mut buf, &mut bl).unwrap_err();
        assert!(matches!(err, DispatchError::BadSyntax { .. }));
    }

    #[test]
    fn test_unrecognized_app_id_fails_cleanly() {
        let (mut msg, mut buf) = request(SERVICE_BOOTLOADER, METHOD_ERASE_APP, &[7]);
        let mut bl = Bootloader::new(SimStorage::new());

        dispatch(&mut msg, &mut buf, &mut bl).unwrap();
        assert_eq!(
            Status::from_wire(codec::read_i8(&buf, REPLY_STATUS_OFFSET)),
            Status::NoPartition
        );
        assert!(bl.storage().erased().is_empty());
    }

    #[test]
    fn test_unrecognized_boot_action_fails_cleanly() {
        let (mut msg, mut buf) = request(SERVICE_BOOTLOADER, METHOD_SET_BOOT_ACTION, &[9]);
        let mut bl = Bootloader::new(SimStorage::new());

        dispatch(&mut msg, &mut buf, &mut bl).unwrap();
        assert_eq!(
            Status::from_wire(codec::read_i8(&buf, REPLY_STATUS_OFFSET)),
            Status::Failed
        );
        assert_eq!(bl.boot_entry(), None);
    }
}
