//! Protocol constants
//!
//! These constants define the link-layer frame format, the packed message
//! header layout, and the service/method/protocol identifiers shared by the
//! device server and the host client.

// ============================================================================
// Link layer (frame format)
// ============================================================================

/// First sync byte of every frame.
pub const SYNC1: u8 = 0x5A;
/// Second sync byte of every frame.
pub const SYNC2: u8 = 0x7E;

/// Maximum frame payload length, in bytes.
pub const MAX_PAYLOAD_LEN: usize = 128;
/// Frame overhead: 2 sync bytes + 1 length byte + 2 CRC bytes.
pub const FRAME_OVERHEAD: usize = 5;
/// Maximum total encoded frame length.
pub const MAX_FRAME_LEN: usize = MAX_PAYLOAD_LEN + FRAME_OVERHEAD;
/// Offset of the payload region inside a frame (after sync bytes + length).
pub const FRAME_DATA_START: usize = 3;

// ============================================================================
// Message header
// ============================================================================

/// Codec version carried in the low 2 bits of every header.
pub const CODEC_VERSION: u8 = 0;

/// On-wire length of the packed message header.
pub const HEADER_LEN: usize = 3;
/// The header is written into a 4-byte slot: writing it is the first step of
/// building a response, so the extra byte may be clobbered safely.
pub const HEADER_SLOT_LEN: usize = 4;

/// Message type: single request or reply, normal semantics.
pub const MSG_TYPE_SINGLE_NORMAL: u8 = 0;
/// Message type: single control message (historical ACK/NAK layer, unused).
pub const MSG_TYPE_SINGLE_CONTROL: u8 = 1;

// ============================================================================
// Reply protocol codes
// ============================================================================

/// Request was dispatched and handled.
pub const PROT_OK: u8 = 0;
/// No service registered under the requested service id.
pub const PROT_NO_SERVICE: u8 = 1;
/// Service exists but has no such method.
pub const PROT_NO_METHOD: u8 = 2;
/// Message arguments did not match the method's declared layout.
pub const PROT_BAD_SYNTAX: u8 = 3;
/// Service or method temporarily unavailable.
pub const PROT_UNAVAILABLE: u8 = 4;

// ============================================================================
// Services and methods
// ============================================================================

/// Service id of the bootloader service.
pub const SERVICE_BOOTLOADER: u8 = 1;

/// Liveness check. No arguments, header-only reply.
pub const METHOD_PING: u8 = 1;
/// Copy a chunk of data into the staging page buffer.
pub const METHOD_WRITE_PAGE_BUFFER: u8 = 2;
/// Reset the staging page buffer to the erased (0xFF) state.
pub const METHOD_ERASE_PAGE_BUFFER: u8 = 3;
/// Erase an application partition.
pub const METHOD_ERASE_APP: u8 = 4;
/// Commit the staging buffer to a flash page, gated on a CRC-32 match.
pub const METHOD_WRITE_PAGE: u8 = 5;
/// Select the partition to execute on hand-off.
pub const METHOD_SET_BOOT_ACTION: u8 = 6;
/// Arm the boot hand-off.
pub const METHOD_BOOT: u8 = 7;
