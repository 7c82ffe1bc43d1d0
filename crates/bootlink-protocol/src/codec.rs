//! Message header codec and scalar accessors.
//!
//! The message header is a 24-bit word packed little-endian at the start of
//! every payload:
//!
//! ```text
//! 23    20 19  18 17    13 12      7 6       2 1     0
//! [ PROT ] [ T ] [ SEQ  ] [ METHOD ] [ SERV  ] [ VER ]
//!     4      2      5          6         5        2
//! ```
//!
//! `write_header` fills a 4-byte slot: writing the header is the first step
//! of building a response, so the byte after the on-wire header may be
//! overwritten freely. `read_header` only consumes the 3 on-wire bytes.
//!
//! The scalar accessors read and write fixed-width little-endian values at
//! caller-supplied offsets. They do no bounds checking of their own beyond
//! slice indexing; the dispatch shims validate message lengths before
//! touching any offset.

use crate::constants::{CODEC_VERSION, HEADER_SLOT_LEN};
use crate::error::ProtocolError;

// Field widths and positions in the packed header word.
const VERSION_MASK: u32 = 0x3;
const SERVICE_MASK: u32 = 0x1F;
const SERVICE_SHIFT: u32 = 2;
const METHOD_MASK: u32 = 0x3F;
const METHOD_SHIFT: u32 = 7;
const SEQUENCE_MASK: u32 = 0x1F;
const SEQUENCE_SHIFT: u32 = 13;
const TYPE_MASK: u32 = 0x3;
const TYPE_SHIFT: u32 = 18;
const PROTOCOL_MASK: u32 = 0xF;
const PROTOCOL_SHIFT: u32 = 20;

/// Decoded message header fields.
///
/// Fields hold raw wire values; the dispatch layer maps service and method
/// ids onto closed enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// Service id (5 bits).
    pub service: u8,
    /// Method id within the service (6 bits).
    pub method: u8,
    /// Request sequence number (5 bits), echoed in the reply.
    pub sequence: u8,
    /// Message type (2 bits); only single-normal is implemented.
    pub msg_type: u8,
    /// Protocol code (4 bits): OK on requests, a reply code on responses.
    pub protocol: u8,
}

/// Pack `header` into the 4-byte slot at the start of `buf`.
///
/// The version field is always the codec's own version; callers cannot
/// emit a header this codec would reject.
pub fn write_header(buf: &mut [u8], header: &Header) {
    let word = (u32::from(CODEC_VERSION) & VERSION_MASK)
        | ((u32::from(header.service) & SERVICE_MASK) << SERVICE_SHIFT)
        | ((u32::from(header.method) & METHOD_MASK) << METHOD_SHIFT)
        | ((u32::from(header.sequence) & SEQUENCE_MASK) << SEQUENCE_SHIFT)
        | ((u32::from(header.msg_type) & TYPE_MASK) << TYPE_SHIFT)
        | ((u32::from(header.protocol) & PROTOCOL_MASK) << PROTOCOL_SHIFT);

    buf[..HEADER_SLOT_LEN].copy_from_slice(&word.to_le_bytes());
}

/// Unpack the header at the start of `buf`.
///
/// Fails when the version field does not match this codec's version; none
/// of the other fields are meaningful in that case.
pub fn read_header(buf: &[u8]) -> Result<Header, ProtocolError> {
    // Assemble from the 3 on-wire bytes only; the fourth slot byte is
    // scratch space.
    let word = u32::from(buf[0]) | (u32::from(buf[1]) << 8) | (u32::from(buf[2]) << 16);

    let version = (word & VERSION_MASK) as u8;
    if version != CODEC_VERSION {
        return Err(ProtocolError::VersionMismatch {
            expected: CODEC_VERSION,
            actual: version,
        });
    }

    Ok(Header {
        service: ((word >> SERVICE_SHIFT) & SERVICE_MASK) as u8,
        method: ((word >> METHOD_SHIFT) & METHOD_MASK) as u8,
        sequence: ((word >> SEQUENCE_SHIFT) & SEQUENCE_MASK) as u8,
        msg_type: ((word >> TYPE_SHIFT) & TYPE_MASK) as u8,
        protocol: ((word >> PROTOCOL_SHIFT) & PROTOCOL_MASK) as u8,
    })
}

// ============================================================================
// Scalar accessors
// ============================================================================

/// Read a `u8` at `offset`.
pub fn read_u8(buf: &[u8], offset: usize) -> u8 {
    buf[offset]
}

/// Read a little-endian `u16` at `offset`.
pub fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// Read a little-endian `u32` at `offset`.
pub fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Read an `i8` at `offset`.
pub fn read_i8(buf: &[u8], offset: usize) -> i8 {
    buf[offset] as i8
}

/// Read a little-endian `i16` at `offset`.
pub fn read_i16(buf: &[u8], offset: usize) -> i16 {
    read_u16(buf, offset) as i16
}

/// Read a little-endian `i32` at `offset`.
pub fn read_i32(buf: &[u8], offset: usize) -> i32 {
    read_u32(buf, offset) as i32
}

/// Write a `u8` at `offset`.
pub fn write_u8(buf: &mut [u8], value: u8, offset: usize) {
    buf[offset] = value;
}

/// Write a little-endian `u16` at `offset`.
pub fn write_u16(buf: &mut [u8], value: u16, offset: usize) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

/// Write a little-endian `u32` at `offset`.
pub fn write_u32(buf: &mut [u8], value: u32, offset: usize) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Write an `i8` at `offset`.
pub fn write_i8(buf: &mut [u8], value: i8, offset: usize) {
    buf[offset] = value as u8;
}

/// Write a little-endian `i16` at `offset`.
pub fn write_i16(buf: &mut [u8], value: i16, offset: usize) {
    write_u16(buf, value as u16, offset);
}

/// Write a little-endian `i32` at `offset`.
pub fn write_i32(buf: &mut [u8], value: i32, offset: usize) {
    write_u32(buf, value as u32, offset);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    #[test]
    fn test_header_round_trip() {
        let header = Header {
            service: 0x1F,
            method: 0x3F,
            sequence: 0x1F,
            msg_type: 0x3,
            protocol: 0xF,
        };

        let mut buf = [0u8; 8];
        write_header(&mut buf, &header);
        let decoded = read_header(&buf).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_round_trip_all_field_positions() {
        // Walk a single set bit through each field to catch shift mistakes.
        let cases = [
            Header { service: 1, ..Default::default() },
            Header { service: 0x10, ..Default::default() },
            Header { method: 1, ..Default::default() },
            Header { method: 0x20, ..Default::default() },
            Header { sequence: 1, ..Default::default() },
            Header { sequence: 0x10, ..Default::default() },
            Header { msg_type: MSG_TYPE_SINGLE_CONTROL, ..Default::default() },
            Header { protocol: PROT_UNAVAILABLE, ..Default::default() },
            Header { protocol: 0x8, ..Default::default() },
        ];

        let mut buf = [0u8; 8];
        for header in cases {
            write_header(&mut buf, &header);
            assert_eq!(read_header(&buf).unwrap(), header, "{header:?}");
        }
    }

    #[test]
    fn test_header_wire_layout() {
        // Known packing against the bit layout: service 1, method 2,
        // sequence 3, type 0, protocol 4, version 0.
        let header = Header {
            service: 1,
            method: 2,
            sequence: 3,
            msg_type: 0,
            protocol: 4,
        };
        let mut buf = [0u8; 4];
        write_header(&mut buf, &header);

        let word = (1u32 << 2) | (2 << 7) | (3 << 13) | (4 << 20);
        assert_eq!(buf, word.to_le_bytes());
    }

    #[test]
    fn test_read_header_rejects_version() {
        let mut buf = [0u8; 4];
        write_header(&mut buf, &Header::default());
        // Force a different version into the low 2 bits.
        buf[0] |= 0x1;

        let err = read_header(&buf).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::VersionMismatch {
                expected: CODEC_VERSION,
                actual: 1,
            }
        );
    }

    #[test]
    fn test_write_header_fills_slot() {
        let mut buf = [0xAAu8; 6];
        write_header(&mut buf, &Header::default());
        // The full 4-byte slot is rewritten, the rest untouched.
        assert_eq!(buf[3], 0);
        assert_eq!(buf[4], 0xAA);
        assert_eq!(buf[5], 0xAA);
    }

    #[test]
    fn test_scalar_round_trips() {
        let mut buf = [0u8; 16];

        write_u16(&mut buf, 0xBEEF, 1);
        assert_eq!(read_u16(&buf, 1), 0xBEEF);

        write_u32(&mut buf, 0xDEAD_BEEF, 4);
        assert_eq!(read_u32(&buf, 4), 0xDEAD_BEEF);

        write_i8(&mut buf, -2, 9);
        assert_eq!(read_i8(&buf, 9), -2);

        write_i16(&mut buf, -1000, 10);
        assert_eq!(read_i16(&buf, 10), -1000);

        write_i32(&mut buf, -123_456, 12);
        assert_eq!(read_i32(&buf, 12), -123_456);
    }

    #[test]
    fn test_scalars_are_little_endian() {
        let mut buf = [0u8; 8];
        write_u32(&mut buf, 0x0403_0201, 0);
        assert_eq!(&buf[..4], &[0x01, 0x02, 0x03, 0x04]);
        write_u16(&mut buf, 0x1234, 4);
        assert_eq!(&buf[4..6], &[0x34, 0x12]);
    }
}
