//! Frame header constants and encode/decode helpers.
//!
//! The header is always the first **14 bytes** of a frame:
//!
//! ```text
//! [id: i64 LE][type: u16 LE][length: u32 LE]
//! ```

use byteorder::{ByteOrder, LittleEndian};

use crate::{CellStreamError, Result};

/// Size of the frame header: 8 (`id`) + 2 (`type`) + 4 (`length`).
pub const CELL_HEADER_BYTES: usize = 8 + 2 + 4;

/// Largest payload the 32-bit length field can describe.
pub const MAX_PAYLOAD_LEN: u64 = u32::MAX as u64;

const ID_END: usize = 8;
const TYPE_END: usize = ID_END + 2;

/// Validates `len` against the length field and narrows it to `u32`.
pub(crate) fn payload_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| CellStreamError::SizeOverflow {
        len: len as u64,
        max: MAX_PAYLOAD_LEN,
    })
}

pub(crate) fn encode_header(id: i64, cell_type: u16, len: u32) -> [u8; CELL_HEADER_BYTES] {
    let mut header = [0u8; CELL_HEADER_BYTES];
    LittleEndian::write_i64(&mut header[..ID_END], id);
    LittleEndian::write_u16(&mut header[ID_END..TYPE_END], cell_type);
    LittleEndian::write_u32(&mut header[TYPE_END..], len);
    header
}

/// Splits a complete header into `(id, type, length)`.
pub(crate) fn decode_header(header: &[u8; CELL_HEADER_BYTES]) -> (i64, u16, u32) {
    (
        LittleEndian::read_i64(&header[..ID_END]),
        LittleEndian::read_u16(&header[ID_END..TYPE_END]),
        LittleEndian::read_u32(&header[TYPE_END..]),
    )
}

/// Describes a header that stopped after `got` bytes (`0 < got < 14`).
pub(crate) fn truncated_header(offset: u64, got: usize) -> CellStreamError {
    let (field, start, width) = if got < ID_END {
        ("id", 0, ID_END)
    } else if got < TYPE_END {
        ("type", ID_END, TYPE_END - ID_END)
    } else {
        ("length", TYPE_END, CELL_HEADER_BYTES - TYPE_END)
    };
    CellStreamError::Truncated {
        offset,
        field,
        needed: width as u64,
        got: (got - start) as u64,
    }
}
