//! # Cell stream
//!
//! Streaming binary container for partition images.
//!
//! A cell stream is a plain concatenation of framed cell records. There is no
//! file header, index or footer: a reader consumes frames until the source is
//! exhausted, so images can be produced and consumed without ever holding the
//! whole partition in memory.
//!
//! ## Frame layout
//!
//! ```text
//! ┌──────────────┬────────────────┬──────────────────┬─────────────────┐
//! │ id (i64 LE)  │ type (u16 LE)  │ length (u32 LE)  │ payload (bytes) │
//! │   8 bytes    │    2 bytes     │     4 bytes      │  length bytes   │
//! └──────────────┴────────────────┴──────────────────┴─────────────────┘
//! ```
//!
//! ... repeated for each cell. A zero-byte stream is a valid, empty image.
//!
//! A source that ends exactly on a frame boundary is a clean end of stream.
//! A source that ends anywhere inside a frame is reported as
//! [`CellStreamError::Truncated`].

mod codec;
mod format;
mod reader;
mod writer;

use std::io;

use thiserror::Error;

pub use codec::{BinaryCellCodec, CellCodec, CellSink, CellSource};
pub use format::{CELL_HEADER_BYTES, MAX_PAYLOAD_LEN};
pub use reader::CellReader;
pub use writer::CellWriter;

/// One persisted cell: identifier, type tag and opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRecord {
    /// Dataset-wide unique identifier.
    pub id: i64,
    /// Tag telling the local store how to interpret `payload`.
    pub cell_type: u16,
    pub payload: Vec<u8>,
}

impl CellRecord {
    pub fn new(id: i64, cell_type: u16, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            cell_type,
            payload: payload.into(),
        }
    }

    /// Number of bytes this record occupies in a cell stream.
    pub fn encoded_len(&self) -> u64 {
        CELL_HEADER_BYTES as u64 + self.payload.len() as u64
    }
}

#[derive(Debug, Error)]
pub enum CellStreamError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error(
        "truncated cell frame at offset {offset}: `{field}` needs {needed} bytes, only {got} available"
    )]
    Truncated {
        /// Stream offset of the first byte of the broken frame.
        offset: u64,
        field: &'static str,
        needed: u64,
        got: u64,
    },
    #[error("payload of {len} bytes exceeds the frame limit of {max} bytes")]
    SizeOverflow { len: u64, max: u64 },
}

pub type Result<T> = std::result::Result<T, CellStreamError>;
