use std::io::{BufWriter, Write};

use crate::format::{encode_header, payload_len, CELL_HEADER_BYTES};
use crate::{CellRecord, CellStreamError, Result};

/// Appends framed cells to any [`Write`] sink.
///
/// Output is buffered; call [`finish`](CellWriter::finish) (or
/// [`flush`](CellWriter::flush)) before relying on the bytes being in the
/// sink. Dropping the writer flushes on a best-effort basis only, so errors
/// would be lost.
pub struct CellWriter<W: Write> {
    out: BufWriter<W>,
    cells: u64,
    bytes: u64,
}

impl<W: Write> CellWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            out: BufWriter::new(inner),
            cells: 0,
            bytes: 0,
        }
    }

    /// Appends one frame.
    ///
    /// The payload length is validated before anything is written, so an
    /// oversized payload never leaves a partial frame behind.
    ///
    /// # Errors
    ///
    /// [`CellStreamError::SizeOverflow`] if the payload does not fit the
    /// 32-bit length field, [`CellStreamError::Io`] if the sink fails.
    pub fn write_cell(&mut self, id: i64, cell_type: u16, payload: &[u8]) -> Result<()> {
        let len = payload_len(payload.len())?;
        self.out.write_all(&encode_header(id, cell_type, len))?;
        self.out.write_all(payload)?;

        self.cells += 1;
        self.bytes += CELL_HEADER_BYTES as u64 + u64::from(len);
        Ok(())
    }

    pub fn write_record(&mut self, record: &CellRecord) -> Result<()> {
        self.write_cell(record.id, record.cell_type, &record.payload)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Number of cells written so far.
    pub fn cells_written(&self) -> u64 {
        self.cells
    }

    /// Number of stream bytes produced so far (headers included).
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Flushes all buffered frames and hands back the underlying sink.
    pub fn finish(self) -> Result<W> {
        self.out
            .into_inner()
            .map_err(|e| CellStreamError::Io(e.into_error()))
    }
}
