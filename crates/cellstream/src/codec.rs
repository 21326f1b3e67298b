//! Swappable codec seam used by the image store.
//!
//! The store never names [`CellWriter`] or [`CellReader`] directly; it asks a
//! [`CellCodec`] for a sink or source around the blob stream. Tests can plug
//! in their own codec without touching orchestration code.

use std::io::{Read, Write};

use crate::{CellReader, CellRecord, CellWriter, Result};

/// Destination for an ordered sequence of cells.
pub trait CellSink {
    fn write_cell(&mut self, id: i64, cell_type: u16, payload: &[u8]) -> Result<()>;

    /// Flushes everything written so far into the underlying stream.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Source of an ordered sequence of cells. `Ok(None)` means exhausted.
pub trait CellSource {
    fn read_cell(&mut self) -> Result<Option<CellRecord>>;
}

pub trait CellCodec: Send + Sync {
    fn writer<'a>(&self, out: Box<dyn Write + 'a>) -> Box<dyn CellSink + 'a>;

    fn reader<'a>(&self, input: Box<dyn Read + 'a>) -> Box<dyn CellSource + 'a>;

    /// Encodes `cells` into a fresh buffer.
    fn encode(&self, cells: &[CellRecord]) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut sink = self.writer(Box::new(&mut buf));
        for c in cells {
            sink.write_cell(c.id, c.cell_type, &c.payload)?;
        }
        sink.finish()?;
        Ok(buf)
    }

    /// Decodes every cell in `bytes`.
    fn decode(&self, bytes: &[u8]) -> Result<Vec<CellRecord>> {
        let mut source = self.reader(Box::new(bytes));
        let mut cells = Vec::new();
        while let Some(c) = source.read_cell()? {
            cells.push(c);
        }
        Ok(cells)
    }
}

/// The frame format described in the crate docs.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryCellCodec;

impl CellCodec for BinaryCellCodec {
    fn writer<'a>(&self, out: Box<dyn Write + 'a>) -> Box<dyn CellSink + 'a> {
        Box::new(CellWriter::new(out))
    }

    fn reader<'a>(&self, input: Box<dyn Read + 'a>) -> Box<dyn CellSource + 'a> {
        Box::new(CellReader::new(input))
    }
}

impl<W: Write> CellSink for CellWriter<W> {
    fn write_cell(&mut self, id: i64, cell_type: u16, payload: &[u8]) -> Result<()> {
        CellWriter::write_cell(self, id, cell_type, payload)
    }

    fn finish(self: Box<Self>) -> Result<()> {
        CellWriter::finish(*self).map(drop)
    }
}

impl<R: Read> CellSource for CellReader<R> {
    fn read_cell(&mut self) -> Result<Option<CellRecord>> {
        CellReader::read_cell(self)
    }
}
