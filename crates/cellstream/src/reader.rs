use std::io::{self, BufReader, Read};

use crate::format::{decode_header, truncated_header, CELL_HEADER_BYTES};
use crate::{CellRecord, CellStreamError, Result};

/// Upper bound for the initial payload allocation. A corrupt length field
/// must not be able to reserve gigabytes before the read proves the bytes
/// exist.
const MAX_PREALLOC: usize = 64 * 1024;

/// Reads framed cells from any [`Read`] source, one frame at a time.
///
/// The reader is forward-only. To read an image again, open a fresh source.
pub struct CellReader<R: Read> {
    rdr: BufReader<R>,
    offset: u64,
    cells: u64,
    done: bool,
}

impl<R: Read> CellReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            rdr: BufReader::new(inner),
            offset: 0,
            cells: 0,
            done: false,
        }
    }

    /// Reads the next cell.
    ///
    /// Returns `Ok(None)` when the source is exhausted exactly on a frame
    /// boundary. Any shorter read inside a frame is an error.
    ///
    /// # Errors
    ///
    /// [`CellStreamError::Truncated`] if the source ends mid-frame,
    /// [`CellStreamError::Io`] if the source fails.
    pub fn read_cell(&mut self) -> Result<Option<CellRecord>> {
        if self.done {
            return Ok(None);
        }

        let frame_start = self.offset;
        let mut header = [0u8; CELL_HEADER_BYTES];
        let got = read_full(&mut self.rdr, &mut header)?;
        if got == 0 {
            self.done = true;
            return Ok(None);
        }
        if got < CELL_HEADER_BYTES {
            self.done = true;
            return Err(truncated_header(frame_start, got));
        }

        let (id, cell_type, len) = decode_header(&header);
        let len = len as usize;
        let mut payload = Vec::with_capacity(len.min(MAX_PREALLOC));
        (&mut self.rdr).take(len as u64).read_to_end(&mut payload)?;
        if payload.len() < len {
            self.done = true;
            return Err(CellStreamError::Truncated {
                offset: frame_start,
                field: "payload",
                needed: len as u64,
                got: payload.len() as u64,
            });
        }

        self.offset += (CELL_HEADER_BYTES + len) as u64;
        self.cells += 1;
        Ok(Some(CellRecord {
            id,
            cell_type,
            payload,
        }))
    }

    /// Number of cells decoded so far.
    pub fn cells_read(&self) -> u64 {
        self.cells
    }

    /// Stream offset just past the last complete frame.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> R {
        self.rdr.into_inner()
    }
}

impl<R: Read> Iterator for CellReader<R> {
    type Item = Result<CellRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_cell().transpose()
    }
}

/// Fills as much of `buf` as the source allows. Unlike `read_exact`, a short
/// read reports how many bytes arrived instead of failing outright.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
