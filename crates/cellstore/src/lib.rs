//! # Cell store
//!
//! The node-local side of partition images: where cells live between saves
//! and where loaded cells are installed.
//!
//! - [`LocalCellStore`] is the seam the image store talks to. Every method
//!   takes `&self`, so implementations provide their own per-record mutation
//!   safety and can be shared across concurrent saves and loads.
//! - [`MemCellStore`] is an ordered, in-memory implementation.
//! - [`PartitionOracle`] answers which partition owns a cell id.
//!
//! ## Example
//! ```rust
//! use cellstore::{LocalCellStore, MemCellStore};
//!
//! let store = MemCellStore::new();
//! store.put(5, 1, b"hello".to_vec()).unwrap();
//! let cell = store.get(5).unwrap().unwrap();
//! assert_eq!(cell.cell_type, 1);
//! assert_eq!(cell.payload, b"hello".to_vec());
//! ```

mod memory;
mod oracle;

use std::io;
use std::sync::Arc;

use thiserror::Error;

pub use memory::MemCellStore;
pub use oracle::{ModuloPartitioner, PartitionOracle};

/// A cell as held by the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCell {
    pub cell_type: u16,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum CellStoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("cell store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, CellStoreError>;

/// Node-local record store keyed by cell id.
pub trait LocalCellStore: Send + Sync {
    /// Lists `(id, type)` for every cell currently held. Payloads are fetched
    /// lazily with [`get`](LocalCellStore::get).
    fn enumerate(&self) -> Result<Vec<(i64, u16)>>;

    fn get(&self, id: i64) -> Result<Option<StoredCell>>;

    /// Inserts or overwrites the cell with this id.
    fn put(&self, id: i64, cell_type: u16, payload: Vec<u8>) -> Result<()>;
}

impl<T: LocalCellStore + ?Sized> LocalCellStore for Arc<T> {
    fn enumerate(&self) -> Result<Vec<(i64, u16)>> {
        (**self).enumerate()
    }

    fn get(&self, id: i64) -> Result<Option<StoredCell>> {
        (**self).get(id)
    }

    fn put(&self, id: i64, cell_type: u16, payload: Vec<u8>) -> Result<()> {
        (**self).put(id, cell_type, payload)
    }
}
