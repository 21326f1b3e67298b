use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::{LocalCellStore, Result, StoredCell};

/// An ordered, in-memory cell store backed by a `BTreeMap`.
///
/// Enumeration is always in ascending id order, which makes image saves
/// reproducible byte for byte. The store also tracks the approximate number
/// of payload bytes it holds.
///
/// Each operation takes the lock for its own duration only; a partition load
/// installing thousands of cells never holds it across cells.
#[derive(Debug, Default)]
pub struct MemCellStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    map: BTreeMap<i64, StoredCell>,
    approx_size: usize,
}

impl MemCellStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes the cell, returning it if it was present.
    pub fn remove(&self, id: i64) -> Option<StoredCell> {
        let mut inner = self.inner.write();
        let old = inner.map.remove(&id)?;
        inner.approx_size = inner.approx_size.saturating_sub(old.payload.len());
        Some(old)
    }

    pub fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().map.is_empty()
    }

    /// Approximate number of payload bytes held. Map overhead is not counted.
    pub fn approx_size(&self) -> usize {
        self.inner.read().approx_size
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> Vec<i64> {
        self.inner.read().map.keys().copied().collect()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.inner.read().map.contains_key(&id)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.map.clear();
        inner.approx_size = 0;
    }
}

impl LocalCellStore for MemCellStore {
    fn enumerate(&self) -> Result<Vec<(i64, u16)>> {
        Ok(self
            .inner
            .read()
            .map
            .iter()
            .map(|(id, cell)| (*id, cell.cell_type))
            .collect())
    }

    fn get(&self, id: i64) -> Result<Option<StoredCell>> {
        Ok(self.inner.read().map.get(&id).cloned())
    }

    fn put(&self, id: i64, cell_type: u16, payload: Vec<u8>) -> Result<()> {
        let mut inner = self.inner.write();
        let added = payload.len();
        if let Some(old) = inner.map.insert(id, StoredCell { cell_type, payload }) {
            inner.approx_size = inner.approx_size.saturating_sub(old.payload.len());
        }
        inner.approx_size = inner.approx_size.saturating_add(added);
        Ok(())
    }
}
