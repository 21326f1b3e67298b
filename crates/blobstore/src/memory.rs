use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};

use parking_lot::RwLock;

use crate::fingerprint::{fingerprint_of, FingerprintHasher};
use crate::{validate_key, BlobStore, BlobStoreError, BlobWriter, ContentFingerprint, Result};

/// In-memory blob store. Commits swap the whole buffer in under the lock, so
/// readers see either the old object or the new one.
#[derive(Debug)]
pub struct MemBlobStore {
    container: String,
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    created: bool,
    objects: BTreeMap<String, Vec<u8>>,
}

impl MemBlobStore {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            state: RwLock::new(State::default()),
        }
    }

    /// Whether [`create_container_if_absent`](BlobStore::create_container_if_absent)
    /// has run.
    pub fn container_exists(&self) -> bool {
        self.state.read().created
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.state.read().objects.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().objects.is_empty()
    }

    /// Stores `bytes` directly, creating the container if needed. Bypasses
    /// the writer path so tests can plant arbitrary (e.g. corrupt) objects.
    pub fn insert_raw(&self, key: impl Into<String>, bytes: Vec<u8>) {
        let mut state = self.state.write();
        state.created = true;
        state.objects.insert(key.into(), bytes);
    }
}

impl BlobStore for MemBlobStore {
    fn container(&self) -> &str {
        &self.container
    }

    fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.state.read().objects.contains_key(key))
    }

    fn create_container_if_absent(&self) -> Result<()> {
        self.state.write().created = true;
        Ok(())
    }

    fn download_whole(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.state.read().objects.get(key).cloned())
    }

    fn open_read(&self, key: &str) -> Result<Option<Box<dyn Read + Send + '_>>> {
        Ok(self
            .download_whole(key)?
            .map(|bytes| Box::new(Cursor::new(bytes)) as Box<dyn Read + Send>))
    }

    fn open_write(&self, key: &str) -> Result<Box<dyn BlobWriter + '_>> {
        validate_key(key)?;
        if !self.container_exists() {
            return Err(BlobStoreError::MissingContainer(self.container.clone()));
        }
        Ok(Box::new(MemBlobWriter {
            store: self,
            key: key.to_string(),
            buf: Vec::new(),
            hasher: FingerprintHasher::new(),
        }))
    }

    fn content_fingerprint(&self, key: &str) -> Result<Option<ContentFingerprint>> {
        validate_key(key)?;
        Ok(self.state.read().objects.get(key).map(|b| fingerprint_of(b)))
    }
}

struct MemBlobWriter<'a> {
    store: &'a MemBlobStore,
    key: String,
    buf: Vec<u8>,
    hasher: FingerprintHasher,
}

impl Write for MemBlobWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        self.hasher.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl BlobWriter for MemBlobWriter<'_> {
    fn commit(self: Box<Self>) -> Result<ContentFingerprint> {
        let MemBlobWriter {
            store,
            key,
            buf,
            hasher,
        } = *self;
        store.state.write().objects.insert(key, buf);
        Ok(hasher.finish())
    }
}
