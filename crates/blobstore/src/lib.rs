//! # Blob store
//!
//! A container-scoped key → bytes store used to hold partition images and
//! signatures.
//!
//! Keys are `/`-separated relative paths such as `partitions/3.image`.
//! Writes are all-or-nothing: bytes written through a [`BlobWriter`] become
//! visible only when [`BlobWriter::commit`] succeeds, and a writer dropped
//! without committing leaves the previous object (or no object) in place.
//!
//! Every object has a [`ContentFingerprint`] computed by the store over its
//! exact bytes, which callers use as a cheap equality check.
//!
//! Implementations:
//! - [`FsBlobStore`], one file per blob under `root/container/`.
//! - [`MemBlobStore`], a map of buffers for tests and embedding.

mod fingerprint;
mod fs;
mod memory;

use std::io::{self, Read, Write};
use std::sync::Arc;

use thiserror::Error;

pub use fingerprint::{fingerprint_of, ContentFingerprint, FingerprintHasher, FingerprintingReader};
pub use fs::FsBlobStore;
pub use memory::MemBlobStore;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("io error on blob `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid blob key `{0}`")]
    InvalidKey(String),
    #[error("container `{0}` does not exist")]
    MissingContainer(String),
}

impl BlobStoreError {
    pub(crate) fn io(key: &str, source: io::Error) -> Self {
        BlobStoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BlobStoreError>;

/// An in-progress, uncommitted object write.
pub trait BlobWriter: Write + Send {
    /// Makes the written bytes visible under the key, replacing any previous
    /// object, and returns the fingerprint of the new content.
    fn commit(self: Box<Self>) -> Result<ContentFingerprint>;
}

pub trait BlobStore: Send + Sync {
    /// Name of the container this store is scoped to.
    fn container(&self) -> &str;

    fn exists(&self, key: &str) -> Result<bool>;

    /// Idempotent.
    fn create_container_if_absent(&self) -> Result<()>;

    /// Whole object, or `None` if it does not exist.
    fn download_whole(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Streaming read, or `None` if the object does not exist.
    fn open_read(&self, key: &str) -> Result<Option<Box<dyn Read + Send + '_>>>;

    /// Starts a replacing write. Fails with
    /// [`BlobStoreError::MissingContainer`] if the container was never created.
    fn open_write(&self, key: &str) -> Result<Box<dyn BlobWriter + '_>>;

    fn upload_whole(&self, key: &str, bytes: &[u8]) -> Result<ContentFingerprint> {
        let mut w = self.open_write(key)?;
        w.write_all(bytes).map_err(|e| BlobStoreError::io(key, e))?;
        w.commit()
    }

    /// Fingerprint of the current object, or `None` if it does not exist.
    /// Always equals [`fingerprint_of`] over the object's bytes.
    fn content_fingerprint(&self, key: &str) -> Result<Option<ContentFingerprint>>;
}

impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    fn container(&self) -> &str {
        (**self).container()
    }

    fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key)
    }

    fn create_container_if_absent(&self) -> Result<()> {
        (**self).create_container_if_absent()
    }

    fn download_whole(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).download_whole(key)
    }

    fn open_read(&self, key: &str) -> Result<Option<Box<dyn Read + Send + '_>>> {
        (**self).open_read(key)
    }

    fn open_write(&self, key: &str) -> Result<Box<dyn BlobWriter + '_>> {
        (**self).open_write(key)
    }

    fn upload_whole(&self, key: &str, bytes: &[u8]) -> Result<ContentFingerprint> {
        (**self).upload_whole(key, bytes)
    }

    fn content_fingerprint(&self, key: &str) -> Result<Option<ContentFingerprint>> {
        (**self).content_fingerprint(key)
    }
}

/// Joins a folder and an object name into a key. An empty folder yields the
/// bare name.
pub fn join_key(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}

/// Suffix of in-flight writes in [`FsBlobStore`]. Reserved: no key may end
/// with it.
pub(crate) const TEMP_SUFFIX: &str = ".tmp";

/// Rejects keys that could escape the container (empty keys, absolute
/// paths, `.`/`..` segments, empty segments, backslashes) and keys that
/// would collide with an in-flight write's temp file.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.ends_with(TEMP_SUFFIX)
        || key.contains('\\')
        || key
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(BlobStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
