use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::fingerprint::{FingerprintHasher, FingerprintingReader};
use crate::{
    validate_key, BlobStore, BlobStoreError, BlobWriter, ContentFingerprint, Result, TEMP_SUFFIX,
};

/// Blob store backed by a directory tree: `root/container/<key>`.
///
/// Writes go to a `<key>.tmp` sibling, are fsynced, and are then atomically
/// renamed over the target, so readers only ever see a complete previous
/// object or a complete new one. A crash mid-write leaves the temp file
/// behind; it never shadows the real object.
///
/// Two concurrent writers of the same key share the temp path and must be
/// serialized by the caller. Writers of different keys are independent.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    container: String,
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new<P: AsRef<Path>>(root: P, container: impl Into<String>) -> Self {
        let container = container.into();
        let dir = root.as_ref().join(&container);
        Self { container, dir }
    }

    /// Directory holding this container's blobs.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.dir.clone(), |p, seg| p.join(seg)))
    }
}

impl BlobStore for FsBlobStore {
    fn container(&self) -> &str {
        &self.container
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BlobStoreError::io(key, e)),
        }
    }

    fn create_container_if_absent(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| BlobStoreError::io(&self.container, e))
    }

    fn download_whole(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BlobStoreError::io(key, e)),
        }
    }

    fn open_read(&self, key: &str) -> Result<Option<Box<dyn Read + Send + '_>>> {
        let path = self.path_for(key)?;
        match File::open(&path) {
            Ok(f) => Ok(Some(Box::new(f))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BlobStoreError::io(key, e)),
        }
    }

    fn open_write(&self, key: &str) -> Result<Box<dyn BlobWriter + '_>> {
        let target = self.path_for(key)?;
        if !self.dir.is_dir() {
            return Err(BlobStoreError::MissingContainer(self.container.clone()));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| BlobStoreError::io(key, e))?;
        }

        let mut tmp_name = target
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        tmp_name.push(TEMP_SUFFIX);
        let tmp = target.with_file_name(tmp_name);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .map_err(|e| BlobStoreError::io(key, e))?;

        Ok(Box::new(FsBlobWriter {
            key: key.to_string(),
            file: Some(BufWriter::new(file)),
            tmp,
            target,
            hasher: FingerprintHasher::new(),
            committed: false,
        }))
    }

    fn content_fingerprint(&self, key: &str) -> Result<Option<ContentFingerprint>> {
        let path = self.path_for(key)?;
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BlobStoreError::io(key, e)),
        };

        FingerprintingReader::new(BufReader::new(file))
            .finish()
            .map(Some)
            .map_err(|e| BlobStoreError::io(key, e))
    }
}

struct FsBlobWriter {
    key: String,
    /// `None` once commit has taken the handle.
    file: Option<BufWriter<File>>,
    tmp: PathBuf,
    target: PathBuf,
    hasher: FingerprintHasher,
    committed: bool,
}

impl FsBlobWriter {
    fn file(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("blob writer already committed"))
    }
}

impl Write for FsBlobWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file()?.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

impl BlobWriter for FsBlobWriter {
    fn commit(mut self: Box<Self>) -> Result<ContentFingerprint> {
        let key = self.key.clone();
        let file = self
            .file
            .take()
            .ok_or_else(|| BlobStoreError::io(&key, io::Error::other("already committed")))?;

        let file = file
            .into_inner()
            .map_err(|e| BlobStoreError::io(&key, e.into_error()))?;
        file.sync_all().map_err(|e| BlobStoreError::io(&key, e))?;
        drop(file);

        fs::rename(&self.tmp, &self.target).map_err(|e| BlobStoreError::io(&key, e))?;
        self.committed = true;

        Ok(std::mem::take(&mut self.hasher).finish())
    }
}

impl Drop for FsBlobWriter {
    fn drop(&mut self) {
        if !self.committed {
            self.file.take();
            let _ = fs::remove_file(&self.tmp);
        }
    }
}
