use std::fmt;
use std::io::{self, Read};

use crc32fast::Hasher as Crc32;
use serde::{Deserialize, Serialize};

/// Opaque content fingerprint reported by a blob store.
///
/// Only equality is meaningful. It is the CRC-32 of the object bytes rendered
/// as 8 lowercase hex digits, so a reader can compute it over exactly the
/// bytes it consumed with [`FingerprintingReader`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incremental fingerprinting for streamed writes.
#[derive(Clone, Default)]
pub struct FingerprintHasher {
    crc: Crc32,
}

impl FingerprintHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.crc.update(bytes);
    }

    pub fn finish(self) -> ContentFingerprint {
        ContentFingerprint(format!("{:08x}", self.crc.finalize()))
    }
}

pub fn fingerprint_of(bytes: &[u8]) -> ContentFingerprint {
    let mut h = FingerprintHasher::new();
    h.update(bytes);
    h.finish()
}

/// Read adapter that fingerprints every byte passed through it.
pub struct FingerprintingReader<R> {
    inner: R,
    hasher: FingerprintHasher,
}

impl<R: Read> FingerprintingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: FingerprintHasher::new(),
        }
    }

    /// Drains whatever the consumer left unread and returns the fingerprint
    /// of the whole stream.
    pub fn finish(mut self) -> io::Result<ContentFingerprint> {
        io::copy(&mut self, &mut io::sink())?;
        Ok(self.hasher.finish())
    }
}

impl<R: Read> Read for FingerprintingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
