use std::fmt;

use blobstore::BlobStoreError;
use cellstore::CellStoreError;
use cellstream::CellStreamError;
use thiserror::Error;

/// The image store operation an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SaveImage,
    LoadImage,
    InspectImage,
    LoadSignature,
    SaveSignature,
    Status,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::SaveImage => "save image",
            Operation::LoadImage => "load image",
            Operation::InspectImage => "inspect image",
            Operation::LoadSignature => "load signature",
            Operation::SaveSignature => "save signature",
            Operation::Status => "status",
        })
    }
}

#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("partition {partition}: image `{key}` not found")]
    ImageNotFound { partition: u32, key: String },

    #[error("partition {partition}: {op} failed on image stream `{key}`: {source}")]
    Codec {
        partition: u32,
        op: Operation,
        key: String,
        #[source]
        source: CellStreamError,
    },

    #[error("partition {partition}: {op} failed on blob `{key}`: {source}")]
    Blob {
        partition: u32,
        op: Operation,
        key: String,
        #[source]
        source: BlobStoreError,
    },

    #[error("partition {partition}: {op} failed enumerating the local store: {source}")]
    LocalEnumerate {
        partition: u32,
        op: Operation,
        #[source]
        source: CellStoreError,
    },

    #[error("partition {partition}: {op} failed on local cell {cell}: {source}")]
    Local {
        partition: u32,
        op: Operation,
        cell: i64,
        #[source]
        source: CellStoreError,
    },

    #[error("partition {partition}: cell {cell} disappeared from the local store during save")]
    CellVanished { partition: u32, cell: i64 },

    #[error("partition {partition}: signature `{key}` is malformed: {source}")]
    Signature {
        partition: u32,
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ImageStoreError {
    /// Partition the failed operation was working on.
    pub fn partition(&self) -> u32 {
        match self {
            ImageStoreError::ImageNotFound { partition, .. }
            | ImageStoreError::Codec { partition, .. }
            | ImageStoreError::Blob { partition, .. }
            | ImageStoreError::LocalEnumerate { partition, .. }
            | ImageStoreError::Local { partition, .. }
            | ImageStoreError::CellVanished { partition, .. }
            | ImageStoreError::Signature { partition, .. } => *partition,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ImageStoreError::ImageNotFound { .. })
    }

    /// True for truncated image framing.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            ImageStoreError::Codec {
                source: CellStreamError::Truncated { .. },
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, ImageStoreError>;
