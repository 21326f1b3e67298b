//! Reload-if-changed policy on top of the raw save/load primitives.
//!
//! A partition is stale when the remote image's fingerprint differs from the
//! fingerprint recorded in its signature. A virgin signature is stale against
//! any image.

use blobstore::{BlobStore, ContentFingerprint};
use cellstore::{LocalCellStore, PartitionOracle};
use tracing::info;

use crate::error::{ImageStoreError, Operation, Result};
use crate::signature::PartitionSignature;
use crate::store::{ImageStats, PartitionedImageStore};

/// Stored signature compared against the remote image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionStatus {
    /// No image has been saved for the partition.
    NoImage { signature: PartitionSignature },
    UpToDate {
        signature: PartitionSignature,
        remote: ContentFingerprint,
    },
    Stale {
        signature: PartitionSignature,
        remote: ContentFingerprint,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    NoImage,
    /// The signature already matched the remote image; nothing was loaded.
    UpToDate(ContentFingerprint),
    Reloaded {
        fingerprint: ContentFingerprint,
        stats: ImageStats,
    },
}

impl<B, L, O> PartitionedImageStore<B, L, O>
where
    B: BlobStore,
    L: LocalCellStore,
    O: PartitionOracle,
{
    /// Compares the stored signature with the remote image's fingerprint
    /// without downloading the image.
    pub fn partition_status(&self, partition: u32) -> Result<PartitionStatus> {
        let signature = self.load_partition_signature(partition)?;
        let key = self.image_key(partition);
        let remote = self
            .blob_store()
            .content_fingerprint(&key)
            .map_err(|source| ImageStoreError::Blob {
                partition,
                op: Operation::Status,
                key,
                source,
            })?;

        Ok(match remote {
            None => PartitionStatus::NoImage { signature },
            Some(remote) if signature.matches(&remote) => {
                PartitionStatus::UpToDate { signature, remote }
            }
            Some(remote) => PartitionStatus::Stale { signature, remote },
        })
    }

    /// Loads the partition's image only if it changed since the signature was
    /// written, then records the loaded fingerprint as the new signature.
    ///
    /// If the image changes between the status check and the load, or while
    /// the load is streaming, the signature records the fingerprint of the
    /// bytes that were decoded, so the next sync sees the newer image as
    /// stale and reloads it.
    pub fn sync_partition(&self, partition: u32) -> Result<SyncOutcome> {
        match self.partition_status(partition)? {
            PartitionStatus::NoImage { .. } => {
                info!(partition, "no image to sync");
                Ok(SyncOutcome::NoImage)
            }
            PartitionStatus::UpToDate { remote, .. } => {
                info!(partition, "partition image unchanged, skipping reload");
                Ok(SyncOutcome::UpToDate(remote))
            }
            PartitionStatus::Stale { signature, remote } => {
                info!(
                    partition,
                    stored = ?signature.fingerprint.as_ref().map(ContentFingerprint::as_str),
                    %remote,
                    "partition image changed, reloading"
                );
                let (fingerprint, stats) = self.load_image_partition_with_stats(partition)?;
                self.save_partition_signature(&PartitionSignature::with_fingerprint(
                    partition,
                    fingerprint.clone(),
                ))?;
                Ok(SyncOutcome::Reloaded { fingerprint, stats })
            }
        }
    }

    /// Saves the partition's image and records its fingerprint as the
    /// partition's signature.
    pub fn checkpoint_partition(&self, partition: u32) -> Result<PartitionSignature> {
        let fingerprint = self.save_image_partition(partition)?;
        let signature = PartitionSignature::with_fingerprint(partition, fingerprint);
        self.save_partition_signature(&signature)?;
        Ok(signature)
    }
}
