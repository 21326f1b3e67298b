//! # Image store
//!
//! Whole-partition snapshots of a node's cells.
//!
//! Each partition `P` is persisted as two objects in a [`blobstore::BlobStore`]
//! container:
//!
//! ```text
//! {folder}/{P}.image   cell stream of every cell the oracle assigns to P
//! {folder}/{P}.sig     JSON signature: {"PartitionId":P,"Fingerprint":"..."}
//! ```
//!
//! [`PartitionedImageStore`] saves and loads images against an injected
//! [`cellstore::LocalCellStore`] and [`cellstore::PartitionOracle`]; the
//! signature lets [`PartitionedImageStore::sync_partition`] skip reloading an
//! image that has not changed since it was last loaded or saved.
//!
//! Nothing here retries. Every failure is returned to the caller with the
//! partition, operation and key it happened on.

mod config;
mod error;
mod signature;
mod store;
mod sync;

pub use config::ImageStoreConfig;
pub use error::{ImageStoreError, Operation, Result};
pub use signature::PartitionSignature;
pub use store::{ImageStats, PartitionedImageStore};
pub use sync::{PartitionStatus, SyncOutcome};
