use blobstore::{
    join_key, BlobStore, BlobStoreError, ContentFingerprint, FingerprintingReader, FsBlobStore,
};
use cellstore::{LocalCellStore, PartitionOracle};
use cellstream::{BinaryCellCodec, CellCodec, CellRecord};
use tracing::{debug, warn};

use crate::config::ImageStoreConfig;
use crate::error::{ImageStoreError, Operation, Result};
use crate::signature::PartitionSignature;

/// What a save, load or inspect moved through the codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageStats {
    pub cells: u64,
    pub payload_bytes: u64,
}

impl ImageStats {
    fn record(&mut self, payload_len: usize) {
        self.cells += 1;
        self.payload_bytes += payload_len as u64;
    }
}

/// Saves and loads whole-partition images against a [`BlobStore`].
///
/// # Save path
///
/// 1. Create the container if absent.
/// 2. Enumerate the local store and keep the ids the oracle assigns to the
///    partition, sorted ascending.
/// 3. Stream each cell through the codec into an uncommitted blob writer.
/// 4. Commit; only now does the new image replace the old one.
///
/// # Load path
///
/// 1. Open `{folder}/{partition}.image`; a missing object is an error.
/// 2. Decode cells until end of stream, installing each into the local store.
/// 3. Report the fingerprint of the bytes actually decoded, which may be
///    older than the current object if a save replaced it meanwhile.
///
/// Loads are additive: local cells not present in the image are untouched.
/// A load that fails part-way leaves the cells installed so far in place.
///
/// The store owns its blob store, local store and oracle for its lifetime;
/// [`into_parts`](PartitionedImageStore::into_parts) hands them back.
pub struct PartitionedImageStore<B, L, O> {
    blobs: B,
    local: L,
    oracle: O,
    codec: Box<dyn CellCodec>,
    folder: String,
}

impl<L, O> PartitionedImageStore<FsBlobStore, L, O>
where
    L: LocalCellStore,
    O: PartitionOracle,
{
    /// Filesystem-backed store laid out as `config` describes.
    pub fn from_config(config: &ImageStoreConfig, local: L, oracle: O) -> Self {
        Self::new(config.blob_store(), local, oracle, config.folder.clone())
    }
}

impl<B, L, O> PartitionedImageStore<B, L, O>
where
    B: BlobStore,
    L: LocalCellStore,
    O: PartitionOracle,
{
    pub fn new(blobs: B, local: L, oracle: O, folder: impl Into<String>) -> Self {
        Self {
            blobs,
            local,
            oracle,
            codec: Box::new(BinaryCellCodec),
            folder: folder.into(),
        }
    }

    /// Replaces the default [`BinaryCellCodec`].
    pub fn with_codec(mut self, codec: impl CellCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn blob_store(&self) -> &B {
        &self.blobs
    }

    pub fn local_store(&self) -> &L {
        &self.local
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn into_parts(self) -> (B, L, O) {
        (self.blobs, self.local, self.oracle)
    }

    pub fn image_key(&self, partition: u32) -> String {
        join_key(&self.folder, &format!("{partition}.image"))
    }

    pub fn signature_key(&self, partition: u32) -> String {
        join_key(&self.folder, &format!("{partition}.sig"))
    }

    // -------------------- Signatures --------------------

    /// Returns the stored signature, or [`PartitionSignature::virgin`] if the
    /// partition has never been signed.
    pub fn load_partition_signature(&self, partition: u32) -> Result<PartitionSignature> {
        let key = self.signature_key(partition);
        let bytes = self
            .blobs
            .download_whole(&key)
            .map_err(|source| ImageStoreError::Blob {
                partition,
                op: Operation::LoadSignature,
                key: key.clone(),
                source,
            })?;

        match bytes {
            None => Ok(PartitionSignature::virgin(partition)),
            Some(bytes) => PartitionSignature::from_json(&bytes)
                .map_err(|source| ImageStoreError::Signature {
                    partition,
                    key,
                    source,
                }),
        }
    }

    /// Overwrites the stored signature for `signature.partition_id`.
    pub fn save_partition_signature(&self, signature: &PartitionSignature) -> Result<()> {
        let partition = signature.partition_id;
        let key = self.signature_key(partition);
        let json = signature
            .to_json()
            .map_err(|source| ImageStoreError::Signature {
                partition,
                key: key.clone(),
                source,
            })?;

        let blob_err = |source| ImageStoreError::Blob {
            partition,
            op: Operation::SaveSignature,
            key: key.clone(),
            source,
        };
        self.blobs.create_container_if_absent().map_err(blob_err)?;
        self.blobs.upload_whole(&key, &json).map_err(blob_err)?;
        Ok(())
    }

    // -------------------- Save --------------------

    /// Writes every local cell owned by `partition` as the partition's new
    /// image and returns the stored object's fingerprint.
    ///
    /// The signature is not touched; see
    /// [`checkpoint_partition`](PartitionedImageStore::checkpoint_partition).
    pub fn save_image_partition(&self, partition: u32) -> Result<ContentFingerprint> {
        self.save_image_partition_with_stats(partition)
            .map(|(fingerprint, _)| fingerprint)
    }

    pub fn save_image_partition_with_stats(
        &self,
        partition: u32,
    ) -> Result<(ContentFingerprint, ImageStats)> {
        let op = Operation::SaveImage;
        let key = self.image_key(partition);
        let blob_err = |source| ImageStoreError::Blob {
            partition,
            op,
            key: key.clone(),
            source,
        };
        let codec_err = |source| ImageStoreError::Codec {
            partition,
            op,
            key: key.clone(),
            source,
        };

        self.blobs.create_container_if_absent().map_err(blob_err)?;

        let ids = self.owned_ids(partition)?;
        debug!(partition, cells = ids.len(), %key, "begin saving partition image");

        let mut out = self.blobs.open_write(&key).map_err(blob_err)?;
        let mut stats = ImageStats::default();
        {
            let mut sink = self.codec.writer(Box::new(&mut out));
            for id in ids {
                let cell = self
                    .local
                    .get(id)
                    .map_err(|source| ImageStoreError::Local {
                        partition,
                        op,
                        cell: id,
                        source,
                    })?
                    .ok_or(ImageStoreError::CellVanished {
                        partition,
                        cell: id,
                    })?;
                sink.write_cell(id, cell.cell_type, &cell.payload)
                    .map_err(codec_err)?;
                stats.record(cell.payload.len());
            }
            sink.finish().map_err(codec_err)?;
        }
        let fingerprint = out.commit().map_err(blob_err)?;

        debug!(
            partition,
            cells = stats.cells,
            bytes = stats.payload_bytes,
            %fingerprint,
            "end saving partition image"
        );
        Ok((fingerprint, stats))
    }

    /// Ids the oracle assigns to `partition`, ascending.
    fn owned_ids(&self, partition: u32) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .local
            .enumerate()
            .map_err(|source| ImageStoreError::LocalEnumerate {
                partition,
                op: Operation::SaveImage,
                source,
            })?
            .into_iter()
            .map(|(id, _)| id)
            .filter(|id| self.oracle.partition_of(*id) == partition)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    // -------------------- Load --------------------

    /// Installs every cell of the partition's image into the local store and
    /// returns the image's fingerprint.
    pub fn load_image_partition(&self, partition: u32) -> Result<ContentFingerprint> {
        self.load_image_partition_with_stats(partition)
            .map(|(fingerprint, _)| fingerprint)
    }

    pub fn load_image_partition_with_stats(
        &self,
        partition: u32,
    ) -> Result<(ContentFingerprint, ImageStats)> {
        let op = Operation::LoadImage;
        debug!(partition, "begin loading partition image");

        let mut stats = ImageStats::default();
        let result = self.scan_image(partition, op, |cell| {
            let len = cell.payload.len();
            self.local
                .put(cell.id, cell.cell_type, cell.payload)
                .map_err(|source| ImageStoreError::Local {
                    partition,
                    op,
                    cell: cell.id,
                    source,
                })?;
            stats.record(len);
            Ok(())
        });

        match result {
            Ok(fingerprint) => {
                debug!(
                    partition,
                    cells = stats.cells,
                    bytes = stats.payload_bytes,
                    %fingerprint,
                    "end loading partition image"
                );
                Ok((fingerprint, stats))
            }
            Err(e) => {
                if stats.cells > 0 {
                    warn!(
                        partition,
                        installed = stats.cells,
                        error = %e,
                        "partition load aborted after installing cells"
                    );
                }
                Err(e)
            }
        }
    }

    /// Decodes the partition's image without touching the local store,
    /// calling `visit` for each cell. Useful for verifying an image.
    pub fn inspect_image_partition<F>(
        &self,
        partition: u32,
        mut visit: F,
    ) -> Result<(ContentFingerprint, ImageStats)>
    where
        F: FnMut(&CellRecord),
    {
        let mut stats = ImageStats::default();
        let fingerprint = self.scan_image(partition, Operation::InspectImage, |cell| {
            visit(&cell);
            stats.record(cell.payload.len());
            Ok(())
        })?;
        Ok((fingerprint, stats))
    }

    /// Streams the image through the codec, handing each cell to `apply`,
    /// then reports the fingerprint of exactly the bytes that were read.
    fn scan_image<F>(&self, partition: u32, op: Operation, mut apply: F) -> Result<ContentFingerprint>
    where
        F: FnMut(CellRecord) -> Result<()>,
    {
        let key = self.image_key(partition);
        let blob_err = |source| ImageStoreError::Blob {
            partition,
            op,
            key: key.clone(),
            source,
        };

        let input = self
            .blobs
            .open_read(&key)
            .map_err(blob_err)?
            .ok_or_else(|| ImageStoreError::ImageNotFound {
                partition,
                key: key.clone(),
            })?;
        let mut input = FingerprintingReader::new(input);

        {
            let mut cells = self.codec.reader(Box::new(&mut input));
            while let Some(cell) = cells.read_cell().map_err(|source| ImageStoreError::Codec {
                partition,
                op,
                key: key.clone(),
                source,
            })? {
                apply(cell)?;
            }
        }

        input.finish().map_err(|source| {
            blob_err(BlobStoreError::Io {
                key: key.clone(),
                source,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use blobstore::{fingerprint_of, BlobStoreError, MemBlobStore};
    use cellstore::{CellStoreError, MemCellStore, ModuloPartitioner, StoredCell};
    use cellstream::CellReader;
    use std::collections::BTreeSet;
    use std::num::NonZeroU32;
    use tempfile::tempdir;

    type MemImageStore = PartitionedImageStore<MemBlobStore, MemCellStore, ModuloPartitioner>;

    fn partitions(n: u32) -> ModuloPartitioner {
        ModuloPartitioner::new(NonZeroU32::new(n).unwrap())
    }

    fn mem_store(n: u32) -> MemImageStore {
        PartitionedImageStore::new(
            MemBlobStore::new("images"),
            MemCellStore::new(),
            partitions(n),
            "partitions",
        )
    }

    fn fill(local: &MemCellStore, ids: impl IntoIterator<Item = i64>) {
        for id in ids {
            local
                .put(id, (id % 7) as u16, format!("payload-{id}").into_bytes())
                .unwrap();
        }
    }

    fn decoded_image(store: &MemImageStore, partition: u32) -> Vec<cellstream::CellRecord> {
        let bytes = store
            .blob_store()
            .download_whole(&store.image_key(partition))
            .unwrap()
            .unwrap();
        CellReader::new(&bytes[..])
            .collect::<cellstream::Result<_>>()
            .unwrap()
    }

    /// Local store whose reads fail for one id.
    struct FlakyStore {
        inner: MemCellStore,
        broken: i64,
    }

    impl LocalCellStore for FlakyStore {
        fn enumerate(&self) -> cellstore::Result<Vec<(i64, u16)>> {
            self.inner.enumerate()
        }

        fn get(&self, id: i64) -> cellstore::Result<Option<StoredCell>> {
            if id == self.broken {
                return Err(CellStoreError::Backend("disk on fire".into()));
            }
            self.inner.get(id)
        }

        fn put(&self, id: i64, cell_type: u16, payload: Vec<u8>) -> cellstore::Result<()> {
            if id == self.broken {
                return Err(CellStoreError::Backend("read only".into()));
            }
            self.inner.put(id, cell_type, payload)
        }
    }

    // -------------------- Keys --------------------

    #[test]
    fn keys_follow_folder_layout() {
        let store = mem_store(1);
        assert_eq!(store.image_key(3), "partitions/3.image");
        assert_eq!(store.signature_key(3), "partitions/3.sig");

        let flat = PartitionedImageStore::new(
            MemBlobStore::new("images"),
            MemCellStore::new(),
            partitions(1),
            "",
        );
        assert_eq!(flat.image_key(0), "0.image");
    }

    // -------------------- Signatures --------------------

    #[test]
    fn signature_defaults_to_virgin() -> Result<()> {
        let store = mem_store(4);
        assert_eq!(store.load_partition_signature(2)?, PartitionSignature::virgin(2));
        Ok(())
    }

    #[test]
    fn signature_save_then_load() -> Result<()> {
        let store = mem_store(4);
        let sig = PartitionSignature::with_fingerprint(2, ContentFingerprint::new("cafe"));
        store.save_partition_signature(&sig)?;
        assert_eq!(store.load_partition_signature(2)?, sig);

        // Overwrite, not merge
        let virgin = PartitionSignature::virgin(2);
        store.save_partition_signature(&virgin)?;
        assert_eq!(store.load_partition_signature(2)?, virgin);

        // Other partitions unaffected
        assert!(store.load_partition_signature(1)?.is_virgin());
        Ok(())
    }

    #[test]
    fn malformed_signature_is_an_error() {
        let store = mem_store(1);
        store
            .blob_store()
            .insert_raw(store.signature_key(0), b"{{{".to_vec());
        match store.load_partition_signature(0) {
            Err(ImageStoreError::Signature { partition, .. }) => assert_eq!(partition, 0),
            other => panic!("expected signature error, got {other:?}"),
        }
    }

    // -------------------- Save --------------------

    #[test]
    fn save_creates_container_and_returns_fingerprint() -> Result<()> {
        let store = mem_store(1);
        fill(store.local_store(), 0..10);
        assert!(!store.blob_store().container_exists());

        let fp = store.save_image_partition(0)?;

        assert!(store.blob_store().container_exists());
        let bytes = store
            .blob_store()
            .download_whole(&store.image_key(0))?
            .unwrap();
        assert_eq!(fp, fingerprint_of(&bytes));
        Ok(())
    }

    #[test]
    fn save_filters_by_ownership() -> Result<()> {
        let store = mem_store(2);
        fill(store.local_store(), 0..50);

        store.save_image_partition(0)?;
        store.save_image_partition(1)?;

        let even: BTreeSet<i64> = decoded_image(&store, 0).iter().map(|c| c.id).collect();
        let odd: BTreeSet<i64> = decoded_image(&store, 1).iter().map(|c| c.id).collect();
        assert_eq!(even, (0..50).filter(|i| i % 2 == 0).collect());
        assert_eq!(odd, (0..50).filter(|i| i % 2 == 1).collect());
        Ok(())
    }

    #[test]
    fn save_writes_cells_sorted_by_id() -> Result<()> {
        let store = mem_store(1);
        fill(store.local_store(), [40, -3, 17, 0, 8]);
        store.save_image_partition(0)?;

        let ids: Vec<i64> = decoded_image(&store, 0).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![-3, 0, 8, 17, 40]);
        Ok(())
    }

    #[test]
    fn repeated_saves_are_byte_identical() -> Result<()> {
        let store = mem_store(3);
        fill(store.local_store(), 0..200);
        let first = store.save_image_partition(1)?;
        let second = store.save_image_partition(1)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn empty_partition_saves_zero_byte_image() -> Result<()> {
        let store = mem_store(4);
        fill(store.local_store(), [0, 4, 8]);

        let (fp, stats) = store.save_image_partition_with_stats(1)?;
        assert_eq!(stats, ImageStats::default());
        assert_eq!(fp, fingerprint_of(b""));
        assert_eq!(
            store.blob_store().download_whole(&store.image_key(1))?,
            Some(Vec::new())
        );
        Ok(())
    }

    #[test]
    fn save_reports_stats() -> Result<()> {
        let store = mem_store(1);
        store.local_store().put(1, 1, vec![0; 10])?;
        store.local_store().put(2, 1, vec![0; 5])?;
        let (_, stats) = store.save_image_partition_with_stats(0)?;
        assert_eq!(
            stats,
            ImageStats {
                cells: 2,
                payload_bytes: 15
            }
        );
        Ok(())
    }

    #[test]
    fn save_does_not_mutate_local_store() -> Result<()> {
        let store = mem_store(2);
        fill(store.local_store(), 0..20);
        let before = store.local_store().enumerate()?;
        store.save_image_partition(0)?;
        assert_eq!(store.local_store().enumerate()?, before);
        Ok(())
    }

    #[test]
    fn failed_save_keeps_previous_image() -> Result<()> {
        let local = FlakyStore {
            inner: MemCellStore::new(),
            broken: i64::MAX,
        };
        fill(&local.inner, 0..10);
        let store = PartitionedImageStore::new(
            MemBlobStore::new("images"),
            local,
            partitions(1),
            "partitions",
        );
        let good = store.save_image_partition(0)?;

        // Make a cell in the middle of the enumeration unreadable
        let (blobs, mut local, oracle) = store.into_parts();
        local.broken = 5;
        let store = PartitionedImageStore::new(blobs, local, oracle, "partitions");

        match store.save_image_partition(0) {
            Err(ImageStoreError::Local { cell, op, .. }) => {
                assert_eq!(cell, 5);
                assert_eq!(op, Operation::SaveImage);
            }
            other => panic!("expected local read failure, got {other:?}"),
        }
        assert_eq!(
            store.blob_store().content_fingerprint(&store.image_key(0))?,
            Some(good)
        );
        Ok(())
    }

    #[test]
    fn oversized_cell_aborts_save_without_touching_image() -> Result<()> {
        use cellstream::{CellSink, CellSource, CellStreamError};
        use std::io::{Read, Write};

        /// Codec that refuses payloads larger than 8 bytes.
        struct TinyCodec;
        struct TinySink<'a>(Box<dyn CellSink + 'a>);

        impl CellSink for TinySink<'_> {
            fn write_cell(&mut self, id: i64, cell_type: u16, payload: &[u8]) -> cellstream::Result<()> {
                if payload.len() > 8 {
                    return Err(CellStreamError::SizeOverflow {
                        len: payload.len() as u64,
                        max: 8,
                    });
                }
                self.0.write_cell(id, cell_type, payload)
            }

            fn finish(self: Box<Self>) -> cellstream::Result<()> {
                let TinySink(inner) = *self;
                inner.finish()
            }
        }

        impl CellCodec for TinyCodec {
            fn writer<'a>(&self, out: Box<dyn Write + 'a>) -> Box<dyn CellSink + 'a> {
                Box::new(TinySink(BinaryCellCodec.writer(out)))
            }

            fn reader<'a>(&self, input: Box<dyn Read + 'a>) -> Box<dyn CellSource + 'a> {
                BinaryCellCodec.reader(input)
            }
        }

        let store = mem_store(1).with_codec(TinyCodec);
        store.local_store().put(1, 0, b"short".to_vec())?;
        let good = store.save_image_partition(0)?;

        store.local_store().put(2, 0, b"far too long".to_vec())?;
        let err = store.save_image_partition(0).unwrap_err();
        assert!(matches!(
            err,
            ImageStoreError::Codec {
                source: CellStreamError::SizeOverflow { .. },
                ..
            }
        ));
        assert_eq!(
            store.blob_store().content_fingerprint(&store.image_key(0))?,
            Some(good)
        );
        Ok(())
    }

    // -------------------- Load --------------------

    #[test]
    fn load_missing_image_is_not_found() {
        let store = mem_store(1);
        let err = store.load_image_partition(0).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.partition(), 0);
    }

    #[test]
    fn load_empty_image_installs_nothing() -> Result<()> {
        let store = mem_store(1);
        store.blob_store().insert_raw(store.image_key(0), Vec::new());
        let (fp, stats) = store.load_image_partition_with_stats(0)?;
        assert_eq!(stats.cells, 0);
        assert_eq!(fp, fingerprint_of(b""));
        assert!(store.local_store().is_empty());
        Ok(())
    }

    #[test]
    fn load_overwrites_and_adds() -> Result<()> {
        let store = mem_store(1);
        let image = BinaryCellCodec.encode(&[
            CellRecord::new(5, 1, b"five v1".to_vec()),
            CellRecord::new(6, 2, b"six".to_vec()),
        ])?;
        store.blob_store().insert_raw(store.image_key(0), image.clone());

        let local = store.local_store();
        local.put(5, 0, b"five v0".to_vec())?;
        local.put(99, 3, b"bystander".to_vec())?;

        let fp = store.load_image_partition(0)?;
        assert_eq!(fp, fingerprint_of(&image));

        let five = local.get(5)?.unwrap();
        assert_eq!((five.cell_type, five.payload.as_slice()), (1, &b"five v1"[..]));
        let six = local.get(6)?.unwrap();
        assert_eq!((six.cell_type, six.payload.as_slice()), (2, &b"six"[..]));
        let other = local.get(99)?.unwrap();
        assert_eq!((other.cell_type, other.payload.as_slice()), (3, &b"bystander"[..]));
        assert_eq!(local.len(), 3);
        Ok(())
    }

    #[test]
    fn truncated_image_fails_and_keeps_prefix() -> Result<()> {
        let store = mem_store(1);
        let image = BinaryCellCodec.encode(&[
            CellRecord::new(1, 1, b"one".to_vec()),
            CellRecord::new(2, 1, b"two".to_vec()),
        ])?;
        store
            .blob_store()
            .insert_raw(store.image_key(0), image[..image.len() - 2].to_vec());

        let err = store.load_image_partition(0).unwrap_err();
        assert!(err.is_corrupt(), "unexpected error: {err}");
        // Partial installs are allowed to remain
        assert!(store.local_store().contains(1));
        assert!(!store.local_store().contains(2));
        Ok(())
    }

    #[test]
    fn local_write_failure_aborts_load() -> Result<()> {
        let store = PartitionedImageStore::new(
            MemBlobStore::new("images"),
            FlakyStore {
                inner: MemCellStore::new(),
                broken: 2,
            },
            partitions(1),
            "partitions",
        );
        let image = BinaryCellCodec.encode(&[
            CellRecord::new(1, 1, b"a".to_vec()),
            CellRecord::new(2, 1, b"b".to_vec()),
            CellRecord::new(3, 1, b"c".to_vec()),
        ])?;
        store.blob_store().insert_raw(store.image_key(0), image);

        match store.load_image_partition(0) {
            Err(ImageStoreError::Local { cell, op, .. }) => {
                assert_eq!(cell, 2);
                assert_eq!(op, Operation::LoadImage);
            }
            other => panic!("expected local write failure, got {other:?}"),
        }
        assert!(store.local_store().inner.contains(1));
        assert!(!store.local_store().inner.contains(3));
        Ok(())
    }

    #[test]
    fn inspect_does_not_install() -> Result<()> {
        let store = mem_store(1);
        fill(store.local_store(), 0..5);
        let saved = store.save_image_partition(0)?;
        store.local_store().clear();

        let mut seen = Vec::new();
        let (fp, stats) = store.inspect_image_partition(0, |c| seen.push(c.id))?;
        assert_eq!(fp, saved);
        assert_eq!(stats.cells, 5);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert!(store.local_store().is_empty());
        Ok(())
    }

    // -------------------- End to end --------------------

    #[test]
    fn save_then_load_into_empty_store() -> Result<()> {
        let dir = tempdir()?;
        let config = ImageStoreConfig::new(dir.path(), "images", "partitions");

        let source = PartitionedImageStore::from_config(&config, MemCellStore::new(), partitions(3));
        fill(source.local_store(), -30..30);
        source.local_store().put(3, 9, Vec::new())?;
        source.local_store().put(6, 9, vec![0xAB; 100_000])?;
        let saved = source.save_image_partition(0)?;

        let target = PartitionedImageStore::from_config(&config, MemCellStore::new(), partitions(3));
        let loaded = target.load_image_partition(0)?;
        assert_eq!(saved, loaded);

        let expected: Vec<(i64, StoredCell)> = source
            .local_store()
            .ids()
            .into_iter()
            .filter(|id| id.rem_euclid(3) == 0)
            .map(|id| (id, source.local_store().get(id).unwrap().unwrap()))
            .collect();
        let actual: Vec<(i64, StoredCell)> = target
            .local_store()
            .ids()
            .into_iter()
            .map(|id| (id, target.local_store().get(id).unwrap().unwrap()))
            .collect();
        assert_eq!(actual, expected);
        Ok(())
    }

    #[test]
    fn concurrent_saves_of_different_partitions() -> Result<()> {
        let store = mem_store(4);
        fill(store.local_store(), 0..400);

        let fingerprints: Vec<ContentFingerprint> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4u32)
                .map(|p| {
                    let store = &store;
                    s.spawn(move || store.save_image_partition(p))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect::<crate::Result<_>>()
        })?;

        for (p, fp) in fingerprints.iter().enumerate() {
            let ids: Vec<i64> = decoded_image(&store, p as u32).iter().map(|c| c.id).collect();
            assert_eq!(ids.len(), 100);
            assert!(ids.iter().all(|id| id.rem_euclid(4) == p as i64));
            assert_eq!(
                store.blob_store().content_fingerprint(&store.image_key(p as u32))?.as_ref(),
                Some(fp)
            );
        }
        Ok(())
    }

    #[test]
    fn blob_errors_carry_context() {
        let store = PartitionedImageStore::new(
            MemBlobStore::new("images"),
            MemCellStore::new(),
            partitions(1),
            "../escape",
        );
        match store.save_image_partition(0) {
            Err(ImageStoreError::Blob {
                partition,
                op,
                key,
                source: BlobStoreError::InvalidKey(_),
            }) => {
                assert_eq!(partition, 0);
                assert_eq!(op, Operation::SaveImage);
                assert_eq!(key, "../escape/0.image");
            }
            other => panic!("expected invalid key, got {other:?}"),
        }
    }
}
