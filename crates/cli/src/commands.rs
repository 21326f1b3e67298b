use std::io::Write;

use anyhow::{Context, Result};
use blobstore::FsBlobStore;
use cellstore::{MemCellStore, ModuloPartitioner};
use imagestore::{ImageStoreConfig, PartitionStatus, PartitionedImageStore};

/// Read-only view of the store: nothing is ever installed locally, so the
/// local store stays empty and the oracle is irrelevant.
pub type OfflineStore = PartitionedImageStore<FsBlobStore, MemCellStore, ModuloPartitioner>;

pub fn open_store(config: &ImageStoreConfig) -> OfflineStore {
    PartitionedImageStore::from_config(config, MemCellStore::new(), ModuloPartitioner::single())
}

/// One line per cell, then totals and the image fingerprint.
pub fn inspect<W: Write>(store: &OfflineStore, partition: u32, summary: bool, out: &mut W) -> Result<()> {
    let mut write_err = None;
    let (fingerprint, stats) = store
        .inspect_image_partition(partition, |cell| {
            if summary || write_err.is_some() {
                return;
            }
            if let Err(e) = writeln!(
                out,
                "{:>20}  type={:<5}  len={}",
                cell.id,
                cell.cell_type,
                cell.payload.len()
            ) {
                write_err = Some(e);
            }
        })
        .with_context(|| format!("inspecting partition {partition}"))?;
    if let Some(e) = write_err {
        return Err(e.into());
    }

    writeln!(
        out,
        "partition {partition}: {} cells, {} payload bytes, fingerprint {fingerprint}",
        stats.cells, stats.payload_bytes
    )?;
    Ok(())
}

pub fn signature<W: Write>(store: &OfflineStore, partition: u32, out: &mut W) -> Result<()> {
    let sig = store
        .load_partition_signature(partition)
        .with_context(|| format!("loading signature of partition {partition}"))?;
    serde_json::to_writer_pretty(&mut *out, &sig)?;
    writeln!(out)?;
    Ok(())
}

pub fn status<W: Write>(store: &OfflineStore, partition: u32, out: &mut W) -> Result<()> {
    let status = store
        .partition_status(partition)
        .with_context(|| format!("checking partition {partition}"))?;
    match status {
        PartitionStatus::NoImage { .. } => writeln!(out, "partition {partition}: no-image")?,
        PartitionStatus::UpToDate { remote, .. } => {
            writeln!(out, "partition {partition}: up-to-date ({remote})")?
        }
        PartitionStatus::Stale { signature, remote } => writeln!(
            out,
            "partition {partition}: stale (signature {}, image {remote})",
            signature
                .fingerprint
                .map(|f| f.to_string())
                .unwrap_or_else(|| "none".to_string())
        )?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobstore::BlobStore;
    use cellstore::LocalCellStore;
    use tempfile::tempdir;

    fn output(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> Result<String> {
        let mut buf = Vec::new();
        f(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    fn seeded(config: &ImageStoreConfig) -> Result<()> {
        let writer = open_store(config);
        writer.local_store().put(7, 2, b"seven".to_vec())?;
        writer.local_store().put(-1, 1, Vec::new())?;
        writer.checkpoint_partition(0)?;
        Ok(())
    }

    #[test]
    fn inspect_lists_cells() -> Result<()> {
        let dir = tempdir()?;
        let config = ImageStoreConfig::new(dir.path(), "images", "partitions");
        seeded(&config)?;

        let store = open_store(&config);
        let text = output(|out| inspect(&store, 0, false, out))?;
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].trim_start().starts_with("-1"));
        assert!(lines[1].contains("type=2") && lines[1].contains("len=5"));
        assert!(lines[2].starts_with("partition 0: 2 cells, 5 payload bytes"));

        let summary = output(|out| inspect(&store, 0, true, out))?;
        assert_eq!(summary.lines().count(), 1);
        Ok(())
    }

    #[test]
    fn inspect_missing_image_fails() -> Result<()> {
        let dir = tempdir()?;
        let store = open_store(&ImageStoreConfig::new(dir.path(), "images", "partitions"));
        assert!(output(|out| inspect(&store, 3, false, out)).is_err());
        Ok(())
    }

    #[test]
    fn signature_prints_json() -> Result<()> {
        let dir = tempdir()?;
        let config = ImageStoreConfig::new(dir.path(), "images", "partitions");
        let store = open_store(&config);

        let virgin = output(|out| signature(&store, 4, out))?;
        let value: serde_json::Value = serde_json::from_str(&virgin)?;
        assert_eq!(value, serde_json::json!({ "PartitionId": 4 }));

        seeded(&config)?;
        let signed = output(|out| signature(&store, 0, out))?;
        let value: serde_json::Value = serde_json::from_str(&signed)?;
        assert!(value["Fingerprint"].is_string());
        Ok(())
    }

    #[test]
    fn status_tracks_image_changes() -> Result<()> {
        let dir = tempdir()?;
        let config = ImageStoreConfig::new(dir.path(), "images", "partitions");
        let store = open_store(&config);

        assert_eq!(output(|out| status(&store, 0, out))?, "partition 0: no-image\n");

        seeded(&config)?;
        assert!(output(|out| status(&store, 0, out))?.contains("up-to-date"));

        store
            .blob_store()
            .upload_whole(&store.image_key(0), b"")?;
        assert!(output(|out| status(&store, 0, out))?.contains("stale"));
        Ok(())
    }
}
