use std::path::PathBuf;

use blobstore::FsBlobStore;
use envconfig::Envconfig;

/// Where images and signatures live.
///
/// Read from `CELLIMG_ROOT`, `CELLIMG_CONTAINER` and `CELLIMG_FOLDER`.
#[derive(Debug, Clone, Envconfig)]
pub struct ImageStoreConfig {
    /// Directory that holds one subdirectory per container.
    #[envconfig(from = "CELLIMG_ROOT", default = "./data")]
    pub root: PathBuf,
    #[envconfig(from = "CELLIMG_CONTAINER", default = "images")]
    pub container: String,
    /// Key prefix for `{folder}/{partition}.image` and `{folder}/{partition}.sig`.
    #[envconfig(from = "CELLIMG_FOLDER", default = "partitions")]
    pub folder: String,
}

impl ImageStoreConfig {
    pub fn new(root: impl Into<PathBuf>, container: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            container: container.into(),
            folder: folder.into(),
        }
    }

    pub fn from_env() -> Result<Self, envconfig::Error> {
        Self::init_from_env()
    }

    pub fn blob_store(&self) -> FsBlobStore {
        FsBlobStore::new(&self.root, self.container.clone())
    }
}
