use blobstore::ContentFingerprint;
use serde::{Deserialize, Serialize};

/// Per-partition change-detection record, stored as JSON next to the image.
///
/// ```json
/// {"PartitionId":3,"Fingerprint":"1c291ca3"}
/// ```
///
/// Unknown fields are ignored on load and a missing `Fingerprint` means the
/// partition was never saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PartitionSignature {
    pub partition_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<ContentFingerprint>,
}

impl PartitionSignature {
    /// Signature of a partition that has no saved image yet.
    pub fn virgin(partition_id: u32) -> Self {
        Self {
            partition_id,
            fingerprint: None,
        }
    }

    pub fn with_fingerprint(partition_id: u32, fingerprint: ContentFingerprint) -> Self {
        Self {
            partition_id,
            fingerprint: Some(fingerprint),
        }
    }

    pub fn is_virgin(&self) -> bool {
        self.fingerprint.is_none()
    }

    /// True if this signature records exactly `fingerprint`. A virgin
    /// signature matches nothing.
    pub fn matches(&self, fingerprint: &ContentFingerprint) -> bool {
        self.fingerprint.as_ref() == Some(fingerprint)
    }

    pub(crate) fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub(crate) fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
