use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const STATUS_UPLOADED: &str = "uploaded";

/// Sidecar written next to every stored data file. Field names are part of
/// the on-disk format shared with earlier deployments, so they keep their
/// original spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    #[serde(rename = "datasetId")]
    pub dataset_id: String,
    #[serde(rename = "originalFilename")]
    pub original_filename: String,
    #[serde(rename = "fileExtension")]
    pub file_extension: String,
    #[serde(rename = "storagePath")]
    pub storage_path: String,
    #[serde(rename = "fileSizeBytes")]
    pub file_size_bytes: u64,
    #[serde(rename = "datasetHash_sha256")]
    pub dataset_hash_sha256: String,
    pub status: String,
    #[serde(rename = "uploadedAt_utc")]
    pub uploaded_at_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_keys() {
        let manifest = DatasetManifest {
            dataset_id: "0b3c".to_string(),
            original_filename: "sales.csv".to_string(),
            file_extension: ".csv".to_string(),
            storage_path: "/tmp/x/data.csv".to_string(),
            file_size_bytes: 42,
            dataset_hash_sha256: "ab".repeat(32),
            status: STATUS_UPLOADED.to_string(),
            uploaded_at_utc: Utc::now(),
        };
        let json = serde_json::to_value(&manifest).unwrap();
        let object = json.as_object().unwrap();
        for key in [
            "datasetId",
            "originalFilename",
            "fileExtension",
            "storagePath",
            "fileSizeBytes",
            "datasetHash_sha256",
            "status",
            "uploadedAt_utc",
        ] {
            assert!(object.contains_key(key), "missing key {}", key);
        }
        assert_eq!(object.len(), 8);
    }
}
