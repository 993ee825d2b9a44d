//! Dataset Store
//!
//! Local file-system storage for uploaded datasets. Each dataset owns one
//! directory named after its UUID:
//!
//! ```text
//! <root>/<dataset-id>/data.<csv|xlsx>
//! <root>/<dataset-id>/manifest.json
//! ```
//!
//! Files are written once and never modified, so concurrent readers need no
//! coordination. An upload that does not complete removes its directory.

pub mod manifest;

pub use manifest::*;

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::types::{AppError, AppResult, DatasetError};

pub const ALLOWED_EXTENSIONS: [&str; 2] = [".csv", ".xlsx"];

#[derive(Debug, Clone)]
pub struct DatasetStore {
    root: PathBuf,
    max_upload_bytes: u64,
}

impl DatasetStore {
    /// Create the storage root if needed and resolve it to an absolute path.
    pub async fn open(root: impl AsRef<Path>, max_upload_bytes: u64) -> std::io::Result<Self> {
        fs::create_dir_all(root.as_ref()).await?;
        let root = fs::canonicalize(root.as_ref()).await?;
        info!(root = %root.display(), max_upload_bytes, "Dataset store initialized");
        Ok(Self {
            root,
            max_upload_bytes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    fn dataset_dir(&self, id: &Uuid) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Validate the filename and open a new dataset directory for streaming.
    pub async fn begin_upload(&self, original_filename: &str) -> AppResult<PendingUpload> {
        let extension = file_extension(original_filename);
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(AppError::UnsupportedMediaType(format!(
                "File type '{}' is not supported. Please upload a CSV or XLSX file.",
                extension
            )));
        }

        let dataset_id = Uuid::new_v4();
        let dir = self.dataset_dir(&dataset_id);
        fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("data{}", extension));

        let mut upload = PendingUpload {
            dataset_id,
            original_filename: original_filename.to_string(),
            extension,
            dir,
            path,
            file: None,
            hasher: Sha256::new(),
            written: 0,
            limit: self.max_upload_bytes,
            completed: false,
        };
        // On failure `upload` is dropped and removes the directory.
        upload.file = Some(fs::File::create(&upload.path).await?);
        Ok(upload)
    }

    /// Store an in-memory file in one go.
    pub async fn save_bytes(&self, original_filename: &str, bytes: &[u8]) -> AppResult<DatasetManifest> {
        let mut upload = self.begin_upload(original_filename).await?;
        upload.write_chunk(bytes).await?;
        upload.finish().await
    }

    async fn load_manifest(&self, id: &Uuid) -> Result<DatasetManifest, DatasetError> {
        let dataset_id = id.to_string();
        let manifest_path = self.dataset_dir(id).join(MANIFEST_FILE);

        let raw = match fs::read(&manifest_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DatasetError::NotFound(dataset_id));
            }
            Err(e) => return Err(DatasetError::Read(e.to_string())),
        };

        let manifest: DatasetManifest = serde_json::from_slice(&raw)
            .map_err(|e| DatasetError::Corrupt(dataset_id.clone(), format!("unreadable manifest: {}", e)))?;
        if manifest.dataset_id != dataset_id {
            return Err(DatasetError::Corrupt(
                dataset_id,
                "manifest belongs to another dataset".to_string(),
            ));
        }
        Ok(manifest)
    }

    /// Resolve a dataset id to its manifest, checking that the data file
    /// still agrees with it.
    pub async fn locate(&self, dataset_id: &str) -> Result<DatasetManifest, DatasetError> {
        let id = Uuid::parse_str(dataset_id)
            .map_err(|_| DatasetError::NotFound(dataset_id.to_string()))?;
        let manifest = self.load_manifest(&id).await?;

        if !ALLOWED_EXTENSIONS.contains(&manifest.file_extension.as_str()) {
            return Err(DatasetError::Unsupported(manifest.file_extension));
        }

        let expected_path = self
            .dataset_dir(&id)
            .join(format!("data{}", manifest.file_extension));
        if Path::new(&manifest.storage_path) != expected_path.as_path() {
            return Err(DatasetError::Corrupt(
                dataset_id.to_string(),
                "storage path does not match dataset directory".to_string(),
            ));
        }

        let metadata = match fs::metadata(&expected_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DatasetError::NotFound(dataset_id.to_string()));
            }
            Err(e) => return Err(DatasetError::Read(e.to_string())),
        };

        if metadata.len() != manifest.file_size_bytes {
            return Err(DatasetError::Corrupt(
                dataset_id.to_string(),
                format!(
                    "file size {} does not match manifest size {}",
                    metadata.len(),
                    manifest.file_size_bytes
                ),
            ));
        }

        Ok(manifest)
    }
}

/// A dataset being written. Dropping it before [`PendingUpload::finish`]
/// succeeds deletes the whole dataset directory.
pub struct PendingUpload {
    dataset_id: Uuid,
    original_filename: String,
    extension: String,
    dir: PathBuf,
    path: PathBuf,
    file: Option<fs::File>,
    hasher: Sha256,
    written: u64,
    limit: u64,
    completed: bool,
}

impl PendingUpload {
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Append a chunk. The size limit is checked before anything is written.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> AppResult<()> {
        let next = self.written + chunk.len() as u64;
        if next > self.limit {
            warn!(
                dataset_id = %self.dataset_id,
                limit = self.limit,
                "Upload exceeds size limit, aborting"
            );
            return Err(AppError::PayloadTooLarge(format!(
                "File size exceeds the limit of {:.2} MB",
                self.limit as f64 / 1024.0 / 1024.0
            )));
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| AppError::Internal("upload file is closed".to_string()))?;
        file.write_all(chunk).await?;
        self.hasher.update(chunk);
        self.written = next;
        Ok(())
    }

    /// Flush the data file and write the manifest.
    pub async fn finish(mut self) -> AppResult<DatasetManifest> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }

        let manifest = DatasetManifest {
            dataset_id: self.dataset_id.to_string(),
            original_filename: self.original_filename.clone(),
            file_extension: self.extension.clone(),
            storage_path: self.path.to_string_lossy().to_string(),
            file_size_bytes: self.written,
            dataset_hash_sha256: hex::encode(self.hasher.clone().finalize()),
            status: STATUS_UPLOADED.to_string(),
            uploaded_at_utc: Utc::now(),
        };

        let body = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| AppError::Internal(format!("Could not encode manifest: {}", e)))?;
        fs::write(self.dir.join(MANIFEST_FILE), body).await?;
        self.completed = true;

        info!(
            dataset_id = %manifest.dataset_id,
            size = manifest.file_size_bytes,
            "Dataset stored"
        );
        Ok(manifest)
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        self.file.take();
        // Synchronous so the directory is gone once the upload is dropped.
        // It holds at most one partial data file.
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => info!(dataset_id = %self.dataset_id, "Removed incomplete upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(dataset_id = %self.dataset_id, error = %e, "Failed to clean up incomplete upload"),
        }
    }
}

/// Lower-cased extension including the dot, or an empty string.
pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}
