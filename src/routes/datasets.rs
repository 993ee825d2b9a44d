use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::info;

use crate::models::{AppState, UploadResponse};
use crate::types::{AppError, AppResult};

pub const FILE_FIELD: &str = "file";

// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = state.store.max_upload_bytes().saturating_add(MULTIPART_OVERHEAD);
    Router::new()
        .route("/api/datasets/upload", post(upload_dataset))
        .layer(DefaultBodyLimit::max(usize::try_from(body_limit).unwrap_or(usize::MAX)))
        .with_state(state)
}

/// Stream the `file` field to the dataset store chunk by chunk.
async fn upload_dataset(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let mut multipart = multipart.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let limit = state.store.max_upload_bytes();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| AppError::InvalidRequest("No filename provided.".to_string()))?;
        info!(filename = %filename, "Dataset upload started");

        let mut upload = state.store.begin_upload(&filename).await?;
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
            upload.write_chunk(&chunk).await?;
        }
        let manifest = upload.finish().await?;

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                dataset_id: manifest.dataset_id,
                filename: manifest.original_filename,
            }),
        ));
    }

    Err(AppError::InvalidRequest(format!(
        "Missing multipart field '{}'.",
        FILE_FIELD
    )))
}

fn multipart_error(err: MultipartError, limit: u64) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!(
            "File size exceeds the limit of {:.2} MB",
            limit as f64 / 1024.0 / 1024.0
        ))
    } else {
        AppError::InvalidRequest(err.body_text())
    }
}
