//! Document upload endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{FileType, UploadResponse};

/// POST /upload - Store a document and start indexing it in the background
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        Error::Internal(format!("Failed to read multipart field: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        if name != "file" && !name.is_empty() {
            tracing::debug!("Skipping multipart field {}", name);
            continue;
        }

        let file_type = FileType::from_path(&filename).ok_or_else(|| {
            Error::UnsupportedFileType(format!("{} (allowed: .pdf, .txt, .md)", filename))
        })?;

        let data = field.bytes().await.map_err(|e| {
            Error::Internal(format!("Failed to read file {}: {}", filename, e))
        })?;

        let file_id = Uuid::new_v4().to_string();
        let path = state
            .config()
            .storage
            .uploads_dir
            .join(format!("{}.{}", file_id, file_type.extension()));
        tokio::fs::write(&path, &data).await?;

        tracing::info!(
            "Stored upload {} ({} bytes) as {}",
            filename,
            data.len(),
            path.display()
        );

        state
            .pipeline()
            .spawn(file_id.clone(), path, filename.clone());

        return Ok(Json(UploadResponse {
            job_id: file_id.clone(),
            file_id,
            message: format!("Processing {} in the background", filename),
        }));
    }

    Err(Error::ingestion("No file provided"))
}
