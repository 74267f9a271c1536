use crate::api::models::*;
use crate::review::ReviewExtractor;
use crate::storage::RECENT_LIMIT;
use axum::{
    extract::{Multipart, State},
    Json,
};
use tracing::info;

/// Multipart field carrying uploaded files
const FILES_FIELD: &str = "files";

struct Upload {
    filename: String,
    content: Vec<u8>,
}

async fn read_uploads(multipart: &mut Multipart) -> Result<Vec<Upload>, AppError> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("unknown").to_string();
        let content = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read {}: {}", filename, e)))?;

        uploads.push(Upload {
            filename,
            content: content.to_vec(),
        });
    }

    Ok(uploads)
}

/// Review every uploaded file, one after another, and store each result.
pub async fn review_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ReviewsResponse>, AppError> {
    let uploads = read_uploads(&mut multipart).await?;
    if uploads.is_empty() {
        return Err(AppError::BadRequest(format!(
            "No files uploaded in field '{}'",
            FILES_FIELD
        )));
    }

    // Reject the whole batch before any review is made if one file is not text
    for upload in &uploads {
        ReviewExtractor::decode(&upload.filename, &upload.content)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
    }

    info!(files = uploads.len(), "Processing review request");

    let mut reviews = Vec::with_capacity(uploads.len());
    for Upload { filename, content } in uploads {
        info!(filename = %filename, "Processing file");
        let fields = state
            .extractor
            .extract(&filename, &content)
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let store = state.store.clone();
        let record = tokio::task::spawn_blocking(move || store.append(&filename, fields))
            .await
            .map_err(|e| AppError::Internal(format!("Store task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Error processing files: {}", e)))?;

        info!(id = %record.id, filename = %record.filename, "Review stored");
        reviews.push(record);
    }

    Ok(Json(ReviewsResponse { reviews }))
}

/// Most recent reviews, newest first
pub async fn list_reviews_handler(
    State(state): State<AppState>,
) -> Result<Json<ReviewsResponse>, AppError> {
    let store = state.store.clone();
    let reviews = tokio::task::spawn_blocking(move || store.recent(RECENT_LIMIT))
        .await
        .map_err(|e| AppError::Internal(format!("Store task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Failed to load reviews: {}", e)))?;

    Ok(Json(ReviewsResponse { reviews }))
}
