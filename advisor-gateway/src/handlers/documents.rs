use crate::dtos::{DocumentUploadParams, DocumentUploadResponse};
use crate::services::documents::{parse_document, resolve_type};
use axum::{
    extract::{Multipart, Query},
    Json,
};
use service_core::error::AppError;

/// Extract the text of an uploaded document.
///
/// POST /upload-document
#[tracing::instrument(skip_all, fields(document_type = ?params.document_type))]
pub async fn upload_document(
    Query(params): Query<DocumentUploadParams>,
    mut multipart: Multipart,
) -> Result<Json<DocumentUploadResponse>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e))
        })?;

        let file_type = resolve_type(params.document_type.as_deref(), file_name.as_deref());
        let size = data.len();
        let parse_type = file_type.clone();
        let text = tokio::task::spawn_blocking(move || parse_document(&data, &parse_type))
            .await
            .map_err(|e| {
                AppError::InternalError(anyhow::anyhow!("Document parser task failed: {}", e))
            })??;
        let character_count = text.chars().count();

        tracing::info!(
            file_name = file_name.as_deref().unwrap_or("unnamed"),
            file_type = %file_type,
            size,
            character_count,
            "Document text extracted"
        );

        return Ok(Json(DocumentUploadResponse {
            success: true,
            message: format!("Successfully parsed {} document", file_type.to_uppercase()),
            extracted_text: text,
            character_count,
        }));
    }

    Err(AppError::BadRequest(anyhow::anyhow!(
        "No file uploaded; expected a multipart field named 'file'"
    )))
}
