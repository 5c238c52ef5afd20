use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct DocumentUploadParams {
    /// `txt`, `text`, `pdf` or `docx`; falls back to the file extension.
    pub document_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentUploadResponse {
    pub success: bool,
    pub message: String,
    pub extracted_text: String,
    pub character_count: usize,
}
