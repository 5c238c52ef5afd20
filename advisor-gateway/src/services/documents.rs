//! Text extraction for uploaded documents.

use quick_xml::events::Event;
use quick_xml::Reader;
use service_core::error::AppError;
use std::io::{Cursor, Read};
use std::path::Path;
use thiserror::Error;
use zip::ZipArchive;

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Main body part of a Word document.
const DOCX_BODY: &str = "word/document.xml";

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Unsupported document type '{0}'. Supported types: txt, pdf, docx")]
    UnsupportedType(String),

    #[error("Document is not valid UTF-8 text")]
    InvalidEncoding,

    #[error("Document appears to be empty or no text could be extracted")]
    Empty,

    #[error("Document exceeds the {} byte limit", MAX_UPLOAD_BYTES)]
    TooLarge,

    #[error("Failed to read PDF: {0}")]
    Pdf(String),

    #[error("Failed to read DOCX: {0}")]
    Docx(String),
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        AppError::BadRequest(anyhow::anyhow!(err))
    }
}

/// Resolve the document type from an explicit hint or the file name.
pub fn resolve_type(hint: Option<&str>, file_name: Option<&str>) -> String {
    hint.map(str::to_string)
        .filter(|h| !h.trim().is_empty())
        .or_else(|| {
            file_name
                .and_then(|n| Path::new(n).extension())
                .and_then(|ext| ext.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "txt".to_string())
        .trim()
        .trim_start_matches('.')
        .to_ascii_lowercase()
}

/// Extract the text of a document of the given type.
///
/// The text is returned as decoded, without trimming. Parsing is CPU bound;
/// async callers should run it on the blocking pool.
pub fn parse_document(bytes: &[u8], file_type: &str) -> Result<String, DocumentError> {
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(DocumentError::TooLarge);
    }

    let text = match file_type {
        "txt" | "text" => plain_text(bytes)?,
        "pdf" => pdf_text(bytes)?,
        "docx" => docx_text(bytes)?,
        other => return Err(DocumentError::UnsupportedType(other.to_string())),
    };

    if text.trim().is_empty() {
        return Err(DocumentError::Empty);
    }
    Ok(text)
}

fn plain_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    std::str::from_utf8(body)
        .map(str::to_string)
        .map_err(|_| DocumentError::InvalidEncoding)
}

/// Page texts joined by newlines. Pages without text are skipped.
fn pdf_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let document =
        lopdf::Document::load_mem(bytes).map_err(|e| DocumentError::Pdf(e.to_string()))?;

    let mut pages = Vec::new();
    for number in document.get_pages().into_keys() {
        match document.extract_text(&[number]) {
            Ok(text) if !text.trim().is_empty() => {
                pages.push(text.trim_end_matches('\n').to_string())
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(page = number, error = %e, "Skipping unreadable PDF page"),
        }
    }

    if pages.is_empty() {
        return Err(DocumentError::Pdf(
            "no text could be extracted; the file may be image-based or corrupted".to_string(),
        ));
    }
    Ok(pages.join("\n"))
}

fn docx_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| DocumentError::Docx(e.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|e| DocumentError::Docx(format!("{}: {}", DOCX_BODY, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| DocumentError::Docx(e.to_string()))?;

    document_xml_text(&xml)
}

/// Non-blank paragraph texts of a WordprocessingML body, joined by newlines.
fn document_xml_text(xml: &str) -> Result<String, DocumentError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // tab stops inside paragraph properties are layout, not text
    let mut in_properties = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| DocumentError::Docx(e.to_string()))?;

        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"w:t" => in_text = true,
                b"w:pPr" => in_properties = true,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:pPr" => in_properties = false,
                b"w:p" => {
                    let paragraph = std::mem::take(&mut current);
                    if !paragraph.trim().is_empty() {
                        paragraphs.push(paragraph);
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" if !in_properties => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t.unescape().map_err(|e| DocumentError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}
