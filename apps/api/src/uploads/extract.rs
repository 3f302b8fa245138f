//! Text extraction for uploaded documents (PDF, DOCX, plain text).

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No file uploaded")]
    MissingFilename,

    #[error("File type {0} not allowed. Supported: .pdf, .docx, .txt")]
    UnsupportedType(String),

    #[error("Failed to extract text: {0}")]
    Failed(String),
}

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
}

impl DocumentKind {
    /// Classifies a file by its (case-insensitive) extension.
    pub fn from_filename(filename: &str) -> Result<Self, ExtractError> {
        if filename.trim().is_empty() {
            return Err(ExtractError::MissingFilename);
        }
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "docx" => Ok(DocumentKind::Docx),
            "txt" => Ok(DocumentKind::Text),
            "" => Err(ExtractError::UnsupportedType("(none)".to_string())),
            other => Err(ExtractError::UnsupportedType(format!(".{other}"))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::Text => "txt",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentKind::Text => "text/plain",
        }
    }
}

/// Extracts trimmed text from raw file bytes. CPU-bound; call from a blocking task.
pub fn extract_text(kind: DocumentKind, data: &[u8]) -> Result<String, ExtractError> {
    let text = match kind {
        // pdf-extract panics on some malformed inputs instead of returning an error.
        DocumentKind::Pdf => std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(data))
            .map_err(|_| ExtractError::Failed("PDF parsing error: malformed document".into()))?
            .map_err(|e| ExtractError::Failed(format!("PDF parsing error: {e}")))?,
        DocumentKind::Docx => extract_docx(data)?,
        DocumentKind::Text => String::from_utf8(data.to_vec())
            .map_err(|e| ExtractError::Failed(format!("File is not valid UTF-8: {e}")))?,
    };
    Ok(text.trim().to_string())
}

/// One line per paragraph, runs concatenated.
fn extract_docx(data: &[u8]) -> Result<String, ExtractError> {
    let docx = docx_rs::read_docx(data)
        .map_err(|e| ExtractError::Failed(format!("DOCX parsing error: {e}")))?;

    let mut text = String::new();
    for child in docx.document.children {
        if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
            for run in paragraph.children {
                if let docx_rs::ParagraphChild::Run(run) = run {
                    for run_child in run.children {
                        if let docx_rs::RunChild::Text(t) = run_child {
                            text.push_str(&t.text);
                        }
                    }
                }
            }
            text.push('\n');
        }
    }
    Ok(text)
}

/// First `max_chars` characters of `text`, with `...` appended when truncated.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
