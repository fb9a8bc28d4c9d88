//! Text extraction from uploaded or on-disk resume documents (.pdf, .docx, .txt).
//!
//! All functions here are blocking; async callers go through `spawn_blocking`.

use std::path::{Path, PathBuf};

use thiserror::Error;

mod docx;

pub use docx::extract_docx_text;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Format from a file name's extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" => Some(Self::PlainText),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }
}

/// Extracts text from raw document bytes.
pub fn extract_text(format: DocumentFormat, bytes: &[u8]) -> Result<String, DocumentError> {
    match format {
        DocumentFormat::PlainText => Ok(String::from_utf8_lossy(bytes).into_owned()),
        DocumentFormat::Pdf => extract_pdf_text(bytes),
        DocumentFormat::Docx => extract_docx_text(bytes),
    }
}

/// Extracts text from a file, choosing the format by extension.
pub fn extract_text_from_path(path: &Path) -> Result<String, DocumentError> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let format = DocumentFormat::from_filename(name)
        .ok_or_else(|| DocumentError::UnsupportedFormat(name.to_string()))?;
    let bytes = std::fs::read(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    extract_text(format, &bytes)
}

/// Lists the supported documents directly inside `dir`, sorted by file name.
pub fn list_documents(dir: &Path) -> Result<Vec<PathBuf>, DocumentError> {
    let io_error = |source| DocumentError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        let supported = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(DocumentFormat::from_filename)
            .is_some();
        if path.is_file() && supported {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String, DocumentError> {
    // pdf-extract panics on some malformed inputs
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(DocumentError::Pdf(e.to_string())),
        Err(_) => Err(DocumentError::Pdf("parser panicked on malformed PDF".to_string())),
    }
}
