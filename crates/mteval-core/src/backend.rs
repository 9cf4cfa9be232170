use std::path::{Path, PathBuf};

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for PDF text extraction backends.
///
/// Implementors return the text of every page in page order. Layout analysis
/// is entirely the backend's business; the pipeline only sees a string.
pub trait PdfBackend: Send + Sync {
    /// Extract the full text content of a PDF file.
    fn extract_text(&self, path: &Path) -> Result<String, BackendError>;
}

/// `report.pdf` -> `report.txt`, in the same directory.
pub fn text_path_for(pdf: &Path) -> PathBuf {
    pdf.with_extension("txt")
}

/// Extract `pdf` with `backend` and write the NFC-normalized text to `out`.
///
/// A document that yields nothing but whitespace is an error: handing an
/// empty file to the aligner produces empty output that looks like success.
pub fn extract_to_text_file(
    backend: &dyn PdfBackend,
    pdf: &Path,
    out: &Path,
) -> Result<String, BackendError> {
    let raw = backend.extract_text(pdf)?;
    let text: String = raw.nfc().collect();
    if text.trim().is_empty() {
        return Err(BackendError::ExtractionError(format!(
            "no text extracted from {}",
            pdf.display()
        )));
    }
    std::fs::write(out, &text)?;
    tracing::debug!(pdf = %pdf.display(), out = %out.display(), chars = text.len(), "extracted text");
    Ok(text)
}
