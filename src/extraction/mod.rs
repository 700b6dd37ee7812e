//! Plain-text extraction from stored uploads.
//!
//! Extraction is all-or-nothing per file: either the whole document's text comes back, or an
//! [`ExtractionError`] describing why the file could not be read. An empty string is a valid
//! result and means the document simply had no text.

mod docx;
mod pdf;
mod txt;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub use docx::DocxError;

/// Document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word-processing document.
    Docx,
    /// Plain text, UTF-8 or Latin-1.
    Txt,
}

impl DocumentFormat {
    /// Lower-case tag used in declared types and file extensions.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
        }
    }

    /// Infer the format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self, UnsupportedFormat> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        extension.parse()
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentFormat {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "txt" => Ok(Self::Txt),
            _ => Err(UnsupportedFormat(s.to_string())),
        }
    }
}

/// Declared type outside the supported set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported document format '{0}'")]
pub struct UnsupportedFormat(pub String);

/// Errors raised while turning a stored file into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The declared type is not one of `pdf`, `docx`, `txt`.
    #[error(transparent)]
    Unsupported(#[from] UnsupportedFormat),
    /// The file could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File being extracted.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The PDF library rejected the document.
    #[error("failed to extract text from PDF {path}: {message}")]
    Pdf {
        /// File being extracted.
        path: PathBuf,
        /// Diagnostic reported by the PDF library.
        message: String,
    },
    /// The DOCX package or its XML was malformed.
    #[error("failed to extract text from DOCX {path}: {source}")]
    Docx {
        /// File being extracted.
        path: PathBuf,
        /// Archive or XML failure.
        #[source]
        source: DocxError,
    },
    /// The background extraction task panicked or was cancelled.
    #[error("extraction task did not complete: {0}")]
    Aborted(String),
}

/// Extract text from `path`, interpreting it according to the declared type string.
pub fn extract_text(path: &Path, declared_type: &str) -> Result<String, ExtractionError> {
    let format: DocumentFormat = declared_type.parse()?;
    extract(path, format)
}

/// Extract text from `path` using an already-parsed format.
pub fn extract(path: &Path, format: DocumentFormat) -> Result<String, ExtractionError> {
    tracing::debug!(path = %path.display(), %format, "Extracting text");
    let bytes = std::fs::read(path).map_err(|source| ExtractionError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let text = match format {
        DocumentFormat::Pdf => pdf::extract_pdf(&bytes).map_err(|message| ExtractionError::Pdf {
            path: path.to_path_buf(),
            message,
        })?,
        DocumentFormat::Docx => {
            docx::extract_docx(&bytes).map_err(|source| ExtractionError::Docx {
                path: path.to_path_buf(),
                source,
            })?
        }
        DocumentFormat::Txt => txt::decode_text(&bytes),
    };

    tracing::debug!(
        path = %path.display(),
        %format,
        bytes = bytes.len(),
        chars = text.chars().count(),
        "Extracted text"
    );
    Ok(text)
}
