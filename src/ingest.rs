//! Document ingestion: file-type validation and text extraction.
//!
//! Every accepted format goes through the same UTF-8 decode path. PDF and DOCX bodies are not
//! parsed; their bytes are decoded as text on a best-effort basis, exactly as a browser
//! `FileReader.readAsText` would. Extraction accuracy for binary formats is therefore limited.

use crate::cancel::CancelSignal;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MIME_PDF: &str = "application/pdf";
const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const MIME_TEXT: &str = "text/plain";

/// Errors raised while validating or extracting a submitted document.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Declared type is outside the pdf/docx/plain-text allow-list.
    #[error("unsupported file type '{mime_type}' for {filename}")]
    InvalidFileType {
        /// Name of the rejected file.
        filename: String,
        /// MIME type that failed validation (may be empty when undeclared).
        mime_type: String,
    },
    /// Document decoded to empty or whitespace-only text.
    #[error("no textual content could be extracted from {0}")]
    EmptyContent(String),
    /// Reading the document from disk failed.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The caller cancelled ingestion before the read completed.
    #[error("document ingestion cancelled")]
    Cancelled,
}

/// Document formats accepted by the ingestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word-processing document.
    Docx,
    /// Plain text.
    PlainText,
}

impl DocumentKind {
    /// Resolve a MIME type against the allow-list. Parameters and case are ignored.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            MIME_PDF => Some(Self::Pdf),
            MIME_DOCX => Some(Self::Docx),
            MIME_TEXT => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Canonical MIME type for this kind.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => MIME_PDF,
            Self::Docx => MIME_DOCX,
            Self::PlainText => MIME_TEXT,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::PlainText => "text",
        };
        f.write_str(label)
    }
}

/// A file submitted by the user, held in memory until its text is extracted.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// Raw file contents.
    pub bytes: Vec<u8>,
    /// MIME type declared by the uploader; may be empty.
    pub declared_mime_type: String,
    /// Original file name.
    pub filename: String,
}

impl UploadedDocument {
    /// Construct a document from raw parts.
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        declared_mime_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            declared_mime_type: declared_mime_type.into(),
            filename: filename.into(),
        }
    }

    /// Resolve the document kind from the declared MIME type, falling back to the filename
    /// extension when nothing was declared.
    pub fn kind(&self) -> Option<DocumentKind> {
        if !self.declared_mime_type.trim().is_empty() {
            return DocumentKind::from_mime(&self.declared_mime_type);
        }
        mime_guess::from_path(&self.filename)
            .iter()
            .find_map(|guess| DocumentKind::from_mime(guess.essence_str()))
    }
}

/// Non-empty text extracted from a document.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    text: String,
    kind: DocumentKind,
}

impl ExtractedContent {
    /// Wrap already-extracted text, refusing empty or whitespace-only input.
    pub fn new(text: impl Into<String>, kind: DocumentKind) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self { text, kind })
        }
    }

    /// Extracted text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Kind of the document the text came from.
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Length of the extracted text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the text is empty; never true for a constructed value.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Short SHA-256 fingerprint used to correlate log lines without logging the text itself.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.text.as_bytes());
        hex::encode(&digest[..8])
    }
}

// Document text is personal data; keep it out of debug output.
impl fmt::Debug for ExtractedContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractedContent")
            .field("kind", &self.kind)
            .field("len", &self.text.len())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Validate a document's type and extract its text.
pub fn ingest(document: UploadedDocument) -> Result<ExtractedContent, IngestError> {
    let Some(kind) = document.kind() else {
        tracing::warn!(
            filename = %document.filename,
            mime_type = %document.declared_mime_type,
            "Rejected document with unsupported type"
        );
        return Err(IngestError::InvalidFileType {
            filename: document.filename,
            mime_type: document.declared_mime_type,
        });
    };

    let UploadedDocument { bytes, filename, .. } = document;
    let text = decode_text(&bytes);
    let content = ExtractedContent::new(text, kind)
        .ok_or_else(|| IngestError::EmptyContent(filename.clone()))?;

    tracing::debug!(
        filename = %filename,
        kind = %kind,
        bytes = bytes.len(),
        text_len = content.len(),
        fingerprint = %content.fingerprint(),
        "Extracted document text"
    );
    Ok(content)
}

/// Read a document from disk, abandoning the read if `cancel` fires first.
///
/// `declared_mime_type` may be empty, in which case [`ingest`] falls back to the extension.
pub async fn load_document(
    path: &Path,
    declared_mime_type: &str,
    cancel: &CancelSignal,
) -> Result<UploadedDocument, IngestError> {
    if cancel.is_cancelled() {
        return Err(IngestError::Cancelled);
    }

    let bytes = tokio::select! {
        read = tokio::fs::read(path) => read.map_err(|source| IngestError::Read {
            path: path.to_path_buf(),
            source,
        })?,
        _ = cancel.cancelled() => return Err(IngestError::Cancelled),
    };

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(UploadedDocument::new(bytes, declared_mime_type, filename))
}

/// Lossy UTF-8 decode with a leading byte-order mark removed.
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
