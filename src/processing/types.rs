//! Core data types and error definitions for the ingestion pipeline.

use crate::{
    embedding::EmbeddingClientError,
    extraction::{ExtractionError, UnsupportedFormat},
    processing::chunking::Chunk,
    summarization::SummarizationClientError,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Errors produced while configuring or running the chunker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// A chunker was configured with a zero character budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for new text in every chunk.
    #[error("chunk overlap {overlap} must be smaller than chunk size {chunk_size}")]
    InvalidOverlap {
        /// Requested overlap in characters.
        overlap: usize,
        /// Requested chunk size in characters.
        chunk_size: usize,
    },
}

/// Which summarization call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryPass {
    /// The one-shot pass used for short documents.
    Single,
    /// The chunk-level pass over one summarizer chunk.
    Chunk {
        /// Position of the failing chunk.
        order_index: usize,
    },
    /// The final pass over the joined chunk summaries.
    Combine,
}

impl fmt::Display for SummaryPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::Chunk { order_index } => write!(f, "chunk {order_index}"),
            Self::Combine => f.write_str("combine"),
        }
    }
}

/// A summarization call failed after retries.
#[derive(Debug, Error)]
#[error("{pass} summarization pass failed: {source}")]
pub struct SummarizationError {
    /// Pass that produced the failure.
    pub pass: SummaryPass,
    /// Provider error reported for the final attempt.
    #[source]
    pub source: SummarizationClientError,
}

/// Errors produced while turning one chunk into a normalized embedding.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The provider failed to return a vector.
    #[error(transparent)]
    Provider(#[from] EmbeddingClientError),
    /// The provider returned a vector of the wrong length.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured for the deployment.
        expected: usize,
        /// Dimension returned by the provider.
        actual: usize,
    },
    /// The vector contained NaN or infinite components.
    #[error("Embedding contains non-finite values")]
    NonFinite,
    /// The vector cannot be normalized because every component is zero.
    #[error("Embedding has zero norm")]
    ZeroNorm,
}

/// An L2-normalized dense vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Scale `values` to unit length, rejecting vectors that cannot be normalized.
    pub fn normalized(mut values: Vec<f32>) -> Result<Self, EmbeddingError> {
        if values.iter().any(|value| !value.is_finite()) {
            return Err(EmbeddingError::NonFinite);
        }
        let norm = l2_norm(&values);
        if norm == 0.0 || !norm.is_finite() {
            return Err(EmbeddingError::ZeroNorm);
        }
        for value in &mut values {
            *value = (f64::from(*value) / norm) as f32;
        }
        Ok(Self(values))
    }

    /// Number of components.
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    /// Euclidean length of the vector; within rounding of 1.0.
    pub fn norm(&self) -> f64 {
        l2_norm(&self.0)
    }

    /// Borrow the components.
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Take ownership of the components.
    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

fn l2_norm(values: &[f32]) -> f64 {
    values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>()
        .sqrt()
}

/// A retrieval chunk paired with its embedding.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddedChunk {
    /// The chunk as produced by the splitter (renumbered if earlier chunks were skipped).
    #[serde(flatten)]
    pub chunk: Chunk,
    /// Hex SHA-256 of the chunk text, stable across re-ingestions of the same content.
    pub chunk_hash: String,
    /// Unit-length embedding of the chunk text.
    pub embedding: Embedding,
}

impl EmbeddedChunk {
    /// Pair `chunk` with its embedding and compute the content hash.
    pub fn new(chunk: Chunk, embedding: Embedding) -> Self {
        let chunk_hash = compute_chunk_hash(&chunk.text);
        Self {
            chunk,
            chunk_hash,
            embedding,
        }
    }
}

/// Everything derived from one document, handed to the caller for persistence.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    /// Correlation identifier shared with the ingestion's log events.
    pub ingestion_id: Uuid,
    /// Document summary; `None` when the document had no text.
    pub summary: Option<String>,
    /// Embedded retrieval chunks in gapless `order_index` order.
    pub chunks: Vec<EmbeddedChunk>,
    /// Retrieval chunks dropped because embedding failed under the skip policy.
    pub skipped_chunks: usize,
    /// Set when the summary was dropped or built from a subset of chunks.
    pub summary_degraded: bool,
    /// RFC 3339 completion timestamp.
    pub completed_at: String,
}

impl IngestionResult {
    /// Result for a document with no extractable text.
    pub fn empty(ingestion_id: Uuid) -> Self {
        Self {
            ingestion_id,
            summary: None,
            chunks: Vec::new(),
            skipped_chunks: 0,
            summary_degraded: false,
            completed_at: current_timestamp_rfc3339(),
        }
    }
}

/// Errors surfaced by [`crate::processing::IngestionService::ingest`].
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The declared type is not one of `pdf`, `docx`, `txt`.
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormat),
    /// The stored file could not be turned into text.
    #[error("Failed to extract text: {0}")]
    Extraction(#[source] ExtractionError),
    /// A summarization pass failed.
    #[error("Failed to summarize document: {0}")]
    Summarization(#[from] SummarizationError),
    /// A retrieval chunk could not be embedded.
    #[error("Failed to embed chunk {order_index}: {source}")]
    Embedding {
        /// Position of the failing retrieval chunk.
        order_index: usize,
        /// Underlying embedding failure.
        #[source]
        source: EmbeddingError,
    },
    /// The ingestion exceeded its wall-clock budget.
    #[error("Ingestion exceeded timeout of {0:?}")]
    Timeout(Duration),
}

impl From<ExtractionError> for IngestionError {
    fn from(error: ExtractionError) -> Self {
        match error {
            ExtractionError::Unsupported(format) => Self::UnsupportedFormat(format),
            other => Self::Extraction(other),
        }
    }
}

impl IngestionError {
    /// Stable tag used in logs and metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::Extraction(_) => "extraction_failure",
            Self::Summarization(_) => "summarization_failure",
            Self::Embedding { .. } => "embedding_failure",
            Self::Timeout(_) => "ingestion_timeout",
        }
    }

    /// Short message safe to show to the uploading user; never includes paths or provider output.
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => {
                "Unsupported file type. Please upload a PDF, DOCX, or TXT document."
            }
            Self::Extraction(_) => {
                "The document could not be read. It may be corrupt or password protected."
            }
            Self::Summarization(_) => "The summary could not be generated. Please try again later.",
            Self::Embedding { .. } => {
                "The document could not be indexed for search. Please try again later."
            }
            Self::Timeout(_) => "Processing took too long. Please try a smaller document.",
        }
    }
}

/// Errors raised while constructing an [`crate::processing::IngestionService`].
#[derive(Debug, Error)]
pub enum ServiceInitError {
    /// One of the chunker configurations was invalid.
    #[error("Invalid chunking configuration: {0}")]
    Chunking(#[from] ChunkingError),
    /// The summarization provider could not be constructed.
    #[error("Failed to initialize summarization provider: {0}")]
    Summarization(#[from] SummarizationClientError),
    /// The embedding provider could not be constructed.
    #[error("Failed to initialize embedding provider: {0}")]
    Embedding(#[from] EmbeddingClientError),
}

/// Hex-encoded SHA-256 digest of `text`.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
