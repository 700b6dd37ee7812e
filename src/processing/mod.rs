//! Document ingestion pipeline: chunking, summarization, embedding, and orchestration.

pub mod chunking;
mod embed;
mod service;
mod summarize;
pub mod types;

pub use chunking::{Chunk, ChunkingConfig, normalize_whitespace, split, split_text};
pub use embed::EmbeddingGenerator;
pub use service::{IngestionApi, IngestionService, IngestionSettings};
pub use summarize::{LengthBounds, Summarizer, SummarizerSettings, SummaryReport};
pub use types::{
    ChunkingError, EmbeddedChunk, Embedding, EmbeddingError, IngestionError, IngestionResult,
    ServiceInitError, SummarizationError, SummaryPass, compute_chunk_hash,
};
