//! Embedding providers.
//!
//! Providers return raw vectors; dimension checks and L2 normalization happen once, in
//! [`crate::processing::EmbeddingGenerator`], so every backend is held to the same contract.

mod ollama;

pub use ollama::OllamaEmbeddingClient;

use crate::config::{Config, EmbeddingProvider};
use crate::retry::{Transient, is_retryable_status};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider could not be reached.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider answered with a non-success status.
    #[error("Embedding provider returned {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, as reported by the provider.
        body: String,
    },
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// The model produces vectors of a different size than configured.
    #[error("Embedding model dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured for the deployment.
        expected: usize,
        /// Dimension produced by the model.
        actual: usize,
    },
    /// Client could not be constructed from configuration.
    #[error("Invalid embedding configuration: {0}")]
    InvalidConfiguration(String),
}

impl Transient for EmbeddingClientError {
    fn is_transient(&self) -> bool {
        match self {
            Self::ProviderUnavailable(_) => true,
            Self::Rejected { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for one chunk of text.
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError>;

    /// Load the model ahead of the first request. Safe to call repeatedly.
    async fn warm_up(&self) -> Result<(), EmbeddingClientError> {
        Ok(())
    }
}

/// Deterministic embedding client that hashes bytes into fixed buckets.
///
/// Useful offline and in tests; it carries no semantic signal beyond shared byte content.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbeddingClient {
    dimension: usize,
}

impl HashEmbeddingClient {
    /// Construct a client producing vectors of `dimension` components.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            // Basic hashing of content into the vector slot
            embedding[position] += f32::from(byte) / 255.0;
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        if text.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no text provided".to_string(),
            ));
        }
        Ok(Self::encode(text, self.dimension))
    }
}

/// Build the embedding client selected by configuration.
pub fn get_embedding_client(
    config: &Config,
) -> Result<Arc<dyn EmbeddingClient>, EmbeddingClientError> {
    tracing::info!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        dimension = config.embedding_dimension,
        "Initializing embedding client"
    );
    match config.embedding_provider {
        EmbeddingProvider::Hash => Ok(Arc::new(HashEmbeddingClient::new(
            config.embedding_dimension,
        ))),
        EmbeddingProvider::Ollama => Ok(Arc::new(OllamaEmbeddingClient::new(
            config.ollama_url.clone(),
            config.embedding_model.clone(),
            config.embedding_dimension,
        )?)),
    }
}
