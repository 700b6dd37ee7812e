//! Per-chunk embedding with dimension checks and L2 normalization.

use crate::{
    embedding::{EmbeddingClient, EmbeddingClientError},
    processing::types::{Embedding, EmbeddingError},
    retry::RetryPolicy,
};
use std::sync::Arc;

/// Wraps an embedding provider and enforces the deployment's vector contract.
#[derive(Clone)]
pub struct EmbeddingGenerator {
    client: Arc<dyn EmbeddingClient>,
    dimension: usize,
    retry: RetryPolicy,
}

impl EmbeddingGenerator {
    /// Build a generator expecting `dimension`-sized vectors from `client`.
    pub fn new(client: Arc<dyn EmbeddingClient>, dimension: usize, retry: RetryPolicy) -> Self {
        Self {
            client,
            dimension,
            retry,
        }
    }

    /// Configured embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Load the provider's model ahead of the first chunk.
    pub async fn warm_up(&self) -> Result<(), EmbeddingClientError> {
        self.client.warm_up().await
    }

    /// Embed one chunk of text, retrying transient provider failures.
    pub async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let raw = self
            .retry
            .run("embed", || self.client.generate_embedding(text))
            .await?;
        if raw.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: raw.len(),
            });
        }
        Embedding::normalized(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbeddingClient;
    use async_trait::async_trait;

    struct FixedClient(Vec<f32>);

    #[async_trait]
    impl EmbeddingClient for FixedClient {
        async fn generate_embedding(&self, _text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn embeddings_are_unit_length_with_fixed_dimension() {
        let generator =
            EmbeddingGenerator::new(Arc::new(HashEmbeddingClient::new(32)), 32, RetryPolicy::none());
        for text in ["short", "a somewhat longer chunk of text", "ünïcödé ✓"] {
            let embedding = generator.embed(text).await.expect("embedding");
            assert_eq!(embedding.dimension(), 32);
            assert!((embedding.norm() - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let generator =
            EmbeddingGenerator::new(Arc::new(HashEmbeddingClient::new(16)), 16, RetryPolicy::none());
        let first = generator.embed("same input").await.unwrap();
        let second = generator.embed("same input").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected() {
        let generator =
            EmbeddingGenerator::new(Arc::new(FixedClient(vec![1.0; 8])), 4, RetryPolicy::none());
        let error = generator.embed("text").await.unwrap_err();
        assert!(matches!(
            error,
            EmbeddingError::DimensionMismatch {
                expected: 4,
                actual: 8
            }
        ));
    }

    #[tokio::test]
    async fn zero_vector_is_rejected() {
        let generator =
            EmbeddingGenerator::new(Arc::new(FixedClient(vec![0.0; 4])), 4, RetryPolicy::none());
        assert!(matches!(
            generator.embed("text").await,
            Err(EmbeddingError::ZeroNorm)
        ));
    }
}
