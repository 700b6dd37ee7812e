use super::{EmbeddingClient, EmbeddingClientError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;

const WARM_UP_PROBE: &str = "warm-up probe";

/// Embedding client backed by a local Ollama runtime (`/api/embed`).
pub struct OllamaEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
    dimension: usize,
    warmed: OnceCell<()>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbeddingClient {
    /// Construct a client for `model` served at `base_url`, expecting `dimension`-sized vectors.
    pub fn new(
        base_url: String,
        model: String,
        dimension: usize,
    ) -> Result<Self, EmbeddingClientError> {
        let http = Client::builder()
            .user_agent("docuhelper/embed")
            .build()
            .map_err(|error| EmbeddingClientError::InvalidConfiguration(error.to_string()))?;
        Ok(Self {
            http,
            base_url,
            model,
            dimension,
            warmed: OnceCell::new(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url.trim_end_matches('/'))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        let response = self
            .http
            .post(self.endpoint())
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::Rejected { status, body });
        }

        let body: EmbedResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        body.embeddings.into_iter().next().ok_or_else(|| {
            EmbeddingClientError::InvalidResponse("Ollama returned no embeddings".into())
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        self.warm_up().await?;
        self.embed(text).await
    }

    async fn warm_up(&self) -> Result<(), EmbeddingClientError> {
        self.warmed
            .get_or_try_init(|| async {
                tracing::info!(model = %self.model, "Loading embedding model");
                let probe = self.embed(WARM_UP_PROBE).await?;
                if probe.len() != self.dimension {
                    return Err(EmbeddingClientError::DimensionMismatch {
                        expected: self.dimension,
                        actual: probe.len(),
                    });
                }
                tracing::info!(
                    model = %self.model,
                    dimension = self.dimension,
                    "Embedding model ready"
                );
                Ok(())
            })
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Transient;
    use httpmock::{Method::POST, MockServer};

    fn client(server: &MockServer, dimension: usize) -> OllamaEmbeddingClient {
        OllamaEmbeddingClient::new(server.base_url(), "all-minilm".into(), dimension)
            .expect("client")
    }

    #[tokio::test]
    async fn warms_up_once_then_embeds() {
        let server = MockServer::start_async().await;
        let probe = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/embed")
                    .json_body_partial(format!(r#"{{"input": "{WARM_UP_PROBE}"}}"#));
                then.status(200)
                    .json_body(json!({ "embeddings": [[0.0, 0.0, 1.0]] }));
            })
            .await;
        let embed = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/embed")
                    .json_body_partial(r#"{"model": "all-minilm", "input": "chunk text"}"#);
                then.status(200)
                    .json_body(json!({ "embeddings": [[0.5, 0.25, 0.125]] }));
            })
            .await;

        let client = client(&server, 3);
        for _ in 0..2 {
            let vector = client.generate_embedding("chunk text").await.expect("embedding");
            assert_eq!(vector, vec![0.5, 0.25, 0.125]);
        }
        probe.assert_hits_async(1).await;
        embed.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn warm_up_detects_dimension_mismatch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(json!({ "embeddings": [[1.0, 2.0]] }));
            })
            .await;

        let error = client(&server, 384).warm_up().await.expect_err("mismatch");
        assert!(matches!(
            error,
            EmbeddingClientError::DimensionMismatch {
                expected: 384,
                actual: 2
            }
        ));
        assert!(!error.is_transient());
    }

    #[tokio::test]
    async fn empty_embedding_list_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(json!({ "embeddings": [] }));
            })
            .await;

        let error = client(&server, 3).warm_up().await.expect_err("malformed");
        assert!(matches!(error, EmbeddingClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn throttling_is_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(429).body("slow down");
            })
            .await;

        let error = client(&server, 3)
            .generate_embedding("text")
            .await
            .expect_err("throttled");
        assert!(matches!(error, EmbeddingClientError::Rejected { status: 429, .. }));
        assert!(error.is_transient());
    }
}
