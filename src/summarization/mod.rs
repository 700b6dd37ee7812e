//! Summarization providers.
//!
//! The pipeline talks to providers through [`SummarizationClient`] so that the hierarchical
//! strategy in [`crate::processing::Summarizer`] is independent of the model backend. The
//! default extractive provider runs in-process; the Ollama-backed client issues HTTP requests
//! directly to a local runtime with greedy decoding so identical inputs produce identical
//! summaries.

mod extractive;

pub use extractive::ExtractiveSummarizer;

use crate::config::{Config, SummarizationProvider};
use crate::retry::{Transient, is_retryable_status};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Errors surfaced while generating a summary.
#[derive(Debug, Error)]
pub enum SummarizationClientError {
    /// Provider could not be reached.
    #[error("Summarization provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider answered with a non-success status.
    #[error("Summarization provider returned {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, as reported by the provider.
        body: String,
    },
    /// Provider ran but produced no usable summary.
    #[error("Failed to generate summary: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// Caller supplied input the provider cannot summarize.
    #[error("Invalid summarization input: {0}")]
    InvalidInput(String),
    /// Client could not be constructed from configuration.
    #[error("Invalid summarization configuration: {0}")]
    InvalidConfiguration(String),
}

impl Transient for SummarizationClientError {
    fn is_transient(&self) -> bool {
        match self {
            Self::ProviderUnavailable(_) => true,
            Self::Rejected { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// One summarization call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizationRequest {
    /// Text to summarize; never empty.
    pub text: String,
    /// Lower bound on the summary length, in words.
    pub min_words: usize,
    /// Upper bound on the summary length, in words.
    pub max_words: usize,
}

/// Interface implemented by summarization providers.
#[async_trait]
pub trait SummarizationClient: Send + Sync {
    /// Summarize `request.text` within the requested word bounds.
    async fn generate_summary(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError>;

    /// Load the model ahead of the first request. Safe to call repeatedly.
    async fn warm_up(&self) -> Result<(), SummarizationClientError> {
        Ok(())
    }
}

/// Build the summarization client selected by configuration.
pub fn get_summarization_client(
    config: &Config,
) -> Result<Arc<dyn SummarizationClient>, SummarizationClientError> {
    tracing::info!(
        provider = ?config.summarization_provider,
        model = %config.summarization_model,
        "Initializing summarization client"
    );
    match config.summarization_provider {
        SummarizationProvider::Extractive => Ok(Arc::new(ExtractiveSummarizer::new())),
        SummarizationProvider::Ollama => Ok(Arc::new(OllamaSummarizationClient::new(
            config.ollama_url.clone(),
            config.summarization_model.clone(),
        )?)),
    }
}

/// Keep at most `max_words` whitespace-separated words of `text`.
pub(crate) fn clamp_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Summarization client backed by a local Ollama runtime.
pub struct OllamaSummarizationClient {
    http: Client,
    base_url: String,
    model: String,
    warmed: OnceCell<()>,
}

impl OllamaSummarizationClient {
    /// Construct a client for `model` served at `base_url`.
    pub fn new(base_url: String, model: String) -> Result<Self, SummarizationClientError> {
        let http = Client::builder()
            .user_agent("docuhelper/summary")
            .build()
            .map_err(|error| SummarizationClientError::InvalidConfiguration(error.to_string()))?;
        Ok(Self {
            http,
            base_url,
            model,
            warmed: OnceCell::new(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }

    fn build_prompt(request: &SummarizationRequest) -> String {
        format!(
            "Summarize the following text in {min} to {max} words. Use a neutral, factual tone \
             and respond with the summary only, as a single paragraph.\n\n{text}",
            min = request.min_words,
            max = request.max_words,
            text = request.text,
        )
    }

    async fn generate(
        &self,
        payload: serde_json::Value,
    ) -> Result<OllamaResponse, SummarizationClientError> {
        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                SummarizationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::Rejected { status, body });
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            SummarizationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(SummarizationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    done: bool,
}

#[async_trait]
impl SummarizationClient for OllamaSummarizationClient {
    async fn generate_summary(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError> {
        if request.text.trim().is_empty() {
            return Err(SummarizationClientError::InvalidInput(
                "cannot summarize empty text".into(),
            ));
        }
        self.warm_up().await?;

        let payload = json!({
            "model": self.model,
            "prompt": Self::build_prompt(&request),
            "stream": false,
            "options": {
                // Greedy decoding keeps summaries reproducible.
                "temperature": 0.0,
                "top_k": 1,
                "seed": 0,
                "num_predict": request.max_words * 2,
            }
        });

        let body = self.generate(payload).await?;
        let summary = clamp_words(body.response.trim(), request.max_words);
        if summary.is_empty() {
            return Err(SummarizationClientError::GenerationFailed(
                "model returned an empty summary".into(),
            ));
        }
        Ok(summary)
    }

    async fn warm_up(&self) -> Result<(), SummarizationClientError> {
        self.warmed
            .get_or_try_init(|| async {
                tracing::info!(model = %self.model, "Loading summarization model");
                // An empty prompt makes Ollama load the model without generating.
                self.generate(json!({
                    "model": self.model,
                    "prompt": "",
                    "stream": false,
                }))
                .await?;
                tracing::info!(model = %self.model, "Summarization model ready");
                Ok::<(), SummarizationClientError>(())
            })
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn request(text: &str) -> SummarizationRequest {
        SummarizationRequest {
            text: text.into(),
            min_words: 5,
            max_words: 8,
        }
    }

    fn client(server: &MockServer) -> OllamaSummarizationClient {
        OllamaSummarizationClient::new(server.base_url(), "llama3.2".into()).expect("client")
    }

    #[tokio::test]
    async fn ollama_client_handles_successful_response() {
        let server = MockServer::start_async().await;
        let warm = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .json_body_partial(r#"{"prompt": ""}"#);
                then.status(200).json_body(json!({ "response": "", "done": true }));
            })
            .await;
        let generate = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .body_contains("Summarize the following text")
                    .json_body_partial(r#"{"options": {"temperature": 0.0, "top_k": 1, "seed": 0}}"#);
                then.status(200).json_body(json!({
                    "response": "  Summary text  ",
                    "done": true
                }));
            })
            .await;

        let client = client(&server);
        let first = client
            .generate_summary(request("Some long text."))
            .await
            .expect("summary");
        let second = client
            .generate_summary(request("Some long text."))
            .await
            .expect("summary");

        assert_eq!(first, "Summary text");
        assert_eq!(first, second);
        warm.assert_hits_async(1).await;
        generate.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn output_is_clamped_to_max_words() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).json_body(json!({
                    "response": "one two three four five six seven eight nine ten",
                    "done": true
                }));
            })
            .await;

        let summary = client(&server)
            .generate_summary(request("text"))
            .await
            .expect("summary");
        assert_eq!(summary.split_whitespace().count(), 8);
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(503).body("loading");
            })
            .await;

        let error = client(&server)
            .generate_summary(request("text"))
            .await
            .expect_err("error response");
        assert!(matches!(error, SummarizationClientError::Rejected { status: 503, .. }));
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn missing_model_is_permanent() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(404).body(r#"{"error":"model not found"}"#);
            })
            .await;

        let error = client(&server)
            .generate_summary(request("text"))
            .await
            .expect_err("error response");
        assert!(!error.is_transient());
    }

    #[tokio::test]
    async fn malformed_response_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).body("not json");
            })
            .await;

        let error = client(&server)
            .generate_summary(request("text"))
            .await
            .expect_err("malformed");
        assert!(matches!(error, SummarizationClientError::InvalidResponse(_)));
        assert!(!error.is_transient());
    }

    #[tokio::test]
    async fn unreachable_runtime_is_transient() {
        // Port 9 (discard) is not expected to host an HTTP server.
        let client =
            OllamaSummarizationClient::new("http://127.0.0.1:9".into(), "llama3.2".into())
                .expect("client");
        let error = client
            .generate_summary(request("text"))
            .await
            .expect_err("unreachable");
        assert!(matches!(error, SummarizationClientError::ProviderUnavailable(_)));
        assert!(error.is_transient());
    }

    #[test]
    fn clamp_words_collapses_whitespace() {
        assert_eq!(clamp_words(" a  b\nc d ", 3), "a b c");
        assert_eq!(clamp_words("", 3), "");
    }
}
