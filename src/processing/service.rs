//! Ingestion service coordinating extraction, summarization, chunking, and embedding.

use crate::{
    config::{Config, FailurePolicy},
    embedding::get_embedding_client,
    extraction::{self, DocumentFormat, ExtractionError},
    metrics::{IngestMetrics, MetricsSnapshot},
    processing::{
        chunking::{Chunk, ChunkingConfig, normalize_whitespace, split},
        embed::EmbeddingGenerator,
        summarize::{Summarizer, SummarizerSettings},
        types::{
            ChunkingError, EmbeddedChunk, EmbeddingError, IngestionError, IngestionResult,
            ServiceInitError, current_timestamp_rfc3339,
        },
    },
    retry::RetryPolicy,
    summarization::get_summarization_client,
};
use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// Tunables for the orchestration around the summarizer and embedder.
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    /// Chunking for retrieval chunks; independent of the summarizer's.
    pub retrieval_chunking: ChunkingConfig,
    /// Concurrent embedding calls per ingestion.
    pub concurrency: usize,
    /// Whether a failing embedding or summary aborts the ingestion or is dropped.
    pub failure_policy: FailurePolicy,
    /// Wall-clock budget for one ingestion.
    pub timeout: Duration,
}

impl IngestionSettings {
    /// Default tunables around the given retrieval chunking.
    pub fn new(retrieval_chunking: ChunkingConfig) -> Self {
        Self {
            retrieval_chunking,
            concurrency: 4,
            failure_policy: FailurePolicy::Abort,
            timeout: Duration::from_secs(300),
        }
    }

    /// Derive settings from the runtime configuration.
    pub fn from_config(config: &Config) -> Result<Self, ChunkingError> {
        let retrieval_chunking =
            ChunkingConfig::new(config.retrieval_chunk_size, config.retrieval_chunk_overlap)?;
        Ok(Self {
            retrieval_chunking,
            concurrency: config.inference_concurrency,
            failure_policy: config.model_failure_policy,
            timeout: config.ingestion_timeout(),
        })
    }
}

/// Runs the full ingestion pipeline for one stored document at a time.
///
/// The service owns shared handles to the summarization and embedding providers plus the
/// metrics registry. Construct it once near process start and share it through an `Arc`;
/// concurrent ingestions only read from it.
pub struct IngestionService {
    summarizer: Summarizer,
    embedder: EmbeddingGenerator,
    settings: IngestionSettings,
    metrics: Arc<IngestMetrics>,
}

/// Abstraction over the ingestion pipeline used by callers that persist its results.
#[async_trait]
pub trait IngestionApi: Send + Sync {
    /// Extract, summarize, chunk, and embed the stored file at `path`.
    async fn ingest(
        &self,
        path: &Path,
        declared_type: &str,
    ) -> Result<IngestionResult, IngestionError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl IngestionService {
    /// Assemble a service from already-built components.
    pub fn new(
        summarizer: Summarizer,
        embedder: EmbeddingGenerator,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            summarizer,
            embedder,
            settings,
            metrics: Arc::new(IngestMetrics::new()),
        }
    }

    /// Build providers and settings from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ServiceInitError> {
        let summarization_client = get_summarization_client(config)?;
        let embedding_client = get_embedding_client(config)?;
        tracing::info!("Model clients initialized");

        let retry = RetryPolicy::new(config.model_max_retries, config.model_retry_backoff());
        let summarizer = Summarizer::new(
            summarization_client,
            SummarizerSettings::from_config(config)?,
        );
        let embedder = EmbeddingGenerator::new(embedding_client, config.embedding_dimension, retry);
        Ok(Self::new(
            summarizer,
            embedder,
            IngestionSettings::from_config(config)?,
        ))
    }

    /// Load both models eagerly instead of on the first document.
    pub async fn warm_up(&self) -> Result<(), ServiceInitError> {
        self.summarizer.warm_up().await?;
        self.embedder.warm_up().await?;
        Ok(())
    }

    /// Settings in effect.
    pub fn settings(&self) -> &IngestionSettings {
        &self.settings
    }

    /// Extract, summarize, chunk, and embed the stored file at `path`.
    pub async fn ingest(
        &self,
        path: &Path,
        declared_type: &str,
    ) -> Result<IngestionResult, IngestionError> {
        let ingestion_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "ingest",
            %ingestion_id,
            path = %path.display(),
            declared_type
        );
        self.supervise(span, async move {
            let format: DocumentFormat = declared_type.parse()?;
            let text = extract_blocking(path, format).await?;
            tracing::info!(
                %format,
                chars = text.chars().count(),
                "Extracted document text"
            );
            self.process_text(ingestion_id, &text).await
        })
        .await
    }

    /// Run the pipeline on text that was already extracted.
    pub async fn ingest_text(&self, text: &str) -> Result<IngestionResult, IngestionError> {
        let ingestion_id = Uuid::new_v4();
        let span = tracing::info_span!("ingest", %ingestion_id);
        self.supervise(span, self.process_text(ingestion_id, text))
            .await
    }

    /// Return the current ingestion metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Apply the timeout, record metrics, and log the outcome of one ingestion.
    async fn supervise<F>(
        &self,
        span: tracing::Span,
        work: F,
    ) -> Result<IngestionResult, IngestionError>
    where
        F: Future<Output = Result<IngestionResult, IngestionError>>,
    {
        let timeout = self.settings.timeout;
        let result = tokio::time::timeout(timeout, work.instrument(span.clone()))
            .await
            .unwrap_or_else(|_| Err(IngestionError::Timeout(timeout)));

        span.in_scope(|| match &result {
            Ok(outcome) => {
                self.metrics.record_document(
                    outcome.chunks.len() as u64,
                    outcome.skipped_chunks as u64,
                );
                tracing::info!(
                    summary = outcome.summary.is_some(),
                    chunks = outcome.chunks.len(),
                    skipped_chunks = outcome.skipped_chunks,
                    summary_degraded = outcome.summary_degraded,
                    "Document ingested"
                );
            }
            Err(error) => {
                self.metrics.record_failure();
                tracing::error!(kind = error.kind(), error = %error, "Ingestion failed");
            }
        });
        result
    }

    async fn process_text(
        &self,
        ingestion_id: Uuid,
        text: &str,
    ) -> Result<IngestionResult, IngestionError> {
        if normalize_whitespace(text).is_empty() {
            tracing::info!("Document has no text; skipping model calls");
            return Ok(IngestionResult::empty(ingestion_id));
        }

        let (summary, summary_degraded) = match self.summarizer.summarize_with_report(text).await
        {
            Ok(report) => (report.summary, report.skipped_chunks > 0),
            Err(error) if self.settings.failure_policy == FailurePolicy::Skip => {
                tracing::warn!(
                    pass = %error.pass,
                    error = %error,
                    "Summarization failed; continuing without a summary"
                );
                (None, true)
            }
            Err(error) => return Err(error.into()),
        };

        let chunks = split(text, &self.settings.retrieval_chunking);
        tracing::debug!(chunks = chunks.len(), "Split retrieval chunks");
        let (chunks, skipped_chunks) = self.embed_chunks(chunks).await?;

        Ok(IngestionResult {
            ingestion_id,
            summary,
            chunks,
            skipped_chunks,
            summary_degraded,
            completed_at: current_timestamp_rfc3339(),
        })
    }

    /// Embed every chunk concurrently, then restore and renumber chunk order.
    async fn embed_chunks(
        &self,
        chunks: Vec<Chunk>,
    ) -> Result<(Vec<EmbeddedChunk>, usize), IngestionError> {
        let total = chunks.len();
        let mut pending = stream::iter(chunks.into_iter().map(|chunk| async move {
            let result = self.embedder.embed(&chunk.text).await;
            (chunk, result)
        }))
        .buffer_unordered(self.settings.concurrency.max(1));

        let mut embedded = Vec::with_capacity(total);
        let mut first_failure: Option<(usize, EmbeddingError)> = None;
        let mut skipped = 0;
        while let Some((chunk, result)) = pending.next().await {
            match result {
                Ok(embedding) => embedded.push(EmbeddedChunk::new(chunk, embedding)),
                Err(source) if self.settings.failure_policy == FailurePolicy::Skip => {
                    tracing::warn!(
                        order_index = chunk.order_index,
                        error = %source,
                        "Skipping chunk that failed to embed"
                    );
                    skipped += 1;
                    if first_failure
                        .as_ref()
                        .is_none_or(|(order_index, _)| chunk.order_index < *order_index)
                    {
                        first_failure = Some((chunk.order_index, source));
                    }
                }
                Err(source) => {
                    return Err(IngestionError::Embedding {
                        order_index: chunk.order_index,
                        source,
                    });
                }
            }
        }

        if embedded.is_empty() {
            if let Some((order_index, source)) = first_failure {
                return Err(IngestionError::Embedding {
                    order_index,
                    source,
                });
            }
        }

        embedded.sort_by_key(|item| item.chunk.order_index);
        for (position, item) in embedded.iter_mut().enumerate() {
            item.chunk.order_index = position;
        }
        Ok((embedded, skipped))
    }
}

/// Run extraction on the blocking pool; it reads the whole file and parses it synchronously.
async fn extract_blocking(path: &Path, format: DocumentFormat) -> Result<String, ExtractionError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || extraction::extract(&owned, format))
        .await
        .map_err(|error| ExtractionError::Aborted(error.to_string()))?
}

#[async_trait]
impl IngestionApi for IngestionService {
    async fn ingest(
        &self,
        path: &Path,
        declared_type: &str,
    ) -> Result<IngestionResult, IngestionError> {
        IngestionService::ingest(self, path, declared_type).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        IngestionService::metrics_snapshot(self)
    }
}
