//! Hierarchical document summarization.
//!
//! Short documents are summarized in one call. Longer documents are split with the summarizer's
//! own [`ChunkingConfig`], each chunk is summarized independently, and the ordered chunk
//! summaries are combined by one final call. There are exactly two levels: the combine pass is
//! never repeated, and its input is truncated to the provider's input budget instead.

use crate::{
    config::{Config, FailurePolicy},
    processing::{
        chunking::{Chunk, ChunkingConfig, normalize_whitespace, split},
        types::{ChunkingError, SummarizationError, SummaryPass},
    },
    retry::RetryPolicy,
    summarization::{SummarizationClient, SummarizationClientError, SummarizationRequest},
};
use futures_util::{StreamExt, stream};
use std::sync::Arc;

/// Inclusive word-count bounds requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthBounds {
    /// Minimum summary length in words.
    pub min_words: usize,
    /// Maximum summary length in words.
    pub max_words: usize,
}

impl LengthBounds {
    /// Bounds of `min_words..=max_words`.
    pub const fn new(min_words: usize, max_words: usize) -> Self {
        Self {
            min_words,
            max_words,
        }
    }
}

/// Tunables for [`Summarizer`].
#[derive(Debug, Clone)]
pub struct SummarizerSettings {
    /// Chunking used for hierarchical summaries; independent of retrieval chunking.
    pub chunking: ChunkingConfig,
    /// Cleaned documents at or below this many characters get a single pass.
    pub single_pass_max_chars: usize,
    /// Characters of input sent to any one call.
    pub max_input_chars: usize,
    /// Bounds for the single pass.
    pub single_pass: LengthBounds,
    /// Bounds for each chunk-level pass.
    pub chunk_pass: LengthBounds,
    /// Bounds for the combine pass.
    pub combine_pass: LengthBounds,
    /// Concurrent chunk-level calls.
    pub concurrency: usize,
    /// Whether a failing chunk-level pass aborts or is dropped.
    pub failure_policy: FailurePolicy,
    /// Retry budget for each call.
    pub retry: RetryPolicy,
}

impl SummarizerSettings {
    /// Default tunables around the given chunking configuration.
    pub fn new(chunking: ChunkingConfig) -> Self {
        Self {
            chunking,
            single_pass_max_chars: 3000,
            max_input_chars: 4000,
            single_pass: LengthBounds::new(80, 300),
            chunk_pass: LengthBounds::new(40, 150),
            combine_pass: LengthBounds::new(120, 350),
            concurrency: 4,
            failure_policy: FailurePolicy::Abort,
            retry: RetryPolicy::default(),
        }
    }

    /// Derive settings from the runtime configuration.
    pub fn from_config(config: &Config) -> Result<Self, ChunkingError> {
        let chunking = ChunkingConfig::new(config.summary_chunk_size, config.summary_chunk_overlap)?;
        Ok(Self {
            single_pass_max_chars: config.summary_single_pass_max_chars,
            max_input_chars: config.summary_max_input_chars,
            concurrency: config.inference_concurrency,
            failure_policy: config.model_failure_policy,
            retry: RetryPolicy::new(config.model_max_retries, config.model_retry_backoff()),
            ..Self::new(chunking)
        })
    }
}

/// Summary plus how many chunk-level passes were dropped to produce it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryReport {
    /// The summary; `None` when the cleaned text was empty.
    pub summary: Option<String>,
    /// Chunk-level passes dropped under [`FailurePolicy::Skip`].
    pub skipped_chunks: usize,
}

/// Two-level summarizer over an injected provider.
pub struct Summarizer {
    client: Arc<dyn SummarizationClient>,
    settings: SummarizerSettings,
}

impl Summarizer {
    /// Build a summarizer around a shared provider.
    pub fn new(client: Arc<dyn SummarizationClient>, settings: SummarizerSettings) -> Self {
        Self { client, settings }
    }

    /// Settings in effect.
    pub fn settings(&self) -> &SummarizerSettings {
        &self.settings
    }

    /// Load the provider's model ahead of the first document.
    pub async fn warm_up(&self) -> Result<(), SummarizationClientError> {
        self.client.warm_up().await
    }

    /// Summarize `text`, returning `None` without calling the provider when it has no content.
    pub async fn summarize(&self, text: &str) -> Result<Option<String>, SummarizationError> {
        self.summarize_with_report(text)
            .await
            .map(|report| report.summary)
    }

    /// Like [`Summarizer::summarize`], also reporting dropped chunk-level passes.
    pub async fn summarize_with_report(
        &self,
        text: &str,
    ) -> Result<SummaryReport, SummarizationError> {
        let cleaned = normalize_whitespace(text);
        if cleaned.is_empty() {
            return Ok(SummaryReport::default());
        }

        let length = cleaned.chars().count();
        if length <= self.settings.single_pass_max_chars {
            tracing::debug!(chars = length, "Summarizing in a single pass");
            let input = truncate_chars(&cleaned, self.settings.max_input_chars).to_string();
            let summary = self
                .call(SummaryPass::Single, input, self.settings.single_pass)
                .await?;
            return Ok(SummaryReport {
                summary: Some(summary),
                skipped_chunks: 0,
            });
        }

        let chunks = split(&cleaned, &self.settings.chunking);
        if chunks.is_empty() {
            return Ok(SummaryReport::default());
        }
        tracing::debug!(
            chars = length,
            chunks = chunks.len(),
            "Summarizing hierarchically"
        );

        let (partials, skipped_chunks) = self.summarize_chunks(chunks).await?;
        let joined = partials.join(" ");
        let input = truncate_chars(&joined, self.settings.max_input_chars).to_string();
        let summary = self
            .call(SummaryPass::Combine, input, self.settings.combine_pass)
            .await?;

        Ok(SummaryReport {
            summary: Some(summary),
            skipped_chunks,
        })
    }

    /// Summarize every chunk concurrently and return the summaries in chunk order.
    async fn summarize_chunks(
        &self,
        chunks: Vec<Chunk>,
    ) -> Result<(Vec<String>, usize), SummarizationError> {
        let total = chunks.len();
        let mut pending = stream::iter(chunks.into_iter().map(|chunk| async move {
            let pass = SummaryPass::Chunk {
                order_index: chunk.order_index,
            };
            let result = self.call(pass, chunk.text, self.settings.chunk_pass).await;
            (chunk.order_index, result)
        }))
        .buffer_unordered(self.settings.concurrency.max(1));

        let mut summaries = Vec::with_capacity(total);
        let mut failures = Vec::new();
        while let Some((order_index, result)) = pending.next().await {
            match result {
                Ok(summary) => summaries.push((order_index, summary)),
                Err(error) if self.settings.failure_policy == FailurePolicy::Skip => {
                    tracing::warn!(order_index, error = %error, "Dropping failed chunk summary");
                    failures.push((order_index, error));
                }
                Err(error) => return Err(error),
            }
        }

        if summaries.is_empty() {
            failures.sort_by_key(|(order_index, _)| *order_index);
            if let Some((_, error)) = failures.into_iter().next() {
                return Err(error);
            }
            return Ok((Vec::new(), 0));
        }

        summaries.sort_by_key(|(order_index, _)| *order_index);
        Ok((
            summaries.into_iter().map(|(_, summary)| summary).collect(),
            failures.len(),
        ))
    }

    async fn call(
        &self,
        pass: SummaryPass,
        text: String,
        bounds: LengthBounds,
    ) -> Result<String, SummarizationError> {
        tracing::trace!(%pass, chars = text.chars().count(), "Requesting summary");
        let request = SummarizationRequest {
            text,
            min_words: bounds.min_words,
            max_words: bounds.max_words,
        };
        self.settings
            .retry
            .run("summarize", || self.client.generate_summary(request.clone()))
            .await
            .map_err(|source| SummarizationError { pass, source })
    }
}

/// Prefix of `text` holding at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
