use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion activity.
#[derive(Default)]
pub struct IngestMetrics {
    documents_ingested: AtomicU64,
    empty_documents: AtomicU64,
    chunks_embedded: AtomicU64,
    chunks_skipped: AtomicU64,
    failed_ingestions: AtomicU64,
    last_chunk_count: AtomicU64,
}

impl IngestMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed ingestion along with its embedded and skipped chunk counts.
    pub fn record_document(&self, chunk_count: u64, skipped: u64) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_embedded
            .fetch_add(chunk_count, Ordering::Relaxed);
        self.chunks_skipped.fetch_add(skipped, Ordering::Relaxed);
        self.last_chunk_count.store(chunk_count, Ordering::Relaxed);
        if chunk_count == 0 && skipped == 0 {
            self.empty_documents.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an ingestion that returned an error.
    pub fn record_failure(&self) {
        self.failed_ingestions.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let documents_ingested = self.documents_ingested.load(Ordering::Relaxed);
        MetricsSnapshot {
            documents_ingested,
            empty_documents: self.empty_documents.load(Ordering::Relaxed),
            chunks_embedded: self.chunks_embedded.load(Ordering::Relaxed),
            chunks_skipped: self.chunks_skipped.load(Ordering::Relaxed),
            failed_ingestions: self.failed_ingestions.load(Ordering::Relaxed),
            last_chunk_count: (documents_ingested > 0)
                .then(|| self.last_chunk_count.load(Ordering::Relaxed)),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents that completed ingestion since startup.
    pub documents_ingested: u64,
    /// Completed documents whose extracted text was empty.
    pub empty_documents: u64,
    /// Total chunks embedded across all completed documents.
    pub chunks_embedded: u64,
    /// Chunks dropped under the `skip` failure policy.
    pub chunks_skipped: u64,
    /// Ingestions that ended in an error.
    pub failed_ingestions: u64,
    /// Chunk count of the most recent completed document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_chunk_count: Option<u64>,
}
