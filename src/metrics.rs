use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing summarization activity.
#[derive(Default)]
pub struct SummaryMetrics {
    documents_summarized: AtomicU64,
    pdfs_processed: AtomicU64,
    chunks_summarized: AtomicU64,
    chunk_failures: AtomicU64,
}

impl SummaryMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a summarized document along with its chunk count and per-chunk failures.
    pub fn record_document(&self, chunk_count: u64, failed_chunks: u64) {
        self.documents_summarized.fetch_add(1, Ordering::Relaxed);
        self.chunks_summarized
            .fetch_add(chunk_count, Ordering::Relaxed);
        self.chunk_failures
            .fetch_add(failed_chunks, Ordering::Relaxed);
    }

    /// Record a PDF upload that made it through extraction and OCR.
    pub fn record_pdf(&self) {
        self.pdfs_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_summarized: self.documents_summarized.load(Ordering::Relaxed),
            pdfs_processed: self.pdfs_processed.load(Ordering::Relaxed),
            chunks_summarized: self.chunks_summarized.load(Ordering::Relaxed),
            chunk_failures: self.chunk_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of summarization counters used for reporting.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents (PDF or inline text) summarized since startup.
    pub documents_summarized: u64,
    /// Number of PDF uploads processed since startup.
    pub pdfs_processed: u64,
    /// Total chunk count sent to the summarization backend.
    pub chunks_summarized: u64,
    /// Chunks whose summarization failed and were replaced by an inline error marker.
    pub chunk_failures: u64,
}
