//! Processing service coordinating extraction, OCR, chunking, and summarization.

use crate::{
    config::Config,
    extraction::{self, ExtractedDocument, ExtractionError},
    metrics::{MetricsSnapshot, SummaryMetrics},
    ocr::{OcrEngine, TesseractOcr, ocr_images},
    processing::{
        chunking::chunk_text,
        summarize::{join_summaries, summarize_chunks},
        types::{ProcessingError, SummaryOutcome},
    },
    summarization::{
        SummarizationClient, SummarizationClientError, SummarizationParams,
        build_summarization_client,
    },
};
use async_trait::async_trait;
use std::sync::Arc;

/// Tunables applied to every request.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// Soft upper bound on chunk length, in characters.
    pub max_chunk_chars: usize,
    /// Generation settings passed to the summarization backend.
    pub params: SummarizationParams,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_chunk_chars: 1024,
            params: SummarizationParams::default(),
        }
    }
}

impl PipelineSettings {
    /// Derive pipeline settings from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_chunk_chars: config.chunk_max_chars,
            params: SummarizationParams::from_config(config),
        }
    }
}

/// Runs the summarization pipeline: PDF extraction, OCR, chunking, and per-chunk summaries.
///
/// The service owns the long-lived summarization client, OCR engine, and metrics registry.
/// Construct it once near process start and share it through an `Arc`.
pub struct ProcessingService {
    summarizer: Arc<dyn SummarizationClient>,
    ocr: Arc<dyn OcrEngine>,
    settings: PipelineSettings,
    metrics: Arc<SummaryMetrics>,
}

/// Abstraction over the processing pipeline used by the HTTP surface.
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Extract text (and OCR text) from a PDF, then chunk and summarize it.
    async fn summarize_pdf(&self, pdf_bytes: Vec<u8>) -> Result<SummaryOutcome, ProcessingError>;

    /// Chunk and summarize inline text.
    async fn summarize_text(&self, text: String) -> Result<SummaryOutcome, ProcessingError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl ProcessingService {
    /// Build the service from configuration, initializing the summarization client and
    /// Tesseract engine it selects.
    pub fn from_config(config: &Config) -> Result<Self, SummarizationClientError> {
        tracing::info!("Initializing summarization client");
        let summarizer = build_summarization_client(config)?;
        let ocr = Arc::new(TesseractOcr::new(
            config.tesseract_cmd.clone(),
            config.ocr_language.clone(),
        ));
        Ok(Self::with_components(
            summarizer,
            ocr,
            PipelineSettings::from_config(config),
        ))
    }

    /// Assemble a service from explicit components.
    pub fn with_components(
        summarizer: Arc<dyn SummarizationClient>,
        ocr: Arc<dyn OcrEngine>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            summarizer,
            ocr,
            settings,
            metrics: Arc::new(SummaryMetrics::new()),
        }
    }

    /// Extract, OCR, chunk, and summarize an uploaded PDF.
    pub async fn summarize_pdf(
        &self,
        pdf_bytes: Vec<u8>,
    ) -> Result<SummaryOutcome, ProcessingError> {
        tracing::info!(bytes = pdf_bytes.len(), "Processing PDF upload");
        let ExtractedDocument { text, images } =
            tokio::task::spawn_blocking(move || extraction::extract(&pdf_bytes))
                .await
                .map_err(ExtractionError::from)??;

        let ocr_text = ocr_images(self.ocr.as_ref(), &images).await?;
        tracing::debug!(
            images = images.len(),
            ocr_chars = ocr_text.chars().count(),
            "OCR finished"
        );
        drop(images);

        let full_text = format!("{text}\n{ocr_text}");
        if full_text.trim().is_empty() {
            tracing::info!("PDF contained no extractable text");
            return Err(ProcessingError::NoExtractableText);
        }

        self.metrics.record_pdf();
        Ok(self.summarize_full_text(&full_text).await)
    }

    /// Chunk and summarize inline text.
    pub async fn summarize_text(&self, text: String) -> Result<SummaryOutcome, ProcessingError> {
        tracing::info!(chars = text.chars().count(), "Processing inline text");
        Ok(self.summarize_full_text(&text).await)
    }

    async fn summarize_full_text(&self, text: &str) -> SummaryOutcome {
        let chunks = chunk_text(text, self.settings.max_chunk_chars);
        tracing::debug!(
            chunks = chunks.len(),
            max_chunk_chars = self.settings.max_chunk_chars,
            "Chunked document"
        );

        let results =
            summarize_chunks(self.summarizer.as_ref(), &chunks, &self.settings.params).await;
        let failed_chunks = results.iter().filter(|result| result.is_failure()).count();
        let summary = join_summaries(&results);

        self.metrics
            .record_document(chunks.len() as u64, failed_chunks as u64);
        tracing::info!(
            chunks = chunks.len(),
            failed_chunks,
            summary_chars = summary.chars().count(),
            "Document summarized"
        );

        SummaryOutcome {
            summary,
            chunk_count: chunks.len(),
            failed_chunks,
        }
    }

    /// Return the current summarization metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl ProcessingApi for ProcessingService {
    async fn summarize_pdf(&self, pdf_bytes: Vec<u8>) -> Result<SummaryOutcome, ProcessingError> {
        ProcessingService::summarize_pdf(self, pdf_bytes).await
    }

    async fn summarize_text(&self, text: String) -> Result<SummaryOutcome, ProcessingError> {
        ProcessingService::summarize_text(self, text).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        ProcessingService::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::OcrError;
    use image::DynamicImage;

    struct UppercaseSummarizer;

    #[async_trait]
    impl SummarizationClient for UppercaseSummarizer {
        async fn summarize(
            &self,
            text: &str,
            _params: &SummarizationParams,
        ) -> Result<String, SummarizationClientError> {
            if text.contains("explode") {
                return Err(SummarizationClientError::GenerationFailed("boom".into()));
            }
            Ok(text.to_uppercase())
        }
    }

    struct NoOcr;

    #[async_trait]
    impl OcrEngine for NoOcr {
        async fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
            Ok(String::new())
        }
    }

    fn service(max_chunk_chars: usize) -> ProcessingService {
        ProcessingService::with_components(
            Arc::new(UppercaseSummarizer),
            Arc::new(NoOcr),
            PipelineSettings {
                max_chunk_chars,
                params: SummarizationParams::default(),
            },
        )
    }

    #[tokio::test]
    async fn inline_text_is_chunked_and_joined_in_order() {
        let service = service(8);
        let outcome = service
            .summarize_text("one two three four five".into())
            .await
            .expect("outcome");

        assert_eq!(outcome.chunk_count, 3);
        assert_eq!(outcome.failed_chunks, 0);
        assert_eq!(outcome.summary, "ONE TWO THREE FOUR FIVE ");
    }

    #[tokio::test]
    async fn failed_chunks_are_counted_and_inlined() {
        let service = service(8);
        let outcome = service
            .summarize_text("fine text explode now".into())
            .await
            .expect("outcome");

        // Chunks: "fine text", "explode", "now".
        assert_eq!(outcome.chunk_count, 3);
        assert_eq!(outcome.failed_chunks, 1);
        assert_eq!(
            outcome.summary,
            "FINE TEXT \nError in summarization: Failed to generate summary: boomNOW "
        );

        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.documents_summarized, 1);
        assert_eq!(snapshot.chunks_summarized, 3);
        assert_eq!(snapshot.chunk_failures, 1);
    }

    #[tokio::test]
    async fn whitespace_text_yields_empty_summary() {
        let service = service(1024);
        let outcome = service.summarize_text("   \n ".into()).await.expect("outcome");
        assert_eq!(outcome.chunk_count, 0);
        assert_eq!(outcome.summary, "");
    }

    #[tokio::test]
    async fn invalid_pdf_is_an_extraction_error() {
        let service = service(1024);
        let error = service
            .summarize_pdf(b"%PDF-garbage".to_vec())
            .await
            .expect_err("invalid pdf");
        assert!(matches!(error, ProcessingError::Extraction(_)));
        assert!(!error.is_client_error());
    }

    #[test]
    fn settings_follow_configuration() {
        let config = Config {
            chunk_max_chars: 300,
            ..Config::default()
        };
        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.max_chunk_chars, 300);
        assert_eq!(settings.params, SummarizationParams::default());
    }
}
