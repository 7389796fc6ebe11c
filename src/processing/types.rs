//! Core data types and error definitions for the summarization pipeline.

use crate::{extraction::ExtractionError, ocr::OcrError};
use thiserror::Error;

/// Errors emitted by the document processing pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Neither the PDF text layer nor OCR produced any text.
    #[error("No extractable text found in the PDF.")]
    NoExtractableText,
    /// The uploaded PDF could not be read.
    #[error("Error in processing PDF: {0}")]
    Extraction(#[from] ExtractionError),
    /// OCR over embedded images failed.
    #[error("Error in processing PDF: {0}")]
    Ocr(#[from] OcrError),
}

impl ProcessingError {
    /// Whether the failure is attributable to the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NoExtractableText)
    }
}

/// Result of summarizing a single chunk.
///
/// A failed chunk keeps its error message so it can be rendered inline without aborting the
/// remaining chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkSummary {
    /// Summary text produced by the model.
    Summary(String),
    /// Error message reported by the summarization backend.
    Failed(String),
}

impl ChunkSummary {
    /// Render this chunk's contribution to the joined summary.
    pub fn render(&self) -> String {
        match self {
            Self::Summary(text) => format!("{text} "),
            Self::Failed(message) => format!("\nError in summarization: {message}"),
        }
    }

    /// Whether the chunk failed to summarize.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Outcome of a completed summarization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOutcome {
    /// Joined summary text returned to the caller.
    pub summary: String,
    /// Number of chunks the input was split into.
    pub chunk_count: usize,
    /// Number of chunks replaced by an inline error marker.
    pub failed_chunks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_renders_with_trailing_space() {
        let rendered = ChunkSummary::Summary("Short.".into()).render();
        assert_eq!(rendered, "Short. ");
    }

    #[test]
    fn failure_renders_inline_marker() {
        let rendered = ChunkSummary::Failed("timeout".into()).render();
        assert_eq!(rendered, "\nError in summarization: timeout");
    }

    #[test]
    fn only_empty_extraction_is_a_client_error() {
        assert!(ProcessingError::NoExtractableText.is_client_error());
        assert!(!ProcessingError::Extraction(ExtractionError::Empty).is_client_error());
        assert!(!ProcessingError::Ocr(OcrError::Unavailable("tesseract".into())).is_client_error());
    }

    #[test]
    fn extraction_errors_mention_pdf_processing() {
        let message = ProcessingError::Extraction(ExtractionError::Empty).to_string();
        assert_eq!(message, "Error in processing PDF: uploaded file is empty");
    }
}
