//! Document processing pipeline: chunking and per-chunk summarization orchestration.

pub mod chunking;
mod service;
pub mod summarize;
pub mod types;

pub use service::{PipelineSettings, ProcessingApi, ProcessingService};
pub use types::{ChunkSummary, ProcessingError, SummaryOutcome};
