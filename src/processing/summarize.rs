//! Sequential per-chunk summarization.

use crate::summarization::{SummarizationClient, SummarizationParams};

use super::types::ChunkSummary;

/// Summarize `chunks` one at a time, in order.
///
/// Always returns exactly one entry per chunk. A backend failure is captured as
/// [`ChunkSummary::Failed`] and the remaining chunks are still processed.
pub async fn summarize_chunks(
    client: &dyn SummarizationClient,
    chunks: &[String],
    params: &SummarizationParams,
) -> Vec<ChunkSummary> {
    let mut results = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        match client.summarize(chunk, params).await {
            Ok(summary) => results.push(ChunkSummary::Summary(summary)),
            Err(error) => {
                tracing::warn!(
                    chunk = index,
                    chunks = chunks.len(),
                    error = %error,
                    "Chunk summarization failed; continuing"
                );
                results.push(ChunkSummary::Failed(error.to_string()));
            }
        }
    }
    results
}

/// Concatenate rendered chunk results in order.
pub fn join_summaries(results: &[ChunkSummary]) -> String {
    results.iter().map(ChunkSummary::render).collect()
}
