//! Clients for the pretrained summarization model.
//!
//! The default backend talks to the Hugging Face Inference API (or any self-hosted endpoint that
//! speaks the same `summarization` task protocol) and runs `facebook/bart-large-cnn`. An Ollama
//! backend is available for fully local deployments; it prompts a general-purpose model instead
//! of calling a dedicated summarization head.

use crate::config::{Config, SummarizationProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_HUGGINGFACE_URL: &str = "https://api-inference.huggingface.co";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Errors surfaced while summarizing a single chunk.
#[derive(Debug, Error)]
pub enum SummarizationClientError {
    /// Provider could not be reached or the client could not be built.
    #[error("Summarization provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate summary: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Generation settings applied to every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummarizationParams {
    /// Maximum summary length, in model tokens.
    pub max_length: u32,
    /// Minimum summary length, in model tokens.
    pub min_length: u32,
    /// Whether the decoder may sample; greedy/beam decoding when `false`.
    pub do_sample: bool,
}

impl Default for SummarizationParams {
    fn default() -> Self {
        Self {
            max_length: 150,
            min_length: 25,
            do_sample: false,
        }
    }
}

impl SummarizationParams {
    /// Derive generation settings from configuration. Sampling is always disabled.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_length: config.summary_max_length,
            min_length: config.summary_min_length,
            do_sample: false,
        }
    }
}

/// Interface implemented by summarization backends.
#[async_trait]
pub trait SummarizationClient: Send + Sync {
    /// Summarize a single chunk of text.
    async fn summarize(
        &self,
        text: &str,
        params: &SummarizationParams,
    ) -> Result<String, SummarizationClientError>;
}

/// Build the summarization client selected by configuration.
///
/// The returned client is meant to be created once at startup and shared for the process
/// lifetime.
pub fn build_summarization_client(
    config: &Config,
) -> Result<Arc<dyn SummarizationClient>, SummarizationClientError> {
    let http = build_http_client(config.summarization_timeout_secs)?;
    let client: Arc<dyn SummarizationClient> = match config.summarization_provider {
        SummarizationProvider::HuggingFace => Arc::new(HuggingFaceSummarizationClient {
            http,
            base_url: config
                .summarization_url
                .clone()
                .unwrap_or_else(|| DEFAULT_HUGGINGFACE_URL.to_string()),
            model: config.summarization_model.clone(),
            api_token: config.hf_api_token.clone(),
        }),
        SummarizationProvider::Ollama => Arc::new(OllamaSummarizationClient {
            http,
            base_url: config
                .summarization_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model: config.summarization_model.clone(),
        }),
    };
    tracing::info!(
        provider = ?config.summarization_provider,
        model = %config.summarization_model,
        "Summarization client initialized"
    );
    Ok(client)
}

fn build_http_client(timeout_secs: Option<u64>) -> Result<Client, SummarizationClientError> {
    let mut builder = Client::builder().user_agent("docdigest/summary");
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().map_err(|error| {
        SummarizationClientError::ProviderUnavailable(format!(
            "failed to construct HTTP client: {error}"
        ))
    })
}

struct HuggingFaceSummarizationClient {
    http: Client,
    base_url: String,
    model: String,
    api_token: Option<String>,
}

impl HuggingFaceSummarizationClient {
    fn endpoint(&self) -> String {
        format!("{}/models/{}", self.base_url.trim_end_matches('/'), self.model)
    }
}

#[derive(Debug, Deserialize)]
struct HuggingFaceSummary {
    summary_text: String,
}

#[async_trait]
impl SummarizationClient for HuggingFaceSummarizationClient {
    async fn summarize(
        &self,
        text: &str,
        params: &SummarizationParams,
    ) -> Result<String, SummarizationClientError> {
        let payload = json!({
            "inputs": text,
            "parameters": {
                "max_length": params.max_length,
                "min_length": params.min_length,
                "do_sample": params.do_sample,
            },
            "options": {
                "wait_for_model": true,
            }
        });

        let mut request = self.http.post(self.endpoint()).json(&payload);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|error| {
            SummarizationClientError::ProviderUnavailable(format!(
                "failed to reach summarization endpoint at {}: {error}",
                self.base_url
            ))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::GenerationFailed(format!(
                "summarization endpoint returned {status}: {body}"
            )));
        }

        let summaries: Vec<HuggingFaceSummary> = response.json().await.map_err(|error| {
            SummarizationClientError::InvalidResponse(format!(
                "failed to decode summarization response: {error}"
            ))
        })?;

        summaries
            .into_iter()
            .next()
            .map(|summary| summary.summary_text)
            .ok_or_else(|| {
                SummarizationClientError::InvalidResponse(
                    "summarization response contained no summaries".into(),
                )
            })
    }
}

struct OllamaSummarizationClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaSummarizationClient {
    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

fn build_ollama_prompt(text: &str, params: &SummarizationParams) -> String {
    format!(
        "Summarize the following text in a single paragraph of between {} and {} words. \
         Return only the summary.\n\n{}",
        params.min_length, params.max_length, text
    )
}

#[async_trait]
impl SummarizationClient for OllamaSummarizationClient {
    async fn summarize(
        &self,
        text: &str,
        params: &SummarizationParams,
    ) -> Result<String, SummarizationClientError> {
        let temperature = if params.do_sample { 0.7 } else { 0.0 };
        let payload = json!({
            "model": self.model,
            "prompt": build_ollama_prompt(text, params),
            "stream": false,
            "options": {
                "temperature": temperature,
                "num_predict": params.max_length,
            }
        });

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

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SummarizationClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
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

        Ok(body.response.trim().to_string())
    }
}
