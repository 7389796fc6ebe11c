use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MODEL: &str = "facebook/bart-large-cnn";
const DEFAULT_CHUNK_MAX_CHARS: usize = 1024;
const DEFAULT_SUMMARY_MAX_LENGTH: u32 = 150;
const DEFAULT_SUMMARY_MIN_LENGTH: u32 = 25;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the docdigest server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the HTTP server binds on all interfaces.
    pub server_port: u16,
    /// Backend used to summarize each chunk.
    pub summarization_provider: SummarizationProvider,
    /// Model identifier passed to the summarization backend.
    pub summarization_model: String,
    /// Optional base URL override for the summarization backend.
    pub summarization_url: Option<String>,
    /// Optional bearer token for the Hugging Face Inference API.
    pub hf_api_token: Option<String>,
    /// Optional HTTP timeout for a single summarization call.
    pub summarization_timeout_secs: Option<u64>,
    /// Upper bound on the generated summary length, in model tokens.
    pub summary_max_length: u32,
    /// Lower bound on the generated summary length, in model tokens.
    pub summary_min_length: u32,
    /// Soft upper bound on chunk length, in characters.
    pub chunk_max_chars: usize,
    /// Tesseract executable used for OCR.
    pub tesseract_cmd: String,
    /// Tesseract language code.
    pub ocr_language: String,
    /// Maximum accepted request body size in bytes.
    pub max_upload_bytes: usize,
}

/// Supported summarization backends.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SummarizationProvider {
    /// Hugging Face Inference API (or a compatible self-hosted endpoint).
    HuggingFace,
    /// Local Ollama runtime.
    Ollama,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_PORT,
            summarization_provider: SummarizationProvider::HuggingFace,
            summarization_model: DEFAULT_MODEL.to_string(),
            summarization_url: None,
            hf_api_token: None,
            summarization_timeout_secs: None,
            summary_max_length: DEFAULT_SUMMARY_MAX_LENGTH,
            summary_min_length: DEFAULT_SUMMARY_MIN_LENGTH,
            chunk_max_chars: DEFAULT_CHUNK_MAX_CHARS,
            tesseract_cmd: "tesseract".to_string(),
            ocr_language: "eng".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let config = Self {
            server_port: parse_or(get("PORT"), "PORT", defaults.server_port)?,
            summarization_provider: get("SUMMARIZATION_PROVIDER")
                .map(|value| {
                    value.parse().map_err(|()| {
                        ConfigError::InvalidValue("SUMMARIZATION_PROVIDER".to_string())
                    })
                })
                .transpose()?
                .unwrap_or(defaults.summarization_provider),
            summarization_model: get("SUMMARIZATION_MODEL").unwrap_or(defaults.summarization_model),
            summarization_url: get("SUMMARIZATION_URL"),
            hf_api_token: get("HF_API_TOKEN"),
            summarization_timeout_secs: get("SUMMARIZATION_TIMEOUT_SECS")
                .map(|value| {
                    value.parse().map_err(|_| {
                        ConfigError::InvalidValue("SUMMARIZATION_TIMEOUT_SECS".into())
                    })
                })
                .transpose()?,
            summary_max_length: parse_or(
                get("SUMMARY_MAX_LENGTH"),
                "SUMMARY_MAX_LENGTH",
                defaults.summary_max_length,
            )?,
            summary_min_length: parse_or(
                get("SUMMARY_MIN_LENGTH"),
                "SUMMARY_MIN_LENGTH",
                defaults.summary_min_length,
            )?,
            chunk_max_chars: parse_or(
                get("CHUNK_MAX_CHARS"),
                "CHUNK_MAX_CHARS",
                defaults.chunk_max_chars,
            )?,
            tesseract_cmd: get("TESSERACT_CMD").unwrap_or(defaults.tesseract_cmd),
            ocr_language: get("OCR_LANGUAGE").unwrap_or(defaults.ocr_language),
            max_upload_bytes: parse_or(
                get("MAX_UPLOAD_BYTES"),
                "MAX_UPLOAD_BYTES",
                defaults.max_upload_bytes,
            )?,
        };

        if config.chunk_max_chars == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_MAX_CHARS".into()));
        }
        if config.summary_min_length > config.summary_max_length {
            return Err(ConfigError::InvalidValue("SUMMARY_MIN_LENGTH".into()));
        }

        Ok(config)
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::str::FromStr for SummarizationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment and install it in the global cache.
///
/// A `.env` file in the working directory is honoured when present. Calling this more than once
/// keeps the first loaded configuration.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    Ok(CONFIG.get_or_init(|| config))
}

impl Config {
    /// Emit the effective settings. Call once a tracing subscriber is installed.
    pub fn log_summary(&self) {
        tracing::info!(
            port = self.server_port,
            provider = ?self.summarization_provider,
            model = %self.summarization_model,
            chunk_max_chars = self.chunk_max_chars,
            tesseract = %self.tesseract_cmd,
            max_upload_bytes = self.max_upload_bytes,
            "Loaded configuration"
        );
    }
}
