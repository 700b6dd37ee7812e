use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the ingestion pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Backend used to produce document summaries.
    pub summarization_provider: SummarizationProvider,
    /// Model identifier passed to the summarization provider.
    pub summarization_model: String,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the Ollama runtime, when an Ollama provider is selected.
    pub ollama_url: String,
    /// Character budget of a retrieval chunk.
    pub retrieval_chunk_size: usize,
    /// Characters shared between consecutive retrieval chunks.
    pub retrieval_chunk_overlap: usize,
    /// Character budget of a chunk fed to the summarizer.
    pub summary_chunk_size: usize,
    /// Characters shared between consecutive summarizer chunks.
    pub summary_chunk_overlap: usize,
    /// Documents at or below this many characters are summarized in a single pass.
    pub summary_single_pass_max_chars: usize,
    /// Upper bound on the characters sent to one summarization call.
    pub summary_max_input_chars: usize,
    /// What to do when a model call fails for one chunk.
    pub model_failure_policy: FailurePolicy,
    /// Retries attempted for transient model failures.
    pub model_max_retries: u32,
    /// Base delay for exponential retry backoff, in milliseconds.
    pub model_retry_backoff_ms: u64,
    /// Maximum concurrent model calls issued by one ingestion.
    pub inference_concurrency: usize,
    /// Wall-clock budget for a single ingestion, in seconds.
    pub ingestion_timeout_secs: u64,
}

/// Supported summarization backends.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SummarizationProvider {
    /// Deterministic lead-sentence summaries computed in-process.
    Extractive,
    /// Local Ollama runtime with greedy decoding.
    Ollama,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Deterministic hashed byte buckets, useful offline.
    Hash,
    /// Local Ollama runtime.
    Ollama,
}

/// Policy applied when a summarization or embedding call fails for part of a document.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Any model failure aborts the whole ingestion.
    #[default]
    Abort,
    /// Drop the failing chunk, continue, and report how many were skipped.
    Skip,
}

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Blank values are treated as absent so that `FOO=` in a `.env` file falls back to the
    /// default instead of failing to parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let config = Self {
            summarization_provider: parse_or(
                &get,
                "SUMMARIZATION_PROVIDER",
                SummarizationProvider::Extractive,
            )?,
            summarization_model: get("SUMMARIZATION_MODEL").unwrap_or_else(|| "llama3.2".into()),
            embedding_provider: parse_or(&get, "EMBEDDING_PROVIDER", EmbeddingProvider::Hash)?,
            embedding_model: get("EMBEDDING_MODEL").unwrap_or_else(|| "all-minilm".into()),
            embedding_dimension: parse_or(&get, "EMBEDDING_DIMENSION", 384)?,
            ollama_url: get("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.into()),
            retrieval_chunk_size: parse_or(&get, "RETRIEVAL_CHUNK_SIZE", 1000)?,
            retrieval_chunk_overlap: parse_or(&get, "RETRIEVAL_CHUNK_OVERLAP", 40)?,
            summary_chunk_size: parse_or(&get, "SUMMARY_CHUNK_SIZE", 600)?,
            summary_chunk_overlap: parse_or(&get, "SUMMARY_CHUNK_OVERLAP", 60)?,
            summary_single_pass_max_chars: parse_or(&get, "SUMMARY_SINGLE_PASS_MAX_CHARS", 3000)?,
            summary_max_input_chars: parse_or(&get, "SUMMARY_MAX_INPUT_CHARS", 4000)?,
            model_failure_policy: parse_or(&get, "MODEL_FAILURE_POLICY", FailurePolicy::Abort)?,
            model_max_retries: parse_or(&get, "MODEL_MAX_RETRIES", 2)?,
            model_retry_backoff_ms: parse_or(&get, "MODEL_RETRY_BACKOFF_MS", 250)?,
            inference_concurrency: parse_or(&get, "INFERENCE_CONCURRENCY", 4)?,
            ingestion_timeout_secs: parse_or(&get, "INGESTION_TIMEOUT_SECS", 300)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("EMBEDDING_DIMENSION", self.embedding_dimension),
            ("RETRIEVAL_CHUNK_SIZE", self.retrieval_chunk_size),
            ("SUMMARY_CHUNK_SIZE", self.summary_chunk_size),
            ("SUMMARY_MAX_INPUT_CHARS", self.summary_max_input_chars),
            ("INFERENCE_CONCURRENCY", self.inference_concurrency),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::InvalidValue(format!("{key} must be greater than zero")));
        }
        if self.ingestion_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "INGESTION_TIMEOUT_SECS must be greater than zero".into(),
            ));
        }
        if self.retrieval_chunk_overlap >= self.retrieval_chunk_size {
            return Err(ConfigError::InvalidValue(
                "RETRIEVAL_CHUNK_OVERLAP must be smaller than RETRIEVAL_CHUNK_SIZE".into(),
            ));
        }
        if self.summary_chunk_overlap >= self.summary_chunk_size {
            return Err(ConfigError::InvalidValue(
                "SUMMARY_CHUNK_OVERLAP must be smaller than SUMMARY_CHUNK_SIZE".into(),
            ));
        }
        Ok(())
    }

    /// Per-ingestion timeout as a [`Duration`].
    pub fn ingestion_timeout(&self) -> Duration {
        Duration::from_secs(self.ingestion_timeout_secs)
    }

    /// Base retry backoff as a [`Duration`].
    pub fn model_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.model_retry_backoff_ms)
    }
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl FromStr for SummarizationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "extractive" => Ok(Self::Extractive),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hash" => Ok(Self::Hash),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        summarization_provider = ?config.summarization_provider,
        embedding_provider = ?config.embedding_provider,
        embedding_dimension = config.embedding_dimension,
        failure_policy = ?config.model_failure_policy,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
