use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::document::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::error::{RagError, Result};

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 40;
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
pub const DEFAULT_MAX_CONTEXT_CHUNKS: usize = 4;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for one remote provider, read from `{PROVIDER}_*` variables.
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub model: String,
    pub api_url: String,
    pub timeout: Duration,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            api_url: api_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn from_env(provider: &str) -> Result<Self> {
        Self::from_lookup(provider, &|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(provider: &str, lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = provider.to_uppercase();

        let key_var = format!("{}_API_KEY", prefix);
        let api_key = lookup(&key_var)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| RagError::Config(format!("{} environment variable is required", key_var)))?;

        let (default_model, default_url) = match provider {
            "openai" => ("text-embedding-3-small", "https://api.openai.com/v1"),
            "deepseek" => ("deepseek-chat", "https://api.deepseek.com/v1"),
            _ => ("", ""),
        };
        let model = lookup(&format!("{}_MODEL", prefix)).unwrap_or_else(|| default_model.to_string());
        let api_url = lookup(&format!("{}_API_URL", prefix)).unwrap_or_else(|| default_url.to_string());
        if api_url.is_empty() {
            return Err(RagError::Config(format!("{}_API_URL must be set", prefix)));
        }

        let timeout_secs = parse_var(lookup, &format!("{}_TIMEOUT_SECS", prefix), DEFAULT_TIMEOUT_SECS)?;

        Ok(Self {
            api_key,
            model,
            api_url: api_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Tuning knobs for chunking, batching and retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RagSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_batch_size: usize,
    pub max_concurrency: usize,
    pub max_context_chunks: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_context_chunks: DEFAULT_MAX_CONTEXT_CHUNKS,
        }
    }
}

impl RagSettings {
    pub fn builder() -> RagSettingsBuilder {
        RagSettingsBuilder::default()
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let settings = Self {
            chunk_size: parse_var(lookup, "RAG_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_var(lookup, "RAG_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            max_batch_size: parse_var(lookup, "RAG_MAX_BATCH_SIZE", defaults.max_batch_size)?,
            max_concurrency: parse_var(lookup, "RAG_MAX_CONCURRENCY", defaults.max_concurrency)?,
            max_context_chunks: parse_var(lookup, "RAG_MAX_CONTEXT_CHUNKS", defaults.max_context_chunks)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.max_batch_size == 0 {
            return Err(RagError::Config("max_batch_size must be greater than zero".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(RagError::Config("max_concurrency must be greater than zero".to_string()));
        }
        if self.max_context_chunks == 0 {
            return Err(RagError::Config("max_context_chunks must be greater than zero".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RagSettingsBuilder {
    settings: RagSettings,
}

impl RagSettingsBuilder {
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.settings.chunk_size = size;
        self
    }

    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.settings.chunk_overlap = overlap;
        self
    }

    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.settings.max_batch_size = size;
        self
    }

    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.settings.max_concurrency = limit;
        self
    }

    pub fn max_context_chunks(mut self, k: usize) -> Self {
        self.settings.max_context_chunks = k;
        self
    }

    pub fn build(self) -> Result<RagSettings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

/// Everything the server needs at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub embedding: ProviderConfig,
    pub chat: ProviderConfig,
    pub rag: RagSettings,
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// Call `dotenv().ok()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            port: parse_var(&lookup, "PORT", DEFAULT_PORT)?,
            embedding: ProviderConfig::from_lookup("openai", &lookup)?,
            chat: ProviderConfig::from_lookup("deepseek", &lookup)?,
            rag: RagSettings::from_lookup(&lookup)?,
        })
    }
}

fn parse_var<T, F>(lookup: &F, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| RagError::Config(format!("invalid value {:?} for {}: {}", raw, name, e))),
        _ => Ok(default),
    }
}
