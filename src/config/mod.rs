// Configuration module
// All configuration comes from environment variables, resolved once at
// startup into an explicit Config passed into each client constructor.


use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com";
const DEFAULT_PINECONE_API_BASE: &str = "https://api.pinecone.io";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub pinecone: PineconeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub api_base: Url,
    pub embedding_model: String,
    pub embedding_dimension: u32,
    pub chat_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PineconeConfig {
    pub api_key: String,
    pub api_base: Url,
    pub index_name: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid URL in {0}: {1}")]
    InvalidUrl(&'static str, String),
    #[error("Invalid value in {0}: {1}")]
    InvalidVar(&'static str, String),
    #[error("Invalid index name: {0} (must be non-empty, lowercase alphanumeric or '-')")]
    InvalidIndexName(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
}

impl Config {
    /// Resolve configuration from process environment variables.
    ///
    /// Required: `OPENAI_API_KEY`, `PINECONE_API_KEY`, `PINECONE_INDEX_NAME`.
    /// Optional overrides: `OPENAI_API_BASE`, `PINECONE_API_BASE`,
    /// `EMBEDDING_DIMENSION`.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    /// Used by `from_env` and by tests that should not touch the process
    /// environment.
    #[inline]
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_api_key = require(&lookup, "OPENAI_API_KEY")?;
        let pinecone_api_key = require(&lookup, "PINECONE_API_KEY")?;
        let index_name = require(&lookup, "PINECONE_INDEX_NAME")?;

        let openai_api_base = parse_base_url(
            "OPENAI_API_BASE",
            lookup("OPENAI_API_BASE").as_deref(),
            DEFAULT_OPENAI_API_BASE,
        )?;
        let pinecone_api_base = parse_base_url(
            "PINECONE_API_BASE",
            lookup("PINECONE_API_BASE").as_deref(),
            DEFAULT_PINECONE_API_BASE,
        )?;

        let embedding_dimension = match lookup("EMBEDDING_DIMENSION") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(dim) => dim,
                Err(_) => return Err(ConfigError::InvalidVar("EMBEDDING_DIMENSION", raw)),
            },
            None => DEFAULT_EMBEDDING_DIMENSION,
        };

        let config = Self {
            openai: OpenAiConfig {
                api_key: openai_api_key,
                api_base: openai_api_base,
                embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
                embedding_dimension,
                chat_model: DEFAULT_CHAT_MODEL.to_string(),
            },
            pinecone: PineconeConfig {
                api_key: pinecone_api_key,
                api_base: pinecone_api_base,
                index_name,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pinecone.index_name.is_empty()
            || !self
                .pinecone
                .index_name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ConfigError::InvalidIndexName(
                self.pinecone.index_name.clone(),
            ));
        }

        if !(64..=4096).contains(&self.openai.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.openai.embedding_dimension,
            ));
        }

        Ok(())
    }
}

fn require<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

fn parse_base_url(
    name: &'static str,
    value: Option<&str>,
    default: &str,
) -> Result<Url, ConfigError> {
    let raw = value.unwrap_or(default);
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(name, format!("{raw}: {e}")))
}

/// Mask a secret for display, keeping only the last four characters.
#[inline]
pub fn redact(secret: &str) -> String {
    let len = secret.chars().count();
    if len <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(len - 4).collect();
    format!("****{tail}")
}
