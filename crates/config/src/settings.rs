//! Application settings, loaded the way the teacher's `load_settings` loads
//! its `Settings`: a base file, an environment-specific file, then
//! environment variables, then validation.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{endpoints, rag};
use crate::ConfigError;

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Retrieval-fusion configuration (§4.5, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,
    #[serde(default = "default_feedback_weight")]
    pub feedback_weight: f64,
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,
}

fn default_similarity_threshold() -> f64 {
    rag::DEFAULT_SIMILARITY_THRESHOLD
}
fn default_semantic_weight() -> f64 {
    rag::SEMANTIC_WEIGHT
}
fn default_keyword_weight() -> f64 {
    rag::KEYWORD_WEIGHT
}
fn default_feedback_weight() -> f64 {
    rag::FEEDBACK_WEIGHT
}
fn default_max_hops() -> u32 {
    rag::DEFAULT_MAX_HOPS
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            semantic_weight: default_semantic_weight(),
            keyword_weight: default_keyword_weight(),
            feedback_weight: default_feedback_weight(),
            max_hops: default_max_hops(),
        }
    }
}

/// Vector index connection details (§6 `PINECONE_*` / `QDRANT_*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_embedding_dim")]
    pub vector_dim: usize,
}

fn default_vector_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.clone()
}
fn default_embedding_dim() -> usize {
    rag::DEFAULT_EMBEDDING_DIM
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_vector_endpoint(),
            collection: String::new(),
            api_key: None,
            vector_dim: default_embedding_dim(),
        }
    }
}

/// LLM backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_endpoint() -> String {
    endpoints::OLLAMA_DEFAULT.clone()
}
fn default_llm_model() -> String {
    "llama3.1:8b".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Feedback ledger persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_url")]
    pub database_url: String,
}

fn default_ledger_url() -> String {
    std::env::var("LEDGER_DATABASE_URL").unwrap_or_else(|_| "sqlite://ledger.db".to_string())
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: default_ledger_url(),
        }
    }
}

/// Main application settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.rag.similarity_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "rag.similarity_threshold".to_string(),
                message: "must be within [0, 1]".to_string(),
            });
        }
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "must be nonzero".to_string(),
            });
        }
        Ok(())
    }
}

/// Load settings from `config/default.toml`, an optional `config/{env}.toml`,
/// then `RAGQA_`-prefixed environment variables, then validate.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("RAGQA")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_spec_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.rag.similarity_threshold, 0.5);
        assert_eq!(settings.rag.max_hops, 1);
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let mut settings = Settings::default();
        settings.rag.similarity_threshold = 1.5;
        assert!(settings.validate().is_err());
    }
}
