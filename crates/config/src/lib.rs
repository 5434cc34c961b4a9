//! Configuration loading and validation.

pub mod constants;
pub mod settings;

pub use settings::{LedgerConfig, LlmConfig, RagConfig, ServerConfig, Settings, VectorStoreConfig};
pub use settings::load_settings;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<ConfigError> for ragqa_core::Error {
    fn from(err: ConfigError) -> Self {
        ragqa_core::Error::Configuration(err.to_string())
    }
}
