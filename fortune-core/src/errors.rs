use std::io;

use thiserror::Error;

/// Result type used across the fortune core crate.
pub type Result<T> = std::result::Result<T, FortuneError>;

/// Canonical error representation shared by the fortune crates.
#[derive(Debug, Error)]
pub enum FortuneError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("deserialization error: {0}")]
    DeserializationError(String),

    #[error("invalid rule configuration: {0}")]
    RuleConfiguration(String),

    #[error("message catalog error: {0}")]
    CatalogError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("general error: {0}")]
    GeneralError(String),
}

impl From<serde_json::Error> for FortuneError {
    fn from(err: serde_json::Error) -> Self {
        FortuneError::DeserializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for FortuneError {
    fn from(err: serde_yaml::Error) -> Self {
        FortuneError::DeserializationError(err.to_string())
    }
}

impl From<anyhow::Error> for FortuneError {
    fn from(err: anyhow::Error) -> Self {
        FortuneError::GeneralError(err.to_string())
    }
}

/// Dedicated configuration error used by the configuration module.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {key}: {value}")]
    InvalidEnvVar { key: String, value: String },
}

impl From<ConfigError> for FortuneError {
    fn from(value: ConfigError) -> Self {
        FortuneError::ConfigError(value.to_string())
    }
}
