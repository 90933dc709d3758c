use std::path::PathBuf;

use fortune_core::FortuneError;
use thiserror::Error;

use crate::loader::ValidationIssue;

/// Errors returned when loading or administering rule sets.
///
/// Evaluation itself never fails; these only surface from configuration paths.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rules path does not exist: {0}")]
    MissingPath(String),
    #[error("failed to read rules from {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rules from {path}: {message}")]
    Parse { path: String, message: String },
    #[error("duplicate rule identifier detected: {id}")]
    DuplicateRule { id: String },
    #[error("rule set has {} validation issue(s)", .0.len())]
    Invalid(Vec<ValidationIssue>),
    #[error("rule not found: {0}")]
    NotFound(String),
}

impl RuleError {
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RuleError::Io {
            path: path.into().display().to_string(),
            source,
        }
    }

    pub fn parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        RuleError::Parse {
            path: path.into().display().to_string(),
            message: message.into(),
        }
    }
}

impl From<RuleError> for FortuneError {
    fn from(value: RuleError) -> Self {
        match value {
            RuleError::Io { source, .. } => FortuneError::IoError(source),
            other => FortuneError::RuleConfiguration(other.to_string()),
        }
    }
}
