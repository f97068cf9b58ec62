use std::path::PathBuf;
use thiserror::Error;

/// Main error type for runfuse
#[derive(Error, Debug)]
pub enum RunfuseError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Malformed line in a run or attribute file
    #[error("Parse error in {}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The same external document id appears twice for one topic
    #[error("Duplicate document {docid} in topic {topic}")]
    DuplicateDocument { topic: String, docid: String },

    /// The same topic was added twice to one run
    #[error("Duplicate topic {topic} in run")]
    DuplicateTopic { topic: String },

    /// A document has no usable tie-break key
    #[error("Cannot derive tie-break key for document {docid}: {message}")]
    TieBreakKey { docid: String, message: String },

    /// Invalid argument to a rescoring, rerank or merge operation
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },
}

impl RunfuseError {
    pub(crate) fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for runfuse operations
pub type Result<T> = std::result::Result<T, RunfuseError>;
