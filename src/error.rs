use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Input bytes that do not form a well-formed XML document.
///
/// This is the only fatal parse failure: no partial model is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed XML at byte {offset}: {message}")]
pub struct MalformedXmlError {
    /// Byte offset into the input where the problem was detected
    pub offset: usize,
    /// Message from the underlying tokenizer or tree builder
    pub message: String,
}

impl MalformedXmlError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Errors raised immediately by the model builder API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Name collision: '{name}' is already declared in {scope}")]
    NameCollision { scope: String, name: String },

    #[error("Unknown handle: {0}")]
    UnknownHandle(String),
}

/// Errors raised while locating model documents inside bundles
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No model version found in bundle: {path}")]
    NoModelVersion { path: PathBuf },

    #[error("Current model version '{version}' is missing from bundle {bundle}")]
    VersionNotFound { bundle: PathBuf, version: String },

    #[error("Version document {path} is not valid: {source}")]
    MalformedVersionDocument {
        path: PathBuf,
        #[source]
        source: MalformedXmlError,
    },
}

/// Main application error type that encompasses all possible failure modes
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    MalformedXml(#[from] MalformedXmlError),

    #[error("Model build error: {0}")]
    Build(#[from] BuildError),

    #[error("Bundle error: {0}")]
    Bundle(#[from] BundleError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system traversal error: {path} - {reason}")]
    FileSystemTraversal { path: PathBuf, reason: String },

    #[error("Output error: {path} - {details}")]
    Output { path: PathBuf, details: String },

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ConfigError> for ModelError {
    fn from(err: ConfigError) -> Self {
        ModelError::Config(err.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ModelError>;

/// Builder result type alias
pub type BuildResult<T> = std::result::Result<T, BuildError>;

/// Bundle result type alias
pub type BundleResult<T> = std::result::Result<T, BundleError>;
