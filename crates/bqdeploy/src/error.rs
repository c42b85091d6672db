// Error types for deployment operations
use std::path::PathBuf;

use crate::template::TemplateError;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("resource already exists: {resource}")]
    Conflict { resource: String },

    #[error("permission denied for {resource}: {message}")]
    PermissionDenied { resource: String, message: String },

    #[error("failed to read SQL file {path}: {source}")]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed template {path}: {source}")]
    MalformedTemplate {
        path: PathBuf,
        #[source]
        source: TemplateError,
    },

    #[error("invalid views layout at {path}: {message}")]
    InvalidLayout { path: PathBuf, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("BigQuery API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

pub type Result<T> = std::result::Result<T, DeployError>;
