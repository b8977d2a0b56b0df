use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("download of {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsafe archive entry: {0}")]
    UnsafeArchiveEntry(String),
    #[error("archive error: {0}")]
    Archive(String),
}

impl DataError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DataError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("vectorizer error: {0}")]
    Vectorizer(String),
    #[error("model error: {0}")]
    Model(String),
    #[error("act called before any observation")]
    NoObservation,
    #[error("candidate source '{0}' is not supported by this agent")]
    UnsupportedCandidates(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl AgentError {
    pub fn vectorizer<E: std::fmt::Display>(err: E) -> Self {
        AgentError::Vectorizer(err.to_string())
    }

    pub fn model<E: std::fmt::Display>(err: E) -> Self {
        AgentError::Model(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("{field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}
