//! Error types for the pursuit crate

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("no saved brain at '{}'", path.display())]
    BrainNotFound { path: PathBuf },

    #[error("saved brain at '{}' is corrupt: {reason}", path.display())]
    CorruptBrain { path: PathBuf, reason: String },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when there simply is no saved brain yet, as opposed to a broken one.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::BrainNotFound { .. })
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptBrain {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io {
            operation: "IO operation".to_string(),
            source,
        }
    }
}
