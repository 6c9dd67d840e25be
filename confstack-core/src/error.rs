use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("config validation error: {0}")]
    Validation(String),

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("environment file not found: {0}")]
    EnvFileNotFound(PathBuf),

    #[error("failed to read environment file '{path}': {source}")]
    EnvFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse environment file '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("configuration factory failed: {0}")]
    Factory(String),
}
