use thiserror::Error;

use crate::media::nfo::NfoError;
use crate::quoting::QuoteError;
use crate::sandbox::SandboxViolation;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Quote(#[from] QuoteError),

    #[error(transparent)]
    Sandbox(#[from] SandboxViolation),

    #[error(transparent)]
    Nfo(#[from] NfoError),

    #[error("Script generation error: {0}")]
    ScriptGeneration(String),

    #[error("Remote channel error: {0}")]
    Channel(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
