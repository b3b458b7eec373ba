//! Error types for the trading desk

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persisted state under '{key}' is malformed: {reason}")]
    CorruptState { key: String, reason: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Broker not found: {0}")]
    BrokerNotFound(String),

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Position {0} is closed")]
    PositionClosed(String),

    #[error("No active connectivity: {0}")]
    NoConnectivity(String),

    #[error("Exposure block: {0} already has an open position")]
    ExposureBlock(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Desk is shut down")]
    Shutdown,
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        BotError::Config(e.to_string())
    }
}
