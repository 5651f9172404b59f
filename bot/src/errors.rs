//! Error types for the deploy bot

use thiserror::Error;

/// Main error type for the deploy bot
#[derive(Error, Debug)]
pub enum BotError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Missing environment variable: {0}")]
    MissingConfig(&'static str),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Dictionary error: {0}")]
    DictionaryError(String),

    #[error("Discord API error: {status} - {body}")]
    DiscordError { status: u16, body: String },

    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("Audit webhook error: {0}")]
    AuditError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}
