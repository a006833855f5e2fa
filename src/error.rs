use thiserror::Error;

/// Errors crossing component boundaries. Conversation handlers decide which
/// of these reach the user and which are only logged.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("payment provider error: {0}")]
    Provider(String),

    #[error("telegram request error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Push notification that cannot be traced back to a user.
    #[error("malformed payment callback: {0}")]
    MalformedCallback(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest_middleware::Error> for BotError {
    fn from(e: reqwest_middleware::Error) -> Self {
        BotError::Provider(e.to_string())
    }
}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        BotError::Provider(e.to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(e: serde_json::Error) -> Self {
        BotError::Provider(e.to_string())
    }
}
