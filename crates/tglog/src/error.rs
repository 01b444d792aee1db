//! Error types for the log sink.

use std::time::Duration;
use telegram_bot_api::BotApiError;
use thiserror::Error;

/// Errors produced while configuring the sink or delivering a batch.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Telegram rejected the bot token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Flood control; the batch must wait before it is sent again.
    #[error("rate limited, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Telegram rejected the request for another reason.
    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },

    /// Network failure, timeout or undecodable response.
    #[error("transport error: {0}")]
    Transport(#[source] BotApiError),

    /// The shutdown signal fired while a request was in flight.
    #[error("request cancelled by shutdown")]
    Cancelled,

    /// The sink stopped forwarding after a fatal error or shutdown.
    #[error("sink is halted")]
    Halted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SinkError {
    /// The wait requested by a rate-limit response.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Errors after which the sink must stop talking to Telegram.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl From<BotApiError> for SinkError {
    fn from(err: BotApiError) -> Self {
        if err.is_unauthorized() {
            let description = match &err {
                BotApiError::Api(failure) => failure.description.clone(),
                _ => String::new(),
            };
            return Self::Unauthorized(description);
        }
        if let Some(retry_after) = err.retry_after() {
            return Self::RateLimited { retry_after };
        }
        match err {
            BotApiError::Api(failure) => Self::Api {
                code: failure.error_code,
                description: failure.description,
            },
            BotApiError::Cancelled => Self::Cancelled,
            other => Self::Transport(other),
        }
    }
}

/// Convenience Result type alias for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;
