//! Error types for Telegram Bot API calls.
//!
//! Separates transport failures (network, timeout, undecodable body) from
//! API-level rejections, which carry the `error_code`, `description` and
//! optional `retry_after` hint returned by Telegram.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A request Telegram answered with `"ok": false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    /// Telegram's numeric error code (mirrors the HTTP status).
    pub error_code: i64,
    /// Human-readable description, e.g. `"Unauthorized"`.
    pub description: String,
    /// Seconds to wait before retrying (flood control), when present.
    pub retry_after: Option<u64>,
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.error_code, self.description)?;
        if let Some(secs) = self.retry_after {
            write!(f, " (retry after {secs}s)")?;
        }
        Ok(())
    }
}

/// Error type for all Bot API operations.
#[derive(Debug, Error)]
pub enum BotApiError {
    /// Connection, TLS or protocol failure reported by reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request did not complete within the per-call timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The response body was not a valid Bot API envelope.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Telegram rejected the request.
    #[error("Telegram API error: {0}")]
    Api(ApiFailure),

    /// Telegram answered `"ok": true` without a `result` field.
    #[error("response marked ok but carried no result")]
    MissingResult,

    /// The shared shutdown signal fired before the request completed.
    #[error("request cancelled by shutdown")]
    Cancelled,

    /// The I/O runtime could not be started.
    #[error("I/O runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// The I/O thread went away before replying.
    #[error("I/O worker stopped before replying")]
    WorkerGone,
}

impl BotApiError {
    /// The flood-control wait requested by Telegram, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Api(failure) => failure
                .retry_after
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            _ => None,
        }
    }

    /// Whether Telegram rejected the bot token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(failure) if failure.error_code == 401)
    }
}

/// Convenience Result type alias for Bot API operations.
pub type BotApiResult<T> = Result<T, BotApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(code: i64, description: &str, retry_after: Option<u64>) -> BotApiError {
        BotApiError::Api(ApiFailure {
            error_code: code,
            description: description.to_string(),
            retry_after,
        })
    }

    #[test]
    fn api_error_display() {
        let err = failure(400, "Bad Request: message text is empty", None);
        assert_eq!(
            err.to_string(),
            "Telegram API error: 400 - Bad Request: message text is empty"
        );
    }

    #[test]
    fn api_error_display_with_retry_after() {
        let err = failure(429, "Too Many Requests: retry after 7", Some(7));
        assert_eq!(
            err.to_string(),
            "Telegram API error: 429 - Too Many Requests: retry after 7 (retry after 7s)"
        );
    }

    #[test]
    fn retry_after_only_for_positive_hints() {
        assert_eq!(
            failure(429, "Too Many Requests", Some(3)).retry_after(),
            Some(Duration::from_secs(3))
        );
        assert_eq!(failure(429, "Too Many Requests", Some(0)).retry_after(), None);
        assert_eq!(failure(400, "Bad Request", None).retry_after(), None);
        assert_eq!(BotApiError::Cancelled.retry_after(), None);
    }

    #[test]
    fn unauthorized_detection() {
        assert!(failure(401, "Unauthorized", None).is_unauthorized());
        assert!(!failure(403, "Forbidden: bot was kicked", None).is_unauthorized());
        assert!(!BotApiError::Timeout(Duration::from_secs(30)).is_unauthorized());
    }

    #[test]
    fn json_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
        let err: BotApiError = serde_err.into();
        assert!(err.to_string().starts_with("JSON error:"));
    }
}
