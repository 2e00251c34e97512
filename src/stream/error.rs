//! Streaming error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to the research service.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Query must not be empty")]
    EmptyQuery,
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Connection closed before the response completed")]
    ConnectionClosed,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Malformed frame: {0}")]
    Malformed(String),
    #[error("Research service error: {message}")]
    Remote {
        message: String,
        code: Option<String>,
        retry_after: Option<u64>,
    },
    #[error("Feedback request expired after {0:?}")]
    FeedbackExpired(Duration),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse error taxonomy used to pick fallback text and retry hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The transport never opened, or dropped underneath us.
    ConnectionFailure,
    /// The server emitted an error event.
    MidStream,
    /// Bad input or an undecodable response.
    Application,
    /// The server asked us to back off.
    RateLimited,
}

const RATE_LIMIT_CODES: &[&str] = &["RATE_LIMIT", "RATE_LIMITED", "TOO_MANY_REQUESTS"];

impl StreamError {
    /// Build the error for a server-emitted error event.
    pub fn remote(message: impl Into<String>, code: Option<String>, retry_after: Option<u64>) -> Self {
        Self::Remote {
            message: message.into(),
            code,
            retry_after,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ConnectionFailed(_) | Self::ConnectionClosed | Self::Transport(_) => {
                ErrorClass::ConnectionFailure
            }
            Self::Remote {
                code, retry_after, ..
            } => {
                let rate_code = code
                    .as_deref()
                    .map(|c| RATE_LIMIT_CODES.contains(&c.to_ascii_uppercase().as_str()))
                    .unwrap_or(false);
                if rate_code || retry_after.is_some() {
                    ErrorClass::RateLimited
                } else {
                    ErrorClass::MidStream
                }
            }
            Self::FeedbackExpired(_) => ErrorClass::MidStream,
            Self::EmptyQuery | Self::Malformed(_) | Self::Serialization(_) => {
                ErrorClass::Application
            }
        }
    }

    /// Whether the caller should be offered a manual retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::ConnectionFailure | ErrorClass::RateLimited
        )
    }

    /// Server error code, if the server sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Seconds the server asked us to wait before retrying.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::Remote { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
