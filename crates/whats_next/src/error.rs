use axum::http::StatusCode;
use thiserror::Error;

/// Failures a responder reports instead of a reply body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("Server is shutting down")]
    ShuttingDown,

    #[error("Timeout waiting for input")]
    Timeout,

    #[error("Input channel closed")]
    QueueClosed,

    /// One or more input sessions failed; the messages are newline-joined.
    #[error("error:{0}")]
    Session(String),

    #[error("failed to compose reply: {0}")]
    Compose(String),
}

impl BrokerError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::QueueClosed | Self::Session(_) | Self::Compose(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
