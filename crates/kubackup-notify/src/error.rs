//! Notification errors

use thiserror::Error;

/// Result type alias using NotifyError
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Errors raised while sending a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The webhook URL is unusable
    #[error("Invalid webhook URL: {0}")]
    InvalidUrl(String),

    /// The request could not be sent
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status
    #[error("Webhook rejected notification (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
