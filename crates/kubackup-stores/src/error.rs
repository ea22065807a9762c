//! Store error types

use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The local artifact to upload is missing or unreadable
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    /// Upload failed
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// Listing objects failed
    #[error("Listing failed: {0}")]
    ListFailed(String),

    /// Deleting an object failed
    #[error("Delete failed for {key}: {message}")]
    DeleteFailed { key: String, message: String },

    /// Downloading an object failed
    #[error("Download failed for {key}: {message}")]
    DownloadFailed { key: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Backend not registered
    #[error("Storage destination not found: {0}")]
    BackendNotFound(String),

    /// Tool not found
    #[error("Required tool not found: {0}")]
    ToolNotFound(String),

    /// Command execution failed
    #[error("Command failed: {command} - {message}")]
    CommandFailed { command: String, message: String },

    /// Unparseable tool output
    #[error("Unexpected output from {tool}: {message}")]
    UnexpectedOutput { tool: String, message: String },

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
