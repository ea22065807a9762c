//! Error types for kubackup

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using KubackupError
pub type Result<T> = std::result::Result<T, KubackupError>;

/// Main error type for kubackup operations
#[derive(Debug, Error)]
pub enum KubackupError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Cluster-related errors
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// Dump-related errors
    #[error(transparent)]
    Dump(#[from] DumpError),

    /// Hook-related errors
    #[error(transparent)]
    Hook(#[from] HookError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// Unknown backup target
    #[error("Unknown backup target: {0}")]
    UnknownTarget(String),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Cluster-related errors
#[derive(Debug, Error)]
pub enum ClusterError {
    /// kubectl is not installed
    #[error("kubectl not found: {0}")]
    KubectlNotFound(String),

    /// A kubectl invocation failed
    #[error("kubectl {command} failed: {message}")]
    CommandFailed { command: String, message: String },

    /// kubectl output could not be parsed
    #[error("Unexpected kubectl output: {0}")]
    UnexpectedOutput(String),

    /// Pod does not exist
    #[error("Pod {namespace}/{name} not found")]
    PodNotFound { namespace: String, name: String },

    /// Selector matched nothing
    #[error("No pods match selector '{selector}' in namespace {namespace}")]
    NoMatchingPods { namespace: String, selector: String },

    /// Pods exist but none can be exec'd into
    #[error("No running and ready pod for target {target} ({candidates} candidate(s))")]
    NoRunningPod { target: String, candidates: usize },

    /// Requested container is not part of the pod
    #[error("Container {container} not found in pod {pod}")]
    ContainerNotFound { pod: String, container: String },
}

/// Dump-related errors
#[derive(Debug, Error)]
pub enum DumpError {
    /// The dump command exited unsuccessfully
    #[error("Dump command failed in {pod} (exit {code:?}): {stderr}")]
    CommandFailed {
        pod: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The dump command produced nothing
    #[error("Dump of {pod} produced no output")]
    EmptyOutput { pod: String },

    /// The dump exceeded its time limit
    #[error("Dump of {pod} timed out after {seconds}s")]
    Timeout { pod: String, seconds: u64 },

    /// No command could be built for the target
    #[error("Cannot build dump command for {target}: {reason}")]
    InvalidCommand { target: String, reason: String },

    /// Local compression failed
    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Hook-related errors
#[derive(Debug, Error)]
pub enum HookError {
    /// Hook failed to execute or exited non-zero
    #[error("Hook '{command}' failed at stage {stage}: {message}")]
    ExecutionFailed {
        stage: String,
        command: String,
        message: String,
    },

    /// Hook exceeded its timeout
    #[error("Hook '{command}' at stage {stage} timed out after {seconds}s")]
    Timeout {
        stage: String,
        command: String,
        seconds: u64,
    },
}

impl KubackupError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}
