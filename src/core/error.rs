//! Custom error types for Eventflow
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for Eventflow operations
#[derive(Error, Debug)]
pub enum EventflowError {
    /// Completion service failures and schema-nonconforming output
    #[error("Completion error: {0}")]
    Adapter(String),

    /// Document store read/write failures
    #[error("Store error: {0}")]
    Store(String),

    /// Conversation shape violations (unmatched tool results, missing messages)
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Checkpoint persistence errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Model not available
    #[error("Model '{0}' not available in Ollama. Run: ollama pull {0}")]
    ModelNotFound(String),

    /// Another run currently owns this thread
    #[error("Thread '{0}' is already running")]
    ThreadBusy(String),

    /// Resume requested for a thread that is not suspended
    #[error("Thread '{0}' has no pending interrupt")]
    NotInterrupted(String),

    /// The thread is suspended waiting for an approval decision
    #[error("Thread '{0}' is waiting for approval")]
    AwaitingApproval(String),

    /// No checkpoint exists for the thread
    #[error("Unknown thread '{0}'")]
    UnknownThread(String),

    /// The run executed more nodes than allowed
    #[error("Step limit of {0} nodes exceeded")]
    StepLimit(usize),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Eventflow operations
pub type Result<T> = std::result::Result<T, EventflowError>;

impl EventflowError {
    /// Create a completion adapter error
    pub fn adapter(msg: impl Into<String>) -> Self {
        Self::Adapter(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a protocol violation
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a checkpoint error
    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Protocol violations fail a run outright instead of being reported
    /// back into the conversation.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}
