//! Error types for databricks-mcp
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::dispatch::DispatchError;

/// All error types that can occur while serving a tool call
#[derive(Debug, Error)]
pub enum DatabricksMcpError {
    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credentials rejected by the workspace (401/403)
    #[error("Authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    /// Connection-level failure talking to the workspace
    #[error("Transport error: {0}")]
    Transport(String),

    /// A remote operation did not finish within its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Workspace rejected the request (bad SQL, unknown resource, bad parameters)
    #[error("Remote validation error [{error_code}]: {message}")]
    RemoteValidation { error_code: String, message: String },

    /// Any other non-success response from the workspace
    #[error("Remote API error {status}: {message}")]
    RemoteApi { status: u16, message: String },

    /// A requested object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Tool arguments failed to parse or were inconsistent
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// SQL refused by the local safety checks
    #[error("Query validation failed: {0}")]
    QueryRejected(String),

    /// Worker-thread infrastructure failure inside the dispatcher
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Tool registry error (unknown tool and friends)
    #[error("Tool error: {0}")]
    Tool(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DatabricksMcpError {
    /// Stable identifier reported as `kind` in error payloads
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Auth { .. } => "authentication",
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::RemoteValidation { .. } => "remote_validation",
            Self::RemoteApi { .. } => "remote_api",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::QueryRejected(_) => "query_rejected",
            Self::Dispatch(_) => "dispatch",
            Self::Tool(_) => "tool",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

impl From<reqwest::Error> for DatabricksMcpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::RemoteApi {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                message: format!("Failed to decode response: {}", err),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Result type alias for databricks-mcp operations
pub type Result<T> = std::result::Result<T, DatabricksMcpError>;
