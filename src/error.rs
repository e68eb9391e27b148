//! Error types for a3s-bridge
//!
//! Two layers: `BackendError` is what a platform client reports,
//! `AdapterError` is what flows through the dispatcher and handlers.
//! Both collapse into the closed `ErrorKind` taxonomy via
//! [`crate::translate`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// JSON-RPC: malformed request
pub const INVALID_REQUEST: i32 = -32600;
/// JSON-RPC: unknown method or tool
pub const METHOD_NOT_FOUND: i32 = -32601;
/// JSON-RPC: missing or mistyped arguments
pub const INVALID_PARAMS: i32 = -32602;
/// JSON-RPC: unexpected server-side failure
pub const INTERNAL_ERROR: i32 = -32603;
/// Entity does not exist on the backend
pub const NOT_FOUND: i32 = 404;
/// Backend rejected the credential
pub const UNAUTHORIZED: i32 = 401;
/// Backend reported some other failure
pub const UPSTREAM_ERROR: i32 = 502;

/// Closed set of failure categories surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing or invalid credential, fatal at startup
    ConfigurationError,
    /// Backend never became ready, fatal at startup
    InitTimeoutError,
    /// Malformed tool name or arguments
    InvalidRequest,
    /// Malformed domain input (e.g. an issue identifier)
    ValidationError,
    /// Backend reports the entity does not exist
    NotFoundError,
    /// Backend reports an authentication failure
    UnauthorizedError,
    /// Any other backend-reported failure
    UpstreamError,
    /// Unexpected or unclassified failure
    InternalError,
}

impl ErrorKind {
    /// Whether this kind must abort startup instead of being returned
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigurationError | Self::InitTimeoutError)
    }

    /// Stable name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "ConfigurationError",
            Self::InitTimeoutError => "InitTimeoutError",
            Self::InvalidRequest => "InvalidRequest",
            Self::ValidationError => "ValidationError",
            Self::NotFoundError => "NotFoundError",
            Self::UnauthorizedError => "UnauthorizedError",
            Self::UpstreamError => "UpstreamError",
            Self::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a backend client
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The platform answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (DNS, connect, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The backend does not implement this operation
    #[error("Operation not supported by {backend}: {operation}")]
    Unsupported { backend: String, operation: String },
}

impl BackendError {
    /// Build a status error
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Shorthand for a 404
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::status(404, message)
    }

    /// Reported HTTP status, if any
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::status(status.as_u16(), err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Result type alias for backend operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Errors produced anywhere inside the adapter
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Readiness handshake did not complete in time
    #[error("{backend} client initialization timed out after {}ms (limit {}ms){}",
        .elapsed.as_millis(),
        .timeout.as_millis(),
        .last_error.as_ref().map(|e| format!(": {}", e)).unwrap_or_default()
    )]
    InitTimeout {
        backend: String,
        elapsed: Duration,
        timeout: Duration,
        last_error: Option<String>,
    },

    /// Backend resources were already released
    #[error("{backend} client has been shut down")]
    Closed { backend: String },

    /// No descriptor registered under this name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// One or more required arguments were not supplied
    #[error("Missing required arguments for {tool}: {}", .missing.join(", "))]
    MissingArguments { tool: String, missing: Vec<String> },

    /// An argument is present but has the wrong shape
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    /// Domain input failed validation
    #[error("{0}")]
    Validation(String),

    /// A backend call failed
    #[error("{context}: {source}")]
    Backend {
        backend: String,
        context: String,
        #[source]
        source: BackendError,
    },

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdapterError {
    /// Wrap a backend failure with the operation that triggered it
    pub fn backend(backend: &str, context: impl Into<String>, source: BackendError) -> Self {
        Self::Backend {
            backend: backend.to_string(),
            context: context.into(),
            source,
        }
    }

    /// Taxonomy bucket of this error
    pub fn kind(&self) -> ErrorKind {
        crate::translate::classify(self)
    }

    /// JSON-RPC flavoured code for the server loop
    pub(crate) fn rpc_code(&self, kind: ErrorKind) -> i32 {
        match self {
            Self::UnknownTool(_) => METHOD_NOT_FOUND,
            Self::MissingArguments { .. } | Self::InvalidArgument { .. } => INVALID_PARAMS,
            _ => match kind {
                ErrorKind::InvalidRequest => INVALID_REQUEST,
                ErrorKind::ValidationError => INVALID_PARAMS,
                ErrorKind::NotFoundError => NOT_FOUND,
                ErrorKind::UnauthorizedError => UNAUTHORIZED,
                ErrorKind::UpstreamError => UPSTREAM_ERROR,
                ErrorKind::ConfigurationError
                | ErrorKind::InitTimeoutError
                | ErrorKind::InternalError => INTERNAL_ERROR,
            },
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("Serialization error: {}", err))
    }
}

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Caller-facing error: a kind plus a plain-text message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Taxonomy bucket
    pub kind: ErrorKind,
    /// Human-readable description
    pub message: String,
    /// JSON-RPC error code
    pub code: i32,
}

impl ErrorEnvelope {
    /// Create a new envelope
    pub fn new(kind: ErrorKind, code: i32, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code,
        }
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ErrorEnvelope {}
