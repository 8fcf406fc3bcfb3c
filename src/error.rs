//! Error handling for reconkit
//!
//! Two layers of errors exist. [`ExecError`] covers the few cases where the
//! executor itself cannot do its job (the binary, container runtime or image
//! is missing). [`ToolError`] is what the facade works with internally.
//! Neither ever reaches a caller as a fault: the facade folds every error into
//! a [`crate::result::ToolResult`] tagged with an [`ErrorKind`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failures of the executor itself, distinct from a tool failing.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("binary '{program}' not found in PATH; install it or enable container mode for this tool")]
    BinaryNotFound { program: String },

    #[error("container runtime '{runtime}' not found; install Docker or switch this tool to native mode")]
    RuntimeNotFound { runtime: String },

    #[error("container image '{image}' is not available: {detail}")]
    ImageNotFound { image: String, detail: String },

    #[error("failed to start process: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Main error type for facade operations
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("target '{target}' is out of scope: {reason}")]
    ScopeViolation { target: String, reason: String },

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    MissingTool(String),

    #[error("input file not found: {0}")]
    MissingInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error taxonomy carried inside result envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ScopeViolation,
    InvalidParams,
    MissingTool,
    Timeout,
    NonZeroExit,
    ParseFailure,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ScopeViolation => "scope_violation",
            ErrorKind::InvalidParams => "invalid_params",
            ErrorKind::MissingTool => "missing_tool",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NonZeroExit => "non_zero_exit",
            ErrorKind::ParseFailure => "parse_failure",
            ErrorKind::Internal => "internal",
        }
    }

    /// Whether retrying the same call could plausibly succeed.
    ///
    /// Scope violations, bad parameters and missing tools never change
    /// between attempts, so automated callers should not retry them.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::NonZeroExit)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToolError {
    /// Map an error onto the envelope taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::ScopeViolation { .. } => ErrorKind::ScopeViolation,
            ToolError::InvalidParams(_) | ToolError::MissingInput(_) => ErrorKind::InvalidParams,
            ToolError::MissingTool(_) => ErrorKind::MissingTool,
            ToolError::Exec(ExecError::Spawn(_)) => ErrorKind::Internal,
            ToolError::Exec(_) => ErrorKind::MissingTool,
            ToolError::Config(_) | ToolError::Io(_) => ErrorKind::Internal,
        }
    }
}
