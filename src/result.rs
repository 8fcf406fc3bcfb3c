//! Uniform result envelope returned by every operation

use crate::error::{ErrorKind, ToolError};
use crate::exec::ExecutionResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upper bound for stderr/stdout excerpts carried in failure envelopes
pub const EXCERPT_CHARS: usize = 2000;

/// Error half of an envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

/// `{success, <payload fields>, error?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    /// Operation name, e.g. `recon.ping_sweep`
    pub tool: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl ToolResult {
    /// Successful result with a payload
    pub fn ok<S: Into<String>>(tool: S, payload: Map<String, Value>) -> Self {
        Self {
            success: true,
            tool: tool.into(),
            payload,
            error: None,
        }
    }

    /// Failed result with no payload
    pub fn failure<S: Into<String>, M: Into<String>>(tool: S, kind: ErrorKind, message: M) -> Self {
        Self {
            success: false,
            tool: tool.into(),
            payload: Map::new(),
            error: Some(ErrorInfo {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn from_error<S: Into<String>>(tool: S, error: &ToolError) -> Self {
        Self::failure(tool, error.kind(), error.to_string())
    }

    /// Timeout: partial output is kept in the payload
    pub fn timeout<S: Into<String>>(tool: S, timeout_s: u64, execution: &ExecutionResult) -> Self {
        let mut result = Self::failure(tool, ErrorKind::Timeout, format!("timeout after {}s", timeout_s));
        result.insert("exit_code", execution.exit_code);
        result.insert("stdout", execution.stdout_lossy());
        result.insert("stderr", execution.stderr_lossy());
        result.insert("output_truncated", execution.output_truncated);
        result
    }

    /// Non-zero exit: stderr verbatim as the message, plus stdout
    pub fn non_zero_exit<S: Into<String>>(tool: S, execution: &ExecutionResult) -> Self {
        let stderr = execution.stderr_lossy();
        let message = if stderr.trim().is_empty() {
            format!("process exited with code {}", execution.exit_code)
        } else {
            excerpt(&stderr, EXCERPT_CHARS)
        };

        let mut result = Self::failure(tool, ErrorKind::NonZeroExit, message);
        result.insert("exit_code", execution.exit_code);
        result.insert("stdout", excerpt(&execution.stdout_lossy(), EXCERPT_CHARS));
        result.insert("stderr", stderr);
        result
    }

    /// Add a payload field
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        self.payload.insert(key.into(), value.into());
    }

    pub fn with<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "success": false,
                "tool": self.tool,
                "error": {"kind": ErrorKind::Internal, "message": e.to_string()},
            })
        })
    }
}

/// First `max_chars` characters of `text`
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
