//! reconkit - recon and enumeration tools behind one scoped facade
//!
//! Wraps nmap, rustscan, whatweb, gobuster and ffuf (natively or in
//! containers) and a bounded-concurrency ping sweep behind [`ReconService`],
//! which checks every target against an allow-list prefix before anything
//! runs and returns a uniform [`ToolResult`] envelope.

pub mod config;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod params;
pub mod result;
pub mod scope;
pub mod service;
pub mod tools;
pub mod utils;

// Re-export commonly used types
pub use config::{AppConfig, ExecutionMode, ToolRuntime};
pub use error::{ErrorKind, ExecError, ToolError};
pub use exec::{CommandSpec, ExecutionResult, Executor, ExecutorSet};
pub use result::ToolResult;
pub use scope::{ScopeDecision, ScopeGuard};
pub use service::{Backends, ReconService};
pub use tools::{CommandBuilder, OutputParser, ToolKind, ToolRequest};

pub type Result<T> = std::result::Result<T, ToolError>;
