//! Host Discovery Engine - bounded-concurrency liveness sweeps
//!
//! A sweep expands a CIDR / range / list lazily into hosts, probes each one
//! (ICMP echo via the system ping binary, or a TCP connect) with its own
//! timeout, and aggregates the answers in completion order through a single
//! channel consumer.

pub mod engine;
pub mod probe;
pub mod targets;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

pub use engine::{DiscoveryEngine, SweepConfig};
pub use probe::{IcmpProber, TcpProber};
pub use targets::{expand, TargetExpansion};

/// Probe method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    #[default]
    Icmp,
    Tcp,
}

impl ProbeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeMethod::Icmp => "icmp",
            ProbeMethod::Tcp => "tcp",
        }
    }
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One host to probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTask {
    pub host: IpAddr,
    pub method: ProbeMethod,
    /// Port for TCP probes; ignored by ICMP
    pub tcp_port: u16,
    pub timeout: Duration,
}

impl ProbeTask {
    pub fn with_method(mut self, method: ProbeMethod) -> Self {
        self.method = method;
        self
    }
}

/// Answer of a single probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    pub alive: bool,
    pub rtt_ms: Option<f64>,
}

impl ProbeOutcome {
    pub fn alive(rtt_ms: Option<f64>) -> Self {
        Self { alive: true, rtt_ms }
    }

    pub fn dead() -> Self {
        Self {
            alive: false,
            rtt_ms: None,
        }
    }
}

/// Liveness probe strategy
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, task: &ProbeTask) -> Result<ProbeOutcome, DiscoveryError>;

    fn method(&self) -> ProbeMethod;
}

/// Per-host error entry in a sweep result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostError {
    pub host: String,
    pub error: String,
    /// Method used instead, when the primary probe was not possible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ProbeMethod>,
}

/// Aggregate of a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    /// Probes attempted
    pub scanned: usize,
    pub alive_count: usize,
    /// Alive hosts in completion order
    pub hosts: Vec<String>,
    /// Round-trip times of alive hosts, where measured
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rtt_ms: BTreeMap<String, f64>,
    pub errors: Vec<HostError>,
    /// Error entries not reported because of the cap
    #[serde(default, skip_serializing_if = "is_zero")]
    pub errors_dropped: usize,
    /// Set when the expansion exceeded `max_hosts`
    pub truncated: bool,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Discovery errors
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("{0}")]
    MissingTool(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),
}
