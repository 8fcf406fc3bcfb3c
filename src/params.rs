//! Typed, range-checked parameter objects for every operation
//!
//! Each struct deserialises from the JSON object a caller sends (unknown
//! fields ignored, defaults filled in) and carries a [`Validate`] impl that
//! enforces the documented ranges before anything is built or executed.

use crate::discovery::ProbeMethod;
use crate::error::ToolError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Port specification accepted by nmap and rustscan: `22`, `22,80`, `1-1024`, `22,8000-8100`
static PORT_SPEC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,5}(-\d{1,5})?(,\d{1,5}(-\d{1,5})?)*$").expect("valid port spec regex")
});

/// Range check for every parameter object
pub trait Validate {
    fn validate(&self) -> crate::Result<()>;
}

fn check_range<T>(field: &str, value: T, min: T, max: T) -> crate::Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(ToolError::InvalidParams(format!(
            "{} must be between {} and {}, got {}",
            field, min, max, value
        )));
    }
    Ok(())
}

/// Reject empty values and values that would be read as an option by the tool
fn check_argument(field: &str, value: &str) -> crate::Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ToolError::InvalidParams(format!("{} cannot be empty", field)));
    }
    if trimmed.starts_with('-') {
        return Err(ToolError::InvalidParams(format!(
            "{} must not start with '-': {}",
            field, trimmed
        )));
    }
    Ok(())
}

fn check_ports(field: &str, value: &str) -> crate::Result<()> {
    check_argument(field, value)?;
    if !PORT_SPEC.is_match(value) {
        return Err(ToolError::InvalidParams(format!(
            "{} must be a port, port list or range (e.g. 22,80,8000-8100): {}",
            field, value
        )));
    }
    for part in value.split(',') {
        let (low, high) = match part.split_once('-') {
            Some((low, high)) => (low, high),
            None => (part, part),
        };
        let low: u32 = low.parse().unwrap_or(0);
        let high: u32 = high.parse().unwrap_or(0);
        if low == 0 || high > 65535 || low > high {
            return Err(ToolError::InvalidParams(format!("{}: invalid port range '{}'", field, part)));
        }
    }
    Ok(())
}

/// A host, address, CIDR or comma list of those; no embedded whitespace
fn check_target(field: &str, value: &str) -> crate::Result<()> {
    check_argument(field, value)?;
    if value.trim().chars().any(char::is_whitespace) {
        return Err(ToolError::InvalidParams(format!(
            "{} must not contain whitespace; separate entries with ',': {}",
            field,
            value.trim()
        )));
    }
    Ok(())
}

fn default_tcp_port() -> u16 {
    80
}

fn default_true() -> bool {
    true
}

/// `recon.ping_sweep`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingSweepParams {
    /// CIDR, single IP, last-octet range or comma-separated list
    pub network: String,
    #[serde(default)]
    pub method: ProbeMethod,
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
    #[serde(default = "PingSweepParams::default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "PingSweepParams::default_timeout")]
    pub timeout_s: u64,
    #[serde(default = "PingSweepParams::default_max_hosts")]
    pub max_hosts: usize,
    /// Retry with a TCP connect when ICMP is not permitted
    #[serde(default = "default_true")]
    pub fallback_tcp: bool,
}

impl PingSweepParams {
    pub fn new<S: Into<String>>(network: S) -> Self {
        Self {
            network: network.into(),
            method: ProbeMethod::default(),
            tcp_port: default_tcp_port(),
            concurrency: Self::default_concurrency(),
            timeout_s: Self::default_timeout(),
            max_hosts: Self::default_max_hosts(),
            fallback_tcp: true,
        }
    }

    fn default_concurrency() -> usize {
        50
    }

    fn default_timeout() -> u64 {
        2
    }

    fn default_max_hosts() -> usize {
        1024
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_s)
    }
}

impl Validate for PingSweepParams {
    fn validate(&self) -> crate::Result<()> {
        check_argument("network", &self.network)?;
        check_range("tcp_port", self.tcp_port, 1, 65535)?;
        check_range("concurrency", self.concurrency, 1, 500)?;
        check_range("timeout_s", self.timeout_s, 1, 60)?;
        check_range("max_hosts", self.max_hosts, 1, 65536)
    }
}

/// `recon.nmap_services_detection`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NmapParams {
    pub target: String,
    #[serde(default = "NmapParams::default_ports")]
    pub ports: String,
    #[serde(default = "NmapParams::default_timeout")]
    pub timeout_s: u64,
    /// `-T4 --min-rate <default_min_rate>`
    #[serde(default = "default_true")]
    pub fast: bool,
    /// `-sV`
    #[serde(default = "default_true")]
    pub service_detection: bool,
}

impl NmapParams {
    pub fn new<S: Into<String>>(target: S) -> Self {
        Self {
            target: target.into(),
            ports: Self::default_ports(),
            timeout_s: Self::default_timeout(),
            fast: true,
            service_detection: true,
        }
    }

    fn default_ports() -> String {
        "1-1024".to_string()
    }

    fn default_timeout() -> u64 {
        60
    }
}

impl Validate for NmapParams {
    fn validate(&self) -> crate::Result<()> {
        check_target("target", &self.target)?;
        check_ports("ports", &self.ports)?;
        check_range("timeout_s", self.timeout_s, 5, 600)
    }
}

/// `recon.host_probe`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostProbeParams {
    pub host: String,
    #[serde(default = "HostProbeParams::default_timeout")]
    pub timeout_s: u64,
    #[serde(default)]
    pub method: ProbeMethod,
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
}

impl HostProbeParams {
    pub fn new<S: Into<String>>(host: S) -> Self {
        Self {
            host: host.into(),
            timeout_s: Self::default_timeout(),
            method: ProbeMethod::default(),
            tcp_port: default_tcp_port(),
        }
    }

    fn default_timeout() -> u64 {
        5
    }
}

impl Validate for HostProbeParams {
    fn validate(&self) -> crate::Result<()> {
        check_argument("host", &self.host)?;
        if self.host.contains('/') || self.host.contains(',') {
            return Err(ToolError::InvalidParams(format!(
                "host must be a single address or hostname: {}",
                self.host
            )));
        }
        check_range("tcp_port", self.tcp_port, 1, 65535)?;
        check_range("timeout_s", self.timeout_s, 1, 60)
    }
}

/// `recon.rustscan_range_ports`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RustScanParams {
    pub target: String,
    #[serde(default = "RustScanParams::default_range")]
    pub range: String,
    #[serde(default = "RustScanParams::default_timeout")]
    pub timeout_s: u64,
    /// Per-port connect timeout handed to rustscan
    #[serde(default = "RustScanParams::default_port_timeout")]
    pub port_timeout_ms: u64,
    #[serde(default = "RustScanParams::default_ulimit")]
    pub ulimit: u64,
    #[serde(default)]
    pub batch_size: Option<u32>,
}

impl RustScanParams {
    pub fn new<S: Into<String>>(target: S) -> Self {
        Self {
            target: target.into(),
            range: Self::default_range(),
            timeout_s: Self::default_timeout(),
            port_timeout_ms: Self::default_port_timeout(),
            ulimit: Self::default_ulimit(),
            batch_size: None,
        }
    }

    fn default_range() -> String {
        "1-65535".to_string()
    }

    fn default_timeout() -> u64 {
        30
    }

    fn default_port_timeout() -> u64 {
        1500
    }

    fn default_ulimit() -> u64 {
        10000
    }

    /// Range with whitespace removed
    pub fn normalized_range(&self) -> String {
        self.range.chars().filter(|c| !c.is_whitespace()).collect()
    }
}

impl Validate for RustScanParams {
    fn validate(&self) -> crate::Result<()> {
        check_target("target", &self.target)?;
        check_ports("range", &self.normalized_range())?;
        check_range("timeout_s", self.timeout_s, 1, 3600)?;
        check_range("port_timeout_ms", self.port_timeout_ms, 100, 60_000)?;
        check_range("ulimit", self.ulimit, 256, 1_048_576)?;
        if let Some(batch) = self.batch_size {
            check_range("batch_size", batch, 1, 65535)?;
        }
        Ok(())
    }
}

/// `enum.whatweb_scan`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatWebParams {
    /// URL or host
    pub target: String,
    #[serde(default = "WhatWebParams::default_timeout")]
    pub timeout_s: u64,
    /// 1 (stealthy), 3 (aggressive) or 4 (heavy)
    #[serde(default = "WhatWebParams::default_aggression")]
    pub aggression: u8,
}

impl WhatWebParams {
    pub fn new<S: Into<String>>(target: S) -> Self {
        Self {
            target: target.into(),
            timeout_s: Self::default_timeout(),
            aggression: Self::default_aggression(),
        }
    }

    fn default_timeout() -> u64 {
        30
    }

    fn default_aggression() -> u8 {
        1
    }
}

impl Validate for WhatWebParams {
    fn validate(&self) -> crate::Result<()> {
        check_target("target", &self.target)?;
        check_range("timeout_s", self.timeout_s, 1, 600)?;
        if !matches!(self.aggression, 1 | 3 | 4) {
            return Err(ToolError::InvalidParams(format!(
                "aggression must be 1, 3 or 4, got {}",
                self.aggression
            )));
        }
        Ok(())
    }
}

/// `enum.gobuster_dir`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GobusterParams {
    pub url: String,
    #[serde(default = "GobusterParams::default_wordlist")]
    pub wordlist: String,
    #[serde(default = "GobusterParams::default_threads")]
    pub threads: u32,
    #[serde(default = "GobusterParams::default_timeout")]
    pub timeout_s: u64,
}

impl GobusterParams {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            wordlist: Self::default_wordlist(),
            threads: Self::default_threads(),
            timeout_s: Self::default_timeout(),
        }
    }

    fn default_wordlist() -> String {
        "/opt/SecLists/Discovery/Web-Content/common.txt".to_string()
    }

    fn default_threads() -> u32 {
        40
    }

    fn default_timeout() -> u64 {
        120
    }
}

impl Validate for GobusterParams {
    fn validate(&self) -> crate::Result<()> {
        check_argument("url", &self.url)?;
        check_argument("wordlist", &self.wordlist)?;
        check_range("threads", self.threads, 1, 200)?;
        check_range("timeout_s", self.timeout_s, 5, 3600)
    }
}

/// `enum.ffuf_fuzz`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FfufParams {
    /// URL template with a `FUZZ` token
    pub url: String,
    #[serde(default = "FfufParams::default_wordlist")]
    pub wordlist: String,
    #[serde(default = "FfufParams::default_threads")]
    pub threads: u32,
    #[serde(default = "FfufParams::default_timeout")]
    pub timeout_s: u64,
    /// Also return raw stdout
    #[serde(default)]
    pub store_raw: bool,
}

impl FfufParams {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            wordlist: Self::default_wordlist(),
            threads: Self::default_threads(),
            timeout_s: Self::default_timeout(),
            store_raw: false,
        }
    }

    fn default_wordlist() -> String {
        "/usr/share/seclists/Discovery/Web-Content/common.txt".to_string()
    }

    fn default_threads() -> u32 {
        40
    }

    fn default_timeout() -> u64 {
        120
    }
}

impl Validate for FfufParams {
    fn validate(&self) -> crate::Result<()> {
        check_argument("url", &self.url)?;
        if !self.url.contains("FUZZ") {
            return Err(ToolError::InvalidParams(format!(
                "url must contain the FUZZ token: {}",
                self.url
            )));
        }
        check_argument("wordlist", &self.wordlist)?;
        check_range("threads", self.threads, 1, 200)?;
        check_range("timeout_s", self.timeout_s, 5, 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_sweep_defaults_fill_in() {
        let params: PingSweepParams = serde_json::from_str(r#"{"network":"10.0.0.0/30","extra":1}"#).unwrap();
        assert_eq!(params.method, ProbeMethod::Icmp);
        assert_eq!(params.tcp_port, 80);
        assert_eq!(params.concurrency, 50);
        assert_eq!(params.timeout_s, 2);
        assert_eq!(params.max_hosts, 1024);
        assert!(params.fallback_tcp);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn out_of_range_concurrency_is_rejected() {
        let mut params = PingSweepParams::new("10.0.0.0/24");
        params.concurrency = 0;
        assert!(matches!(params.validate(), Err(ToolError::InvalidParams(_))));
        params.concurrency = 501;
        assert!(params.validate().is_err());
    }

    #[test]
    fn whitespace_inside_targets_is_rejected() {
        assert!(NmapParams::new("10.0.0.5 8.8.8.8").validate().is_err());
        assert!(RustScanParams::new("10.0.0.5\t8.8.8.8").validate().is_err());
        assert!(WhatWebParams::new("http://10.0.0.5 http://8.8.8.8").validate().is_err());
        assert!(NmapParams::new(" 10.0.0.5 ").validate().is_ok());
        assert!(RustScanParams::new("10.0.0.5,10.0.0.6").validate().is_ok());
    }

    #[test]
    fn leading_dash_is_rejected_everywhere() {
        assert!(NmapParams::new("--script=evil").validate().is_err());
        assert!(WhatWebParams::new("-a4").validate().is_err());
        assert!(GobusterParams::new(" -u").validate().is_err());
        let mut rustscan = RustScanParams::new("10.0.0.1");
        rustscan.range = "-1".into();
        assert!(rustscan.validate().is_err());
    }

    #[test]
    fn port_specs() {
        let mut nmap = NmapParams::new("10.0.0.1");
        for ok in ["22", "22,80,443", "1-65535", "22,8000-8100"] {
            nmap.ports = ok.into();
            assert!(nmap.validate().is_ok(), "{} should be accepted", ok);
        }
        for bad in ["0", "70000", "80-22", "http", "22;id", "22,,80"] {
            nmap.ports = bad.into();
            assert!(nmap.validate().is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn rustscan_range_ignores_spaces() {
        let mut params = RustScanParams::new("10.0.0.1");
        params.range = " 1 - 1024 ".into();
        assert_eq!(params.normalized_range(), "1-1024");
        assert!(params.validate().is_ok());
    }

    #[test]
    fn ffuf_requires_fuzz_token() {
        assert!(FfufParams::new("http://10.0.0.1/").validate().is_err());
        assert!(FfufParams::new("http://10.0.0.1/FUZZ").validate().is_ok());
    }

    #[test]
    fn whatweb_aggression_levels() {
        let mut params = WhatWebParams::new("http://10.0.0.1");
        params.aggression = 2;
        assert!(params.validate().is_err());
        params.aggression = 3;
        assert!(params.validate().is_ok());
    }

    #[test]
    fn host_probe_takes_one_host() {
        assert!(HostProbeParams::new("10.0.0.0/24").validate().is_err());
        assert!(HostProbeParams::new("10.0.0.1").validate().is_ok());
    }
}
