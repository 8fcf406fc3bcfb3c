//! Configuration module for reconkit
//!
//! Configuration is read once at start-up (TOML file, then environment
//! overrides) into an [`AppConfig`] that is shared immutably behind an `Arc`.

use crate::tools::ToolKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// How a tool is launched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Run the locally installed binary
    #[default]
    Native,
    /// Run the tool inside a throw-away container
    Container,
}

/// Output format requested from nmap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NmapOutput {
    /// `-oJ -` (JSON capable nmap builds / images)
    #[default]
    Json,
    /// `-oX -`, converted to the JSON structure by the parser
    Xml,
}

/// Per-tool runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolRuntime {
    /// Native or container execution
    pub mode: ExecutionMode,
    /// Binary name or path used in native mode, and as the container entrypoint
    pub binary: String,
    /// Container image
    pub image: String,
    /// Container network mode (`host`, `bridge`, ...)
    pub network: Option<String>,
    /// Linux capabilities added to the container
    pub cap_add: Vec<String>,
    /// CPU quota passed to `--cpus`
    pub cpus: Option<String>,
    /// Memory limit passed to `--memory`
    pub memory: Option<String>,
}

impl Default for ToolRuntime {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Native,
            binary: String::new(),
            image: String::new(),
            network: None,
            cap_add: Vec::new(),
            cpus: Some("0.5".to_string()),
            memory: Some("512m".to_string()),
        }
    }
}

impl ToolRuntime {
    /// Default runtime for a tool family
    pub fn for_tool(tool: ToolKind) -> Self {
        let mut runtime = Self {
            binary: tool.binary().to_string(),
            image: format!("{}:latest", tool.binary()),
            ..Default::default()
        };

        match tool {
            ToolKind::Nmap => {
                runtime.image = "my-nmap:latest".to_string();
                runtime.network = Some("host".to_string());
                runtime.cap_add = vec!["NET_RAW".to_string(), "NET_ADMIN".to_string()];
            }
            ToolKind::RustScan => {
                runtime.image = "rustscan/rustscan:latest".to_string();
                runtime.network = Some("host".to_string());
            }
            _ => {}
        }

        runtime
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Target allow-list prefix. Empty means every target is allowed, which
    /// is only acceptable for lab use: set it in production.
    pub allowed_prefix: String,

    /// `--min-rate` applied to nmap when `fast=true`
    pub default_min_rate: u32,

    /// Container runtime command (docker, podman, ...)
    pub container_runtime: String,

    /// Binary used for ICMP liveness checks
    pub ping_binary: String,

    /// Capture limit per output stream, in bytes
    pub max_output_bytes: usize,

    /// Maximum number of per-host error entries kept in a sweep result
    pub max_reported_errors: usize,

    /// Nmap output format
    pub nmap_output: NmapOutput,

    /// Per-tool runtime overrides, keyed by tool name
    pub tools: BTreeMap<String, ToolRuntime>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            allowed_prefix: String::new(),
            default_min_rate: 1000,
            container_runtime: "docker".to_string(),
            ping_binary: "ping".to_string(),
            max_output_bytes: 8 * 1024 * 1024,
            max_reported_errors: 64,
            nmap_output: NmapOutput::Json,
            tools: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Runtime settings for a tool, falling back to that tool's defaults
    pub fn runtime(&self, tool: ToolKind) -> ToolRuntime {
        let defaults = ToolRuntime::for_tool(tool);
        match self.tools.get(tool.name()) {
            Some(configured) => {
                let mut runtime = configured.clone();
                if runtime.binary.is_empty() {
                    runtime.binary = defaults.binary;
                }
                if runtime.image.is_empty() {
                    runtime.image = defaults.image;
                }
                runtime
            }
            None => defaults,
        }
    }

    /// Execution mode resolved for a tool at call time
    pub fn mode(&self, tool: ToolKind) -> ExecutionMode {
        self.runtime(tool).mode
    }

    /// Set a runtime for a tool
    pub fn with_runtime(mut self, tool: ToolKind, runtime: ToolRuntime) -> Self {
        self.tools.insert(tool.name().to_string(), runtime);
        self
    }

    /// Set the allow-list prefix
    pub fn with_allowed_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.allowed_prefix = prefix.into();
        self
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            crate::ToolError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| crate::ToolError::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Default config location, `~/.reconkit.toml`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".reconkit.toml")
    }

    /// Load from an explicit path, or the default location, or defaults;
    /// then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    log::info!("Loaded config from {}", default_path.display());
                    Self::from_toml_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_with(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(prefix) = lookup("ALLOWED_PREFIX") {
            self.allowed_prefix = prefix;
        }

        if let Some(rate) = lookup("DEFAULT_MIN_RATE") {
            match rate.trim().parse() {
                Ok(rate) => self.default_min_rate = rate,
                Err(_) => log::warn!("Ignoring invalid DEFAULT_MIN_RATE value: {}", rate),
            }
        }

        if let Some(runtime) = lookup("DOCKER_CMD") {
            self.container_runtime = runtime;
        }

        for tool in ToolKind::CONTAINERIZABLE {
            let prefix = tool.name().to_uppercase();
            let mut runtime = self.runtime(tool);
            let mut touched = false;

            if let Some(flag) = lookup(&format!("{}_USE_DOCKER", prefix)) {
                runtime.mode = if is_truthy(&flag) {
                    ExecutionMode::Container
                } else {
                    ExecutionMode::Native
                };
                touched = true;
            }
            if let Some(image) = lookup(&format!("{}_DOCKER_IMAGE", prefix)) {
                runtime.image = image;
                touched = true;
            }
            if let Some(network) = lookup(&format!("{}_DOCKER_NETWORK", prefix)) {
                runtime.network = Some(network).filter(|n| !n.trim().is_empty());
                touched = true;
            }
            if let Some(caps) = lookup(&format!("{}_DOCKER_CAPS", prefix)) {
                runtime.cap_add = split_list(&caps);
                touched = true;
            }

            if touched {
                self.tools.insert(tool.name().to_string(), runtime);
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.container_runtime.trim().is_empty() {
            return Err(crate::ToolError::Config("container_runtime cannot be empty".to_string()));
        }

        if self.ping_binary.trim().is_empty() {
            return Err(crate::ToolError::Config("ping_binary cannot be empty".to_string()));
        }

        if self.default_min_rate == 0 {
            return Err(crate::ToolError::Config("default_min_rate must be greater than 0".to_string()));
        }

        if self.max_output_bytes == 0 {
            return Err(crate::ToolError::Config("max_output_bytes must be greater than 0".to_string()));
        }

        for tool in ToolKind::CONTAINERIZABLE {
            let runtime = self.runtime(tool);
            if runtime.binary.trim().is_empty() {
                return Err(crate::ToolError::Config(format!("{}: binary cannot be empty", tool.name())));
            }
            if runtime.mode == ExecutionMode::Container && runtime.image.trim().is_empty() {
                return Err(crate::ToolError::Config(format!(
                    "{}: container mode requires an image",
                    tool.name()
                )));
            }
        }

        Ok(())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_unrestricted_and_native() {
        let config = AppConfig::default();
        assert!(config.allowed_prefix.is_empty());
        assert_eq!(config.default_min_rate, 1000);
        assert_eq!(config.mode(ToolKind::Nmap), ExecutionMode::Native);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn nmap_container_defaults_carry_raw_socket_caps() {
        let runtime = AppConfig::default().runtime(ToolKind::Nmap);
        assert_eq!(runtime.image, "my-nmap:latest");
        assert_eq!(runtime.network.as_deref(), Some("host"));
        assert_eq!(runtime.cap_add, vec!["NET_RAW", "NET_ADMIN"]);
    }

    #[test]
    fn env_overrides_switch_tool_to_container() {
        let mut config = AppConfig::default();
        config.apply_env_with(lookup_from(&[
            ("ALLOWED_PREFIX", "10.0."),
            ("DEFAULT_MIN_RATE", "5000"),
            ("FFUF_USE_DOCKER", "yes"),
            ("FFUF_DOCKER_IMAGE", "ffuf:2.1"),
            ("FFUF_DOCKER_CAPS", "NET_RAW, ,"),
        ]));

        assert_eq!(config.allowed_prefix, "10.0.");
        assert_eq!(config.default_min_rate, 5000);
        let ffuf = config.runtime(ToolKind::Ffuf);
        assert_eq!(ffuf.mode, ExecutionMode::Container);
        assert_eq!(ffuf.image, "ffuf:2.1");
        assert_eq!(ffuf.cap_add, vec!["NET_RAW"]);
        assert_eq!(config.mode(ToolKind::Gobuster), ExecutionMode::Native);
    }

    #[test]
    fn invalid_min_rate_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env_with(lookup_from(&[("DEFAULT_MIN_RATE", "fast")]));
        assert_eq!(config.default_min_rate, 1000);
    }

    #[test]
    fn toml_round_trip_keeps_tool_table() {
        let text = r#"
            allowed_prefix = "192.168."
            nmap_output = "xml"

            [tools.gobuster]
            mode = "container"
            image = "ghcr.io/oj/gobuster:3"
        "#;
        let config: AppConfig = toml::from_str(text).unwrap();
        assert_eq!(config.nmap_output, NmapOutput::Xml);
        let gobuster = config.runtime(ToolKind::Gobuster);
        assert_eq!(gobuster.mode, ExecutionMode::Container);
        assert_eq!(gobuster.binary, "gobuster");
        assert_eq!(gobuster.memory.as_deref(), Some("512m"));
    }

    #[test]
    fn container_mode_without_image_fails_validation() {
        let runtime = ToolRuntime {
            mode: ExecutionMode::Container,
            binary: "whatweb".into(),
            image: "   ".into(),
            ..Default::default()
        };
        let config = AppConfig::default().with_runtime(ToolKind::WhatWeb, runtime);
        assert!(config.validate().is_err());
    }
}
