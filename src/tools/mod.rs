//! Tool families - argument vectors and output normalisation
//!
//! Each external scanner is one variant of [`ToolRequest`]. The
//! [`CommandBuilder`] turns a request into a [`CommandSpec`] (never a shell
//! line) and the [`OutputParser`] turns the matching [`ExecutionResult`] into
//! a [`ToolResult`]. Per-family details live in the submodules.

pub mod ffuf;
pub mod gobuster;
pub mod nmap;
pub mod parse;
pub mod ping;
pub mod rustscan;
pub mod whatweb;

use crate::config::{AppConfig, ExecutionMode, NmapOutput};
use crate::error::ErrorKind;
use crate::exec::{CommandSpec, ContainerSpec, ExecutionResult, Mount};
use crate::params::{FfufParams, GobusterParams, NmapParams, RustScanParams, Validate, WhatWebParams};
use crate::result::{excerpt, ToolResult, EXCERPT_CHARS};
use crate::service::registry;
use serde_json::Map;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Directory wordlists are mounted under inside a container
pub const CONTAINER_WORDLIST_DIR: &str = "/wordlists";

/// Tool identifier tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Nmap,
    RustScan,
    WhatWeb,
    Gobuster,
    Ffuf,
    Ping,
}

impl ToolKind {
    /// Tools that can be switched to container execution
    pub const CONTAINERIZABLE: [ToolKind; 5] = [
        ToolKind::Nmap,
        ToolKind::RustScan,
        ToolKind::WhatWeb,
        ToolKind::Gobuster,
        ToolKind::Ffuf,
    ];

    /// Config key and environment prefix (upper-cased)
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Nmap => "nmap",
            ToolKind::RustScan => "rustscan",
            ToolKind::WhatWeb => "whatweb",
            ToolKind::Gobuster => "gobuster",
            ToolKind::Ffuf => "ffuf",
            ToolKind::Ping => "ping",
        }
    }

    /// Default binary name
    pub fn binary(&self) -> &'static str {
        self.name()
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated invocation of one external tool
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    Nmap(NmapParams),
    RustScan(RustScanParams),
    WhatWeb(WhatWebParams),
    Gobuster(GobusterParams),
    Ffuf(FfufParams),
}

impl ToolRequest {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolRequest::Nmap(_) => ToolKind::Nmap,
            ToolRequest::RustScan(_) => ToolKind::RustScan,
            ToolRequest::WhatWeb(_) => ToolKind::WhatWeb,
            ToolRequest::Gobuster(_) => ToolKind::Gobuster,
            ToolRequest::Ffuf(_) => ToolKind::Ffuf,
        }
    }

    /// Registry name of the operation this request serves
    pub fn operation(&self) -> &'static str {
        match self {
            ToolRequest::Nmap(_) => registry::NMAP_SERVICES_DETECTION,
            ToolRequest::RustScan(_) => registry::RUSTSCAN_RANGE_PORTS,
            ToolRequest::WhatWeb(_) => registry::WHATWEB_SCAN,
            ToolRequest::Gobuster(_) => registry::GOBUSTER_DIR,
            ToolRequest::Ffuf(_) => registry::FFUF_FUZZ,
        }
    }

    /// The string that must pass the scope guard
    pub fn target(&self) -> &str {
        match self {
            ToolRequest::Nmap(p) => &p.target,
            ToolRequest::RustScan(p) => &p.target,
            ToolRequest::WhatWeb(p) => &p.target,
            ToolRequest::Gobuster(p) => &p.url,
            ToolRequest::Ffuf(p) => &p.url,
        }
    }

    /// True when the tool reads `target` as a comma list of hosts, so every
    /// entry must pass the scope guard on its own
    pub fn accepts_target_list(&self) -> bool {
        matches!(self, ToolRequest::Nmap(_) | ToolRequest::RustScan(_) | ToolRequest::WhatWeb(_))
    }

    pub fn timeout_s(&self) -> u64 {
        match self {
            ToolRequest::Nmap(p) => p.timeout_s,
            ToolRequest::RustScan(p) => p.timeout_s,
            ToolRequest::WhatWeb(p) => p.timeout_s,
            ToolRequest::Gobuster(p) => p.timeout_s,
            ToolRequest::Ffuf(p) => p.timeout_s,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_s())
    }

    /// Input file that must exist on the host
    pub fn wordlist(&self) -> Option<&str> {
        match self {
            ToolRequest::Gobuster(p) => Some(&p.wordlist),
            ToolRequest::Ffuf(p) => Some(&p.wordlist),
            _ => None,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        match self {
            ToolRequest::Nmap(p) => p.validate(),
            ToolRequest::RustScan(p) => p.validate(),
            ToolRequest::WhatWeb(p) => p.validate(),
            ToolRequest::Gobuster(p) => p.validate(),
            ToolRequest::Ffuf(p) => p.validate(),
        }
    }
}

/// Read-only mount for a wordlist at `/wordlists/<file name>`
fn wordlist_mount(host_path: &str) -> Mount {
    let file_name = Path::new(host_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "wordlist.txt".to_string());
    Mount::read_only(host_path, format!("{}/{}", CONTAINER_WORDLIST_DIR, file_name))
}

/// Builds command specs from validated requests
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    config: Arc<AppConfig>,
}

impl CommandBuilder {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    /// Build the command for a request.
    ///
    /// Pure: the result depends only on the request and the configuration.
    /// Container mode keeps the native argument vector and adds the wrapper
    /// descriptor, with wordlists bind-mounted and their paths rewritten.
    pub fn build(&self, request: &ToolRequest) -> CommandSpec {
        let runtime = self.config.runtime(request.kind());
        let containerised = runtime.mode == ExecutionMode::Container;

        let mut mounts = Vec::new();
        let wordlist = match request.wordlist() {
            Some(path) if containerised => {
                let mount = wordlist_mount(path);
                let inner = mount.container_path.display().to_string();
                mounts.push(mount);
                inner
            }
            Some(path) => path.to_string(),
            None => String::new(),
        };

        let args = match request {
            ToolRequest::Nmap(p) => nmap::args(p, self.config.default_min_rate, self.config.nmap_output),
            ToolRequest::RustScan(p) => rustscan::args(p),
            ToolRequest::WhatWeb(p) => whatweb::args(p),
            ToolRequest::Gobuster(p) => gobuster::args(p, &wordlist),
            ToolRequest::Ffuf(p) => ffuf::args(p, &wordlist),
        };

        let spec = CommandSpec::new(runtime.binary.clone(), args);
        if !containerised {
            return spec;
        }

        spec.with_container(ContainerSpec {
            image: runtime.image,
            network: runtime.network,
            cap_add: runtime.cap_add,
            cpus: runtime.cpus,
            memory: runtime.memory,
            mounts,
        })
    }

    /// Single ICMP echo through the system ping binary, always native
    pub fn ping(&self, host: &str, timeout_s: u64) -> CommandSpec {
        CommandSpec::new(self.config.ping_binary.clone(), ping::args(host, timeout_s))
    }
}

/// Normalises execution results into envelopes
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputParser {
    nmap_output: NmapOutput,
}

impl OutputParser {
    pub fn new(nmap_output: NmapOutput) -> Self {
        Self { nmap_output }
    }

    pub fn parse(&self, request: &ToolRequest, execution: &ExecutionResult) -> ToolResult {
        let operation = request.operation();

        if execution.timed_out {
            return ToolResult::timeout(operation, request.timeout_s(), execution);
        }
        if execution.exit_code != 0 {
            return ToolResult::non_zero_exit(operation, execution);
        }

        let stdout = execution.stdout_lossy();
        let mut result = match request {
            ToolRequest::Nmap(_) => match nmap::parse(&stdout, self.nmap_output) {
                Ok(document) => ToolResult::ok(operation, Map::new()).with("nmap", document),
                Err(e) => ToolResult::failure(operation, ErrorKind::ParseFailure, format!("unparseable nmap output: {}", e))
                    .with("stdout", excerpt(&stdout, EXCERPT_CHARS)),
            },
            ToolRequest::RustScan(_) => ToolResult::ok(operation, Map::new())
                .with("ports", rustscan::parse_ports(&stdout))
                .with("stdout", stdout),
            ToolRequest::WhatWeb(_) => ToolResult::ok(operation, Map::new())
                .with("results", whatweb::parse(&stdout))
                .with("stdout", stdout),
            ToolRequest::Gobuster(_) => ToolResult::ok(operation, Map::new())
                .with("found", gobuster::parse(&stdout))
                .with("stdout", stdout),
            ToolRequest::Ffuf(p) => match ffuf::parse(&stdout) {
                Ok(document) => {
                    let result = ToolResult::ok(operation, Map::new()).with("ffuf", document);
                    if p.store_raw {
                        result.with("stdout", stdout)
                    } else {
                        result
                    }
                }
                Err(e) => ToolResult::failure(operation, ErrorKind::ParseFailure, format!("unparseable ffuf output: {}", e))
                    .with("stdout", excerpt(&stdout, EXCERPT_CHARS)),
            },
        };

        if execution.output_truncated {
            result.insert("output_truncated", true);
        }
        result.insert("duration_ms", execution.duration.as_millis() as u64);
        result
    }
}
