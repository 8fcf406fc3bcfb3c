//! Recon operations - discovery and port scanning

use super::registry::{HOST_PROBE, PING_SWEEP};
use super::ReconService;
use crate::discovery::{DiscoveryError, ProbeMethod, ProbeTask, SweepConfig};
use crate::error::{ErrorKind, ExecError, ToolError};
use crate::params::{HostProbeParams, NmapParams, PingSweepParams, RustScanParams, Validate};
use crate::result::{excerpt, ToolResult};
use crate::tools::{ping, ToolRequest};
use log::{info, warn};
use serde_json::{Map, Value};
use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;

/// Longest stdout/stderr excerpt returned by `host_probe`
const PROBE_OUTPUT_CHARS: usize = 1000;

impl ReconService {
    /// Bounded-concurrency liveness sweep over a CIDR, range or list
    pub async fn ping_sweep(&self, params: PingSweepParams) -> ToolResult {
        if let Err(e) = params.validate().and_then(|_| self.scope.check_list(&params.network)) {
            warn!("{} refused: {}", PING_SWEEP, e);
            return ToolResult::from_error(PING_SWEEP, &e);
        }

        let result = self.discovery.sweep(&SweepConfig::from(&params)).await;
        if result.scanned == 0 {
            return ToolResult::failure(
                PING_SWEEP,
                ErrorKind::InvalidParams,
                format!("no valid hosts parsed from network '{}'", params.network),
            )
            .with("errors", serde_json::to_value(&result.errors).unwrap_or(Value::Null));
        }

        match serde_json::to_value(&result) {
            Ok(Value::Object(payload)) => ToolResult::ok(PING_SWEEP, payload),
            Ok(_) | Err(_) => ToolResult::failure(PING_SWEEP, ErrorKind::Internal, "failed to serialise sweep result"),
        }
    }

    /// nmap service/version detection
    pub async fn nmap_services_detection(&self, params: NmapParams) -> ToolResult {
        self.run_tool(ToolRequest::Nmap(params)).await
    }

    /// Open-port listing with rustscan, no nmap follow-up
    pub async fn rustscan_range_ports(&self, params: RustScanParams) -> ToolResult {
        self.run_tool(ToolRequest::RustScan(params)).await
    }

    /// Liveness check of a single host
    pub async fn host_probe(&self, params: HostProbeParams) -> ToolResult {
        if let Err(e) = params.validate().and_then(|_| self.scope.check(&params.host)) {
            warn!("{} refused: {}", HOST_PROBE, e);
            return ToolResult::from_error(HOST_PROBE, &e);
        }

        let host = params.host.trim();
        let timeout = Duration::from_secs(params.timeout_s);
        let mut payload = Map::new();
        payload.insert("host".into(), host.into());

        let icmp = params.method == ProbeMethod::Icmp;
        if icmp {
            match self.icmp_probe(host, params.timeout_s, &mut payload).await {
                Ok(()) => return ToolResult::ok(HOST_PROBE, payload),
                Err(DiscoveryError::PermissionDenied(reason)) => {
                    info!("{}: {}; retrying with tcp/{}", HOST_PROBE, reason, params.tcp_port);
                    payload.insert("fallback".into(), ProbeMethod::Tcp.as_str().into());
                    payload.insert("icmp_error".into(), reason.into());
                }
                Err(DiscoveryError::MissingTool(message)) => {
                    return ToolResult::from_error(HOST_PROBE, &ToolError::MissingTool(message));
                }
                Err(e) => return ToolResult::failure(HOST_PROBE, ErrorKind::Internal, e.to_string()),
            }
        }

        let ip = match resolve(host).await {
            Some(ip) => ip,
            None => {
                return ToolResult::failure(HOST_PROBE, ErrorKind::InvalidParams, format!("cannot resolve host '{}'", host))
            }
        };
        let task = ProbeTask {
            host: ip,
            method: ProbeMethod::Tcp,
            tcp_port: params.tcp_port,
            timeout,
        };

        match self.backends.tcp.probe(&task).await {
            Ok(outcome) => {
                payload.insert("method".into(), ProbeMethod::Tcp.as_str().into());
                payload.insert("tcp_port".into(), params.tcp_port.into());
                payload.insert("alive".into(), outcome.alive.into());
                payload.insert("rtt_ms".into(), outcome.rtt_ms.into());
                ToolResult::ok(HOST_PROBE, payload)
            }
            Err(e) => ToolResult::failure(HOST_PROBE, ErrorKind::Internal, e.to_string()),
        }
    }

    /// One ping through the executor; stdout/stderr are kept for the caller
    async fn icmp_probe(&self, host: &str, timeout_s: u64, payload: &mut Map<String, Value>) -> Result<(), DiscoveryError> {
        let spec = self.builder.ping(host, timeout_s);
        let execution = self
            .backends
            .executors
            .run(&spec, Duration::from_secs(timeout_s + 1))
            .await
            .map_err(|e| match e {
                ExecError::Spawn(_) => DiscoveryError::NetworkError(e.to_string()),
                other => DiscoveryError::MissingTool(other.to_string()),
            })?;

        let stdout = execution.stdout_lossy();
        let stderr = execution.stderr_lossy();
        let rtt = ping::parse_rtt(&stdout);
        let alive = execution.success() || rtt.is_some();

        if !alive && ping::permission_denied(&stderr) {
            return Err(DiscoveryError::PermissionDenied(stderr.trim().to_string()));
        }

        payload.insert("method".into(), ProbeMethod::Icmp.as_str().into());
        payload.insert("alive".into(), alive.into());
        payload.insert("rtt_ms".into(), rtt.into());
        payload.insert("exit_code".into(), execution.exit_code.into());
        payload.insert("timed_out".into(), execution.timed_out.into());
        payload.insert("stdout".into(), excerpt(&stdout, PROBE_OUTPUT_CHARS).into());
        payload.insert("stderr".into(), excerpt(&stderr, PROBE_OUTPUT_CHARS).into());
        Ok(())
    }
}

/// Address for a TCP probe: literal IP, else the first resolved address
async fn resolve(host: &str) -> Option<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }
    let lookup = format!("{}:0", host);
    tokio::task::spawn_blocking(move || lookup.to_socket_addrs().ok()?.next().map(|addr| addr.ip()))
        .await
        .ok()
        .flatten()
}
