//! Discovery probes - TCP connect and ICMP echo

use super::{DiscoveryError, ProbeMethod, ProbeOutcome, ProbeTask, Prober};
use crate::error::ExecError;
use crate::exec::{CommandSpec, Executor};
use crate::tools::ping;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

fn elapsed_ms(start: Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
}

/// Errors that mean "nothing answered"
fn is_unreachable(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::TimedOut {
        return true;
    }
    matches!(
        err.raw_os_error(),
        Some(code) if code == libc::EHOSTUNREACH || code == libc::ENETUNREACH || code == libc::EHOSTDOWN
    )
}

/// TCP connect probe. A completed handshake or any TCP-level answer
/// (refused, reset) means the host is up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProber;

impl TcpProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Prober for TcpProber {
    async fn probe(&self, task: &ProbeTask) -> Result<ProbeOutcome, DiscoveryError> {
        let start = Instant::now();

        match tokio::time::timeout(task.timeout, TcpStream::connect((task.host, task.tcp_port))).await {
            Ok(Ok(_stream)) => Ok(ProbeOutcome::alive(Some(elapsed_ms(start)))),
            Ok(Err(e)) => match e.kind() {
                io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                    Ok(ProbeOutcome::alive(Some(elapsed_ms(start))))
                }
                _ if is_unreachable(&e) => Ok(ProbeOutcome::dead()),
                _ => Err(DiscoveryError::NetworkError(format!(
                    "tcp/{} connect failed: {}",
                    task.tcp_port, e
                ))),
            },
            Err(_) => Ok(ProbeOutcome::dead()),
        }
    }

    fn method(&self) -> ProbeMethod {
        ProbeMethod::Tcp
    }
}

/// ICMP echo through the system `ping` binary, run by an [`Executor`]
pub struct IcmpProber {
    executor: Arc<dyn Executor>,
    ping_binary: String,
}

impl IcmpProber {
    pub fn new<S: Into<String>>(executor: Arc<dyn Executor>, ping_binary: S) -> Self {
        Self {
            executor,
            ping_binary: ping_binary.into(),
        }
    }

    fn spec(&self, task: &ProbeTask) -> CommandSpec {
        let timeout_s = task.timeout.as_secs().max(1);
        CommandSpec::new(self.ping_binary.clone(), ping::args(&task.host.to_string(), timeout_s))
    }
}

#[async_trait::async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, task: &ProbeTask) -> Result<ProbeOutcome, DiscoveryError> {
        // ping enforces -W itself; the extra second only covers process start-up
        let limit = task.timeout + Duration::from_secs(1);
        let result = self.executor.run(&self.spec(task), limit).await.map_err(|e| match e {
            ExecError::BinaryNotFound { program } => {
                DiscoveryError::MissingTool(format!("'{}' not found; install iputils-ping or use method=tcp", program))
            }
            other => DiscoveryError::NetworkError(other.to_string()),
        })?;

        let stdout = result.stdout_lossy();
        let rtt = ping::parse_rtt(&stdout);

        if result.success() {
            return Ok(ProbeOutcome::alive(rtt));
        }
        if rtt.is_some() {
            return Ok(ProbeOutcome::alive(rtt));
        }

        let stderr = result.stderr_lossy();
        if ping::permission_denied(&stderr) {
            return Err(DiscoveryError::PermissionDenied(format!(
                "raw ICMP not permitted: {}",
                stderr.trim()
            )));
        }

        Ok(ProbeOutcome::dead())
    }

    fn method(&self) -> ProbeMethod {
        ProbeMethod::Icmp
    }
}
