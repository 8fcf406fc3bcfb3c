//! Test doubles shared by the integration tests

#![allow(dead_code)]

use bytes::Bytes;
use reconkit::discovery::{DiscoveryError, ProbeMethod, ProbeOutcome, ProbeTask, Prober};
use reconkit::exec::{CommandSpec, ExecutionResult, Executor, ExecutorSet};
use reconkit::{AppConfig, Backends, ExecError, ReconService};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Executor that records every spec and answers with canned output
pub struct SpyExecutor {
    pub calls: Mutex<Vec<CommandSpec>>,
    exit_code: i32,
    stdout: String,
    stderr: String,
}

impl SpyExecutor {
    pub fn new(exit_code: i32, stdout: &str, stderr: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        })
    }

    pub fn succeeding(stdout: &str) -> Arc<Self> {
        Self::new(0, stdout, "")
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<CommandSpec> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl Executor for SpyExecutor {
    async fn run(&self, spec: &CommandSpec, _timeout: Duration) -> Result<ExecutionResult, ExecError> {
        self.calls.lock().unwrap().push(spec.clone());
        Ok(ExecutionResult {
            exit_code: self.exit_code,
            stdout: Bytes::from(self.stdout.clone()),
            stderr: Bytes::from(self.stderr.clone()),
            timed_out: false,
            duration: Duration::from_millis(5),
            output_truncated: false,
        })
    }

    fn name(&self) -> &str {
        "spy"
    }
}

/// Prober that answers alive for a fixed set of hosts and tracks concurrency
pub struct SpyProber {
    method: ProbeMethod,
    alive: HashSet<IpAddr>,
    delay: Duration,
    pub calls: AtomicUsize,
    pub ports: Mutex<Vec<u16>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl SpyProber {
    pub fn new(method: ProbeMethod, alive: &[&str], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            method,
            alive: alive.iter().map(|h| h.parse().unwrap()).collect(),
            delay,
            calls: AtomicUsize::new(0),
            ports: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn idle(method: ProbeMethod) -> Arc<Self> {
        Self::new(method, &[], Duration::ZERO)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Prober for SpyProber {
    async fn probe(&self, task: &ProbeTask) -> Result<ProbeOutcome, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ports.lock().unwrap().push(task.tcp_port);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.alive.contains(&task.host) {
            Ok(ProbeOutcome::alive(Some(1.5)))
        } else {
            Ok(ProbeOutcome::dead())
        }
    }

    fn method(&self) -> ProbeMethod {
        self.method
    }
}

/// Service wired to spies only; nothing touches the network or spawns a process
pub fn spy_service(config: AppConfig, executor: Arc<SpyExecutor>, icmp: Arc<SpyProber>, tcp: Arc<SpyProber>) -> ReconService {
    let executor: Arc<dyn Executor> = executor;
    let backends = Backends {
        executors: ExecutorSet::new(Arc::clone(&executor), executor),
        icmp,
        tcp,
    };
    ReconService::with_backends(config, backends)
}
