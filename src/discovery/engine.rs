//! Host Discovery Engine - sweep orchestrator

use super::targets::expand;
use super::{DiscoveryError, DiscoveryResult, HostError, ProbeMethod, ProbeOutcome, ProbeTask, Prober};
use crate::params::PingSweepParams;
use log::{debug, info, warn};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

/// Sweep settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    pub network: String,
    pub method: ProbeMethod,
    pub tcp_port: u16,
    /// Maximum probes in flight
    pub concurrency: usize,
    /// Per-probe timeout
    pub timeout: Duration,
    pub max_hosts: usize,
    /// Fall back to a TCP connect when ICMP is not permitted
    pub fallback_tcp: bool,
}

impl From<&PingSweepParams> for SweepConfig {
    fn from(params: &PingSweepParams) -> Self {
        Self {
            network: params.network.clone(),
            method: params.method,
            tcp_port: params.tcp_port,
            concurrency: params.concurrency,
            timeout: params.probe_timeout(),
            max_hosts: params.max_hosts,
            fallback_tcp: params.fallback_tcp,
        }
    }
}

/// What one probe task reports back to the aggregator
#[derive(Debug)]
struct ProbeReport {
    host: IpAddr,
    outcome: ProbeOutcome,
    error: Option<HostError>,
}

/// Single-consumer accumulator
struct Aggregator {
    result: DiscoveryResult,
    max_errors: usize,
}

impl Aggregator {
    fn new(max_errors: usize) -> Self {
        Self {
            result: DiscoveryResult {
                scanned: 0,
                alive_count: 0,
                hosts: Vec::new(),
                rtt_ms: Default::default(),
                errors: Vec::new(),
                errors_dropped: 0,
                truncated: false,
            },
            max_errors,
        }
    }

    fn push_error(&mut self, error: HostError) {
        if self.result.errors.len() < self.max_errors {
            self.result.errors.push(error);
        } else {
            self.result.errors_dropped += 1;
        }
    }

    fn record(&mut self, report: ProbeReport) {
        if let Some(error) = report.error {
            self.push_error(error);
        }
        if report.outcome.alive {
            let host = report.host.to_string();
            if let Some(rtt) = report.outcome.rtt_ms {
                self.result.rtt_ms.insert(host.clone(), rtt);
            }
            self.result.hosts.push(host);
            self.result.alive_count += 1;
        }
    }
}

/// Bounded-concurrency liveness sweeper
#[derive(Clone)]
pub struct DiscoveryEngine {
    icmp: Arc<dyn Prober>,
    tcp: Arc<dyn Prober>,
    max_reported_errors: usize,
}

impl DiscoveryEngine {
    pub fn new(icmp: Arc<dyn Prober>, tcp: Arc<dyn Prober>, max_reported_errors: usize) -> Self {
        Self {
            icmp,
            tcp,
            max_reported_errors,
        }
    }

    /// Probe one host with its own timeout, falling back to TCP when ICMP is refused
    async fn probe_host(icmp: Arc<dyn Prober>, tcp: Arc<dyn Prober>, task: ProbeTask, fallback_tcp: bool) -> ProbeReport {
        let primary = match task.method {
            ProbeMethod::Icmp => icmp,
            ProbeMethod::Tcp => Arc::clone(&tcp),
        };

        let attempt = async {
            match primary.probe(&task).await {
                Err(DiscoveryError::PermissionDenied(reason)) if fallback_tcp && task.method == ProbeMethod::Icmp => {
                    let fallback = task.with_method(ProbeMethod::Tcp);
                    let error = HostError {
                        host: task.host.to_string(),
                        error: format!("{}; fell back to tcp/{}", reason, task.tcp_port),
                        fallback: Some(ProbeMethod::Tcp),
                    };
                    match tcp.probe(&fallback).await {
                        Ok(outcome) => (outcome, Some(error)),
                        Err(e) => (
                            ProbeOutcome::dead(),
                            Some(HostError {
                                error: format!("{}; fallback failed: {}", error.error, e),
                                ..error
                            }),
                        ),
                    }
                }
                Ok(outcome) => (outcome, None),
                Err(e) => (
                    ProbeOutcome::dead(),
                    Some(HostError {
                        host: task.host.to_string(),
                        error: e.to_string(),
                        fallback: None,
                    }),
                ),
            }
        };

        let (outcome, error) = match tokio::time::timeout(task.timeout, attempt).await {
            Ok(answer) => answer,
            Err(_) => (ProbeOutcome::dead(), None),
        };

        ProbeReport {
            host: task.host,
            outcome,
            error,
        }
    }

    /// Run a sweep.
    ///
    /// At most `concurrency` probes are in flight: a permit is taken before a
    /// probe task is spawned and released when its report is sent. Reports
    /// are folded by a single consumer, so `hosts` is in completion order.
    pub async fn sweep(&self, config: &SweepConfig) -> DiscoveryResult {
        let (mut targets, invalid) = expand(&config.network);
        let concurrency = config.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let (tx, mut rx) = mpsc::channel::<ProbeReport>(concurrency);

        info!(
            "Sweeping {} via {} (concurrency {}, timeout {:?}, max_hosts {})",
            config.network, config.method, concurrency, config.timeout, config.max_hosts
        );

        let producer = {
            let icmp = Arc::clone(&self.icmp);
            let tcp = Arc::clone(&self.tcp);
            let config = config.clone();
            async move {
                let mut scanned = 0usize;
                let mut truncated = false;

                while let Some(host) = targets.next() {
                    if scanned == config.max_hosts {
                        truncated = true;
                        break;
                    }

                    let permit = match Arc::clone(&semaphore).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };

                    let task = ProbeTask {
                        host,
                        method: config.method,
                        tcp_port: config.tcp_port,
                        timeout: config.timeout,
                    };
                    let tx = tx.clone();
                    let icmp = Arc::clone(&icmp);
                    let tcp = Arc::clone(&tcp);
                    let fallback_tcp = config.fallback_tcp;

                    debug!("Probing {} via {}", host, config.method);
                    tokio::spawn(async move {
                        let report = Self::probe_host(icmp, tcp, task, fallback_tcp).await;
                        let _ = tx.send(report).await;
                        drop(permit);
                    });
                    scanned += 1;
                }

                // closing the last sender ends the consumer once every task reported
                drop(tx);
                (scanned, truncated)
            }
        };

        let max_errors = self.max_reported_errors;
        let consumer = async move {
            let mut aggregator = Aggregator::new(max_errors);
            while let Some(report) = rx.recv().await {
                aggregator.record(report);
            }
            aggregator
        };

        let ((scanned, truncated), mut aggregator) = tokio::join!(producer, consumer);

        for entry in invalid {
            aggregator.push_error(HostError {
                host: entry,
                error: "unparseable target entry".to_string(),
                fallback: None,
            });
        }

        let mut result = aggregator.result;
        result.scanned = scanned;
        result.truncated = truncated;

        if truncated {
            warn!(
                "Sweep of {} truncated at max_hosts={}",
                config.network, config.max_hosts
            );
        }
        info!(
            "Sweep finished: {} scanned, {} alive, {} errors",
            result.scanned,
            result.alive_count,
            result.errors.len() + result.errors_dropped
        );

        result
    }
}
