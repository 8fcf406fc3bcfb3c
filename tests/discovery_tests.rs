//! Host discovery sweeps

mod common;

use common::{spy_service, SpyExecutor, SpyProber};
use reconkit::discovery::{DiscoveryEngine, ProbeMethod, Prober, SweepConfig, TcpProber};
use reconkit::params::{HostProbeParams, PingSweepParams};
use reconkit::{AppConfig, ErrorKind};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn sweep_config(network: &str, concurrency: usize) -> SweepConfig {
    SweepConfig {
        network: network.to_string(),
        method: ProbeMethod::Icmp,
        tcp_port: 80,
        concurrency,
        timeout: Duration::from_secs(2),
        max_hosts: 1024,
        fallback_tcp: true,
    }
}

fn engine(icmp: Arc<SpyProber>) -> DiscoveryEngine {
    DiscoveryEngine::new(icmp, SpyProber::idle(ProbeMethod::Tcp), 64)
}

#[tokio::test]
async fn test_in_flight_probes_never_exceed_concurrency() {
    let icmp = SpyProber::new(ProbeMethod::Icmp, &[], Duration::from_millis(20));
    let engine = engine(icmp.clone());

    let result = engine.sweep(&sweep_config("10.0.0.0/26", 5)).await;

    assert_eq!(result.scanned, 62);
    assert_eq!(icmp.call_count(), 62);
    let peak = icmp.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 5, "peak in-flight {}", peak);
    assert!(peak >= 2, "probes never overlapped");
}

#[tokio::test]
async fn test_sweep_stops_at_max_hosts() {
    let icmp = SpyProber::idle(ProbeMethod::Icmp);
    let engine = engine(icmp.clone());
    let mut config = sweep_config("10.0.0.1-50", 8);
    config.max_hosts = 10;

    let result = engine.sweep(&config).await;

    assert!(result.truncated);
    assert_eq!(result.scanned, 10);
    assert_eq!(icmp.call_count(), 10);
}

#[tokio::test]
async fn test_silent_host_ends_by_probe_timeout() {
    let icmp = SpyProber::new(ProbeMethod::Icmp, &["10.0.0.1"], Duration::from_secs(60));
    let engine = engine(icmp);
    let mut config = sweep_config("10.0.0.1", 4);
    config.timeout = Duration::from_millis(200);
    let start = Instant::now();

    let result = engine.sweep(&config).await;

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(result.scanned, 1);
    assert_eq!(result.alive_count, 0);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_tcp_sweep_of_slash_30_reports_the_live_host() {
    let icmp = SpyProber::idle(ProbeMethod::Icmp);
    let tcp = SpyProber::new(ProbeMethod::Tcp, &["10.0.0.1"], Duration::ZERO);
    let service = spy_service(
        AppConfig::default().with_allowed_prefix("10.0.0."),
        SpyExecutor::succeeding(""),
        icmp.clone(),
        tcp.clone(),
    );
    let mut params = PingSweepParams::new("10.0.0.0/30");
    params.method = ProbeMethod::Tcp;
    params.tcp_port = 80;
    params.concurrency = 2;
    params.timeout_s = 1;

    let result = service.ping_sweep(params).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.get("scanned"), Some(&json!(2)));
    assert_eq!(result.get("alive_count"), Some(&json!(1)));
    assert_eq!(result.get("hosts"), Some(&json!(["10.0.0.1"])));
    assert_eq!(result.get("errors"), Some(&json!([])));
    assert_eq!(result.get("truncated"), Some(&json!(false)));
    assert_eq!(tcp.call_count(), 2);
    assert_eq!(*tcp.ports.lock().unwrap(), vec![80, 80]);
    assert_eq!(icmp.call_count(), 0);
}

#[tokio::test]
async fn test_sweep_with_nothing_parseable_is_invalid_params() {
    let service = spy_service(
        AppConfig::default(),
        SpyExecutor::succeeding(""),
        SpyProber::idle(ProbeMethod::Icmp),
        SpyProber::idle(ProbeMethod::Tcp),
    );

    let result = service.ping_sweep(PingSweepParams::new("not-a-network")).await;

    assert!(!result.success);
    assert_eq!(result.error_kind(), Some(ErrorKind::InvalidParams));
}

#[tokio::test]
async fn test_tcp_probe_counts_listening_and_refusing_ports_as_alive() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open_port = listener.local_addr().unwrap().port();

    // bind then drop to get a port that is very likely closed
    let closed_port = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };

    let prober = TcpProber::new();
    for port in [open_port, closed_port] {
        let task = reconkit::discovery::ProbeTask {
            host: "127.0.0.1".parse().unwrap(),
            method: ProbeMethod::Tcp,
            tcp_port: port,
            timeout: Duration::from_secs(2),
        };
        let outcome = prober.probe(&task).await.unwrap();
        assert!(outcome.alive, "port {} reported dead", port);
        assert!(outcome.rtt_ms.is_some());
    }
    drop(listener);
}

#[tokio::test]
async fn test_tcp_sweep_over_loopback() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let engine = DiscoveryEngine::new(SpyProber::idle(ProbeMethod::Icmp), Arc::new(TcpProber::new()), 64);
    let mut config = sweep_config("127.0.0.1", 1);
    config.method = ProbeMethod::Tcp;
    config.tcp_port = port;

    let result = engine.sweep(&config).await;

    assert_eq!(result.hosts, vec!["127.0.0.1".to_string()]);
    assert!(result.rtt_ms.contains_key("127.0.0.1"));
}

#[tokio::test]
async fn test_host_probe_over_tcp_reports_alive() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let executor = SpyExecutor::succeeding("");
    let service = reconkit::ReconService::with_backends(
        AppConfig::default().with_allowed_prefix("127."),
        reconkit::Backends {
            executors: reconkit::ExecutorSet::new(executor.clone(), executor.clone()),
            icmp: SpyProber::idle(ProbeMethod::Icmp),
            tcp: Arc::new(TcpProber::new()),
        },
    );
    let mut params = HostProbeParams::new("127.0.0.1");
    params.method = ProbeMethod::Tcp;
    params.tcp_port = port;

    let result = service.host_probe(params).await;

    assert!(result.success);
    assert_eq!(result.get("alive"), Some(&json!(true)));
    assert_eq!(result.get("method"), Some(&json!("tcp")));
    assert_eq!(executor.call_count(), 0);
}

#[tokio::test]
async fn test_host_probe_icmp_reads_ping_output() {
    let executor = SpyExecutor::succeeding(
        "64 bytes from 10.0.0.9: icmp_seq=1 ttl=64 time=0.412 ms\n\n1 packets transmitted, 1 received\n",
    );
    let service = spy_service(
        AppConfig::default(),
        executor.clone(),
        SpyProber::idle(ProbeMethod::Icmp),
        SpyProber::idle(ProbeMethod::Tcp),
    );

    let result = service.host_probe(HostProbeParams::new("10.0.0.9")).await;

    assert!(result.success);
    assert_eq!(result.get("alive"), Some(&json!(true)));
    assert_eq!(result.get("rtt_ms"), Some(&json!(0.412)));
    let spec = executor.last().unwrap();
    assert_eq!(spec.program, "ping");
    assert_eq!(spec.args.last().map(String::as_str), Some("10.0.0.9"));
}
