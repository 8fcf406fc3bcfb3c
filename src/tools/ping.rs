//! System ping helpers for ICMP liveness checks

use once_cell::sync::Lazy;
use regex::Regex;

static RTT: Lazy<Regex> = Lazy::new(|| Regex::new(r"time[=<]\s*([0-9.]+)\s*ms").expect("valid rtt regex"));

/// `-c 1 -W <timeout_s> <host>`
pub fn args(host: &str, timeout_s: u64) -> Vec<String> {
    vec![
        "-c".to_string(),
        "1".to_string(),
        "-W".to_string(),
        timeout_s.max(1).to_string(),
        host.to_string(),
    ]
}

/// Round-trip time of the first reply, in milliseconds
pub fn parse_rtt(output: &str) -> Option<f64> {
    RTT.captures(output)?.get(1)?.as_str().parse().ok()
}

/// Raw ICMP sockets were refused (no CAP_NET_RAW, no setuid ping)
pub fn permission_denied(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    ["operation not permitted", "permission denied", "are you root", "socket: lacking privilege"]
        .iter()
        .any(|marker| stderr.contains(marker))
}
