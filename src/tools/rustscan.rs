//! RustScan port discovery, without the nmap follow-up

use crate::params::RustScanParams;
use std::collections::BTreeSet;

/// Build rustscan arguments.
///
/// A single `a-b` range goes to `-r`; anything else is expanded into an
/// explicit `-p` list. `-g` prints greppable results and `--scripts none`
/// keeps rustscan from chaining into nmap.
pub fn args(params: &RustScanParams) -> Vec<String> {
    let range = params.normalized_range();
    let mut args = vec!["-a".to_string(), params.target.trim().to_string()];

    match single_range(&range) {
        Some(range) => {
            args.push("-r".to_string());
            args.push(range);
        }
        None => {
            args.push("-p".to_string());
            args.push(expand_ports(&range));
        }
    }

    args.push("--timeout".to_string());
    args.push(params.port_timeout_ms.to_string());
    args.push("--ulimit".to_string());
    args.push(params.ulimit.to_string());
    if let Some(batch) = params.batch_size {
        args.push("-b".to_string());
        args.push(batch.to_string());
    }
    args.push("-g".to_string());
    args.push("--scripts".to_string());
    args.push("none".to_string());
    args
}

fn single_range(range: &str) -> Option<String> {
    if range.contains(',') {
        return None;
    }
    range.split_once('-').map(|(low, high)| format!("{}-{}", low, high))
}

/// `22,8000-8002` -> `22,8000,8001,8002`
fn expand_ports(spec: &str) -> String {
    let mut ports = BTreeSet::new();
    for part in spec.split(',').filter(|p| !p.is_empty()) {
        let (low, high) = part.split_once('-').unwrap_or((part, part));
        if let (Ok(low), Ok(high)) = (low.parse::<u16>(), high.parse::<u16>()) {
            ports.extend(low..=high);
        }
    }
    ports.iter().map(u16::to_string).collect::<Vec<_>>().join(",")
}

/// Open ports from greppable output (`10.0.0.5 -> [22,80]`), sorted and de-duplicated
pub fn parse_ports(stdout: &str) -> Vec<u16> {
    let mut ports = BTreeSet::new();

    for line in stdout.lines() {
        let list = match line.split_once("->") {
            Some((_, rest)) => rest,
            None => continue,
        };
        let list = list.trim().trim_start_matches('[').trim_end_matches(']');
        for port in list.split(',').filter_map(|p| p.trim().parse::<u16>().ok()) {
            if port != 0 {
                ports.insert(port);
            }
        }
    }

    ports.into_iter().collect()
}
