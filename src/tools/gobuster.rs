//! Gobuster directory enumeration

use crate::params::GobusterParams;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

/// `/admin                (Status: 301) [Size: 169] [--> http://10.0.0.5/admin/]`
static FOUND_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<path>/\S*)\s+\(Status:\s*(?P<status>\d{3})\)(?:\s*\[Size:\s*(?P<size>\d+)\])?(?:\s*\[-->\s*(?P<redirect>[^\]]+)\])?")
        .expect("valid gobuster regex")
});

/// One discovered path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoundPath {
    pub path: String,
    pub status: Option<u16>,
    pub size: Option<u64>,
    pub redirect: Option<String>,
}

/// `dir -u <url> -w <wordlist> -t <threads> -q --no-progress --no-color`
pub fn args(params: &GobusterParams, wordlist: &str) -> Vec<String> {
    vec![
        "dir".to_string(),
        "-u".to_string(),
        params.url.trim().to_string(),
        "-w".to_string(),
        wordlist.to_string(),
        "-t".to_string(),
        params.threads.to_string(),
        "-q".to_string(),
        "--no-progress".to_string(),
        "--no-color".to_string(),
    ]
}

fn parse_line(line: &str) -> Option<FoundPath> {
    let line = line.trim();
    if let Some(caps) = FOUND_LINE.captures(line) {
        return Some(FoundPath {
            path: caps["path"].to_string(),
            status: caps.name("status").and_then(|m| m.as_str().parse().ok()),
            size: caps.name("size").and_then(|m| m.as_str().parse().ok()),
            redirect: caps.name("redirect").map(|m| m.as_str().trim().to_string()),
        });
    }

    // older releases print bare paths in quiet mode
    if line.starts_with('/') {
        let path = line.split_whitespace().next()?.to_string();
        return Some(FoundPath {
            path,
            status: None,
            size: None,
            redirect: None,
        });
    }

    None
}

/// Best-effort extraction; lines that do not look like results are ignored
pub fn parse(stdout: &str) -> Value {
    let found: Vec<FoundPath> = stdout.lines().filter_map(parse_line).collect();
    serde_json::to_value(found).unwrap_or(Value::Array(Vec::new()))
}
