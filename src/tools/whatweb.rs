//! WhatWeb fingerprinting

use crate::params::WhatWebParams;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

/// `http://10.0.0.5 [200 OK] Apache[2.4.41], Title[Welcome]`
static RESULT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<url>\S+)\s+\[(?P<status>\d{3})(?P<reason>[^\]]*)\]\s*(?P<plugins>.*)$").expect("valid whatweb regex")
});

/// `--color=never -a <aggression> <target>`
pub fn args(params: &WhatWebParams) -> Vec<String> {
    vec![
        "--color=never".to_string(),
        "-a".to_string(),
        params.aggression.to_string(),
        params.target.trim().to_string(),
    ]
}

/// Split on commas that are not inside brackets
fn split_plugins(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

/// `HTTPServer[Ubuntu Linux][Apache/2.4.41]` -> ("HTTPServer", ["Ubuntu Linux", "Apache/2.4.41"])
fn plugin(entry: &str) -> (String, Vec<String>) {
    let name_end = entry.find('[').unwrap_or(entry.len());
    let name = entry[..name_end].trim().to_string();

    let mut values = Vec::new();
    let mut rest = &entry[name_end..];
    while let Some(open) = rest.find('[') {
        match rest[open..].find(']') {
            Some(close) => {
                values.push(rest[open + 1..open + close].to_string());
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    (name, values)
}

/// Extract `{url, status, plugins}` per result line; unknown lines are skipped
pub fn parse(stdout: &str) -> Value {
    let mut results = Vec::new();

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let caps = match RESULT_LINE.captures(line) {
            Some(caps) => caps,
            None => continue,
        };

        let mut plugins = Map::new();
        for entry in split_plugins(&caps["plugins"]) {
            let (name, values) = plugin(entry);
            if !name.is_empty() {
                plugins.insert(name, json!(values));
            }
        }

        results.push(json!({
            "url": &caps["url"],
            "status": caps["status"].parse::<u16>().ok(),
            "plugins": plugins,
        }));
    }

    Value::Array(results)
}
