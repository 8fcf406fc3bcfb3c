//! ffuf content fuzzing

use super::parse::{json_document, json_lines};
use crate::params::FfufParams;
use serde_json::{json, Value};

/// `-u <url> -w <wordlist> -t <threads> -json -s -noninteractive`
///
/// `-json` streams one JSON record per match on stdout, `-s` drops the banner.
pub fn args(params: &FfufParams, wordlist: &str) -> Vec<String> {
    vec![
        "-u".to_string(),
        params.url.trim().to_string(),
        "-w".to_string(),
        wordlist.to_string(),
        "-t".to_string(),
        params.threads.to_string(),
        "-json".to_string(),
        "-s".to_string(),
        "-noninteractive".to_string(),
    ]
}

/// Parse ffuf output into `{"results": [...]}`.
///
/// Accepts a full `-of json` document (returned as is), a single record, or
/// JSON lines. Empty output means no matches.
pub fn parse(stdout: &str) -> Result<Value, String> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(json!({ "results": [] }));
    }

    if let Ok(document) = serde_json::from_str::<Value>(trimmed) {
        return wrap(document);
    }

    let (records, skipped) = json_lines(trimmed);
    if !records.is_empty() {
        if skipped > 0 {
            log::debug!("Skipped {} non-JSON ffuf output lines", skipped);
        }
        return Ok(json!({ "results": records }));
    }

    json_document(trimmed).map_err(|e| format!("invalid JSON: {}", e)).and_then(wrap)
}

fn wrap(document: Value) -> Result<Value, String> {
    match document {
        Value::Object(ref map) if map.contains_key("results") => Ok(document),
        Value::Object(_) => Ok(json!({ "results": [document] })),
        other => Err(format!("expected a JSON object, got {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_follow_params() {
        let mut params = FfufParams::new("http://10.0.0.5/FUZZ");
        params.threads = 10;
        let args = args(&params, "/wordlists/common.txt");
        assert_eq!(&args[..6], ["-u", "http://10.0.0.5/FUZZ", "-w", "/wordlists/common.txt", "-t", "10"]);
        assert!(args.contains(&"-json".to_string()));
    }

    #[test]
    fn full_document_is_kept() {
        let doc = r#"{"commandline":"ffuf -u ...","results":[{"url":"http://10.0.0.5/a","status":200}]}"#;
        let parsed = parse(doc).unwrap();
        assert_eq!(parsed["commandline"], "ffuf -u ...");
        assert_eq!(parsed["results"][0]["status"], 200);
    }

    #[test]
    fn json_lines_are_collected() {
        let out = "{\"url\":\"http://10.0.0.5/a\",\"status\":200}\n{\"url\":\"http://10.0.0.5/b\",\"status\":403}\n";
        let parsed = parse(out).unwrap();
        assert_eq!(parsed["results"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["results"][1]["status"], 403);
    }

    #[test]
    fn empty_output_means_no_results() {
        assert_eq!(parse("\n").unwrap(), json!({ "results": [] }));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse("Encountered error(s): 1 errors occured.").is_err());
        assert!(parse("[1, 2]").is_err());
    }
}
