//! Shared output parsing helpers

use serde_json::Value;

/// Parse a JSON object from tool stdout.
///
/// Tries the whole text first, then the slice between the first `{` and the
/// last `}` so banners printed around the document are tolerated. Anything
/// else, including a truncated document, is an error.
pub fn json_document(text: &str) -> Result<Value, serde_json::Error> {
    let trimmed = text.trim();
    let first_error = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => serde_json::from_str(&trimmed[start..=end]),
        _ => Err(first_error),
    }
}

/// Parse newline-delimited JSON objects, skipping lines that are not objects.
/// Returns the objects and the number of skipped non-empty lines.
pub fn json_lines(text: &str) -> (Vec<Value>, usize) {
    let mut records = Vec::new();
    let mut skipped = 0;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<Value>(line) {
            Ok(value) if value.is_object() => records.push(value),
            _ => skipped += 1,
        }
    }

    (records, skipped)
}
