//! Best-effort recovery of JSON from model output.
//!
//! Local models wrap JSON in code fences, prefix it with prose, or emit several
//! objects back to back (`{..}{..}` / `{..}\n{..}`). We read every complete
//! value we can find instead of giving up on the first parse error.

use serde_json::Value;

/// Remove a surrounding Markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Every complete JSON value in `text`, in order.
///
/// Parsing starts at the first `{` or `[` and stops at the first thing that is
/// not a complete value, keeping whatever was read before it.
pub fn parse_concatenated(text: &str) -> Vec<Value> {
    let body = strip_code_fences(text);
    let Some(start) = body.find(['{', '[']) else {
        return Vec::new();
    };

    serde_json::Deserializer::from_str(&body[start..])
        .into_iter::<Value>()
        .map_while(Result::ok)
        .collect()
}
