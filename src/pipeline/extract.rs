//! Pull a single JSON object out of a model's free-text answer.
//!
//! Even when told to answer with JSON only, models wrap it in ```json
//! fences, prepend "Here is the plan:", or append a closing remark. We strip
//! an outer fence, then take the first balanced `{…}` that is valid JSON
//! (string-aware, so braces inside values do not confuse the scan, and prose
//! such as "using your {theme}" is skipped), then decode it strictly into the
//! stage's wire type.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*\n(.*?)\n\s*```").unwrap());

/// Locate the JSON object in `text`, or `None` if there is no balanced,
/// well-formed one.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let body = match RE_FENCE.captures(text) {
        Some(caps) => caps.get(1).map_or(text, |m| m.as_str()),
        None => text,
    };
    body.match_indices('{')
        .filter_map(|(start, _)| balanced_object_at(body, start))
        .find(|candidate| serde_json::from_str::<serde_json::Value>(candidate).is_ok())
}

/// The balanced `{…}` beginning at byte `start`, if it closes.
fn balanced_object_at(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract and strictly decode a `T` from a model answer.
///
/// The error string is suitable for a stage parse error's `detail`.
pub fn decode_response<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let json = extract_json_object(text).ok_or_else(|| "no JSON object in response".to_string())?;
    serde_json::from_str(json).map_err(|e| format!("schema mismatch: {e}"))
}
