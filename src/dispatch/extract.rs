//! Lenient recovery of a JSON object from free-form model output.
//!
//! Small instruction-tuned models wrap their answer in Markdown fences or
//! surround it with prose even when asked for strict JSON. The extractor
//! tries, in order: the fence-stripped text as is, then the span from the
//! first `{` to the last `}`. Anything that is not an object is rejected.
//! No semantic checks happen here.

use serde_json::{Map, Value};

/// Recover a JSON object from model text, or `None`.
pub fn extract(raw: &str) -> Option<Map<String, Value>> {
    let text = strip_fences(raw);
    parse_object(text).or_else(|| {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        if end < start {
            return None;
        }
        parse_object(&text[start..=end])
    })
}

fn strip_fences(raw: &str) -> &str {
    let s = raw.trim();
    let s = s.strip_prefix("```json").unwrap_or(s);
    let s = s.strip_suffix("```").unwrap_or(s);
    s.trim()
}

fn parse_object(s: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(s) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}
