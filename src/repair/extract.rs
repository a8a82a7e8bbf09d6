use regex::Regex;
use std::sync::OnceLock;

use crate::errors::{GenError, GenResult};

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)```(?:json)?\s*").expect("static fence regex"))
}

/// Locates the JSON object inside raw provider text.
///
/// Text that already parses as an object is returned trimmed and otherwise untouched.
/// Otherwise markdown fences are dropped and the slice from the first `{` to the last `}`
/// is returned.
pub fn extract_json(raw: &str) -> GenResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GenError::EmptyResponse);
    }
    if trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Ok(trimmed.to_string());
    }

    let unfenced = fence_re().replace_all(trimmed, "");
    let text = unfenced.trim();
    if text.starts_with('{') && text.ends_with('}') {
        return Ok(text.to_string());
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(text[start..=end].to_string()),
        // Truncated output: keep everything from the first brace so the cascade can close it.
        (Some(start), _) => Ok(text[start..].to_string()),
        _ => Err(GenError::NoJsonFound),
    }
}
