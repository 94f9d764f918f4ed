//! Lenient extraction of JSON from model replies.
//!
//! Replies may wrap the payload in Markdown fences or surround it with prose.
//! Extraction tries, in order: the whole trimmed text, the contents of a
//! `` ```json `` fence, the contents of a bare `` ``` `` fence, the outermost
//! `{...}` slice, the outermost `[...]` slice.

use serde_json::Value;

/// Outcome of parsing a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedJson {
    /// A JSON object or array was recovered.
    Ok(Value),
    /// Nothing parseable; carries the raw reply for logging.
    ParseFailure(String),
}

impl ParsedJson {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// The parsed value, if any.
    pub fn value(self) -> Option<Value> {
        match self {
            Self::Ok(v) => Some(v),
            Self::ParseFailure(_) => None,
        }
    }
}

/// Parse a model reply into a JSON object or array.
///
/// Scalars (`"yes"`, `42`) are treated as failures since every prompt in this
/// crate asks for an object or an array.
pub fn parse_reply(raw: &str) -> ParsedJson {
    let text = raw.trim().trim_matches('\u{feff}');

    let mut candidates: Vec<&str> = vec![text];
    if let Some(block) = fenced(text, "```json") {
        candidates.push(block);
    }
    if let Some(block) = fenced(text, "```") {
        candidates.push(block);
    }
    if let Some(slice) = delimited(text, '{', '}') {
        candidates.push(slice);
    }
    if let Some(slice) = delimited(text, '[', ']') {
        candidates.push(slice);
    }

    for candidate in candidates {
        if let Ok(value) = serde_json::from_str::<Value>(candidate.trim())
            && (value.is_object() || value.is_array())
        {
            return ParsedJson::Ok(value);
        }
    }
    ParsedJson::ParseFailure(raw.to_string())
}

/// Body of the first fence opened by `opener`, up to the next closing fence.
fn fenced<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(&rest[..end])
}

fn delimited(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (start < end).then(|| &text[start..=end])
}

/// Read a score field as a number in [0, 1]; strings such as `"0.8"` are accepted.
pub fn score_field(value: &Value, key: &str) -> Option<f64> {
    let raw = &value[key];
    let score = raw
        .as_f64()
        .or_else(|| raw.as_str().and_then(|s| s.trim().parse::<f64>().ok()))?;
    score.is_finite().then(|| score.clamp(0.0, 1.0))
}

/// Read a string field, trimming whitespace.
pub fn string_field(value: &Value, key: &str) -> Option<String> {
    match &value[key] {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
