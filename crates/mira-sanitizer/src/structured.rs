use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "secret",
    "token",
    "api_key",
    "client_secret",
    "private_key",
    "access_token",
    "refresh_token",
    "auth",
    "authorization",
];

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|k| lower.contains(k))
}

static KV_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?im)^([A-Za-z0-9_.\-]{1,64})\s*[:=]\s*['"]?([^\s'"]{8,500})['"]?\s*$"#).unwrap()
});

/// A span of `out` whose value should be replaced because its key name
/// matches the sensitive-key list and its value is at least 8 characters.
pub struct StructuredHit {
    pub start: usize,
    pub end: usize,
}

/// Scans `text` as JSON first; if that fails, falls back to a best-effort
/// line-oriented key/value scan. Either way only sensitive-keyed values of
/// sufficient length are reported.
pub fn scan(text: &str) -> Vec<StructuredHit> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        let mut hits = Vec::new();
        collect_json_hits(&value, text, &mut hits);
        if !hits.is_empty() {
            return hits;
        }
    }
    scan_key_value_lines(text)
}

fn collect_json_hits(value: &Value, text: &str, hits: &mut Vec<StructuredHit>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                if is_sensitive_key(key) {
                    if let Value::String(s) = v {
                        if s.len() >= 8 {
                            if let Some(start) = text.find(s.as_str()) {
                                hits.push(StructuredHit { start, end: start + s.len() });
                            }
                        }
                    }
                }
                collect_json_hits(v, text, hits);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_json_hits(item, text, hits);
            }
        }
        _ => {}
    }
}

fn scan_key_value_lines(text: &str) -> Vec<StructuredHit> {
    let mut hits = Vec::new();
    for cap in KV_LINE.captures_iter(text) {
        let key = cap.get(1).unwrap();
        let value = cap.get(2).unwrap();
        if is_sensitive_key(key.as_str()) && value.as_str().len() >= 8 {
            hits.push(StructuredHit { start: value.start(), end: value.end() });
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_sensitive_json_field() {
        let hits = scan(r#"{"username":"bob","password":"hunter2hunter2"}"#);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn finds_sensitive_kv_line() {
        let hits = scan("API_KEY=abcd1234efgh5678");
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn ignores_short_values() {
        let hits = scan(r#"{"token":"short"}"#);
        assert!(hits.is_empty());
    }
}
