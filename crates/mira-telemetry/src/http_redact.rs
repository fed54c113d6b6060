/// Header names that must never reach a log line verbatim, regardless of
/// the allowlist schema for the event that triggered the log (spec.md
/// §4.8). Compared case-insensitively.
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

const PLACEHOLDER: &str = "[REDACTED]";

/// Strips sensitive headers and any query string from a URL before it is
/// allowed into a log entry's metadata. Call this at the boundary where an
/// HTTP request/response is about to be logged (e.g. an oracle call),
/// never log the raw `reqwest::Request`/`Response` directly.
pub fn redact_url_for_log(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _query)) => format!("{base}?{PLACEHOLDER}"),
        None => url.to_string(),
    }
}

/// Redacts sensitive header values in place, keeping the header name
/// visible so a log line can still show which headers were present.
pub fn redact_headers_for_log(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            if SENSITIVE_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
                (name.clone(), PLACEHOLDER.to_string())
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_query_string() {
        assert_eq!(redact_url_for_log("https://api.example.com/v1/chat?key=abc123"), "https://api.example.com/v1/chat?[REDACTED]");
    }

    #[test]
    fn leaves_bare_url_alone() {
        assert_eq!(redact_url_for_log("https://api.example.com/v1/chat"), "https://api.example.com/v1/chat");
    }

    #[test]
    fn redacts_sensitive_header_values_case_insensitively() {
        let headers = vec![
            ("Authorization".to_string(), "Bearer secret".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("X-Api-Key".to_string(), "k-123".to_string()),
        ];
        let redacted = redact_headers_for_log(&headers);
        assert_eq!(redacted[0].1, "[REDACTED]");
        assert_eq!(redacted[1].1, "application/json");
        assert_eq!(redacted[2].1, "[REDACTED]");
    }
}
