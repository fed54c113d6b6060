use serde::Deserialize;

/// The single fixed prompt every extraction call sends. Temperature 0 is
/// set by the caller on the oracle request, not encoded here (spec.md
/// §4.9).
pub fn build_prompt(transcript: &str) -> String {
    format!(
        r#"You are reviewing a developer/AI-assistant conversation that has \
already been sanitized of personal information. Identify any durable, \
reusable learnings: patterns, best practices, anti-patterns, bug fixes, \
optimizations, tool usage notes, workflow notes, or decisions that would \
help in a future unrelated conversation. Do not invent anything not \
present in the transcript.

Respond with ONLY a JSON object of this exact shape, no prose:
{{"learnings": [{{"category": "...", "title": "...", "content": "...", "tags": ["..."], "confidence": 0.0, "reasoning": "..."}}]}}

`category` must be one of: pattern, best_practice, anti_pattern, bug_fix, \
optimization, tool_usage, workflow, decision. `confidence` is between 0.0 \
and 1.0. Return an empty array if nothing is worth keeping.

TRANSCRIPT:
{transcript}"#
    )
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLearning {
    pub category: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionResponse {
    pub learnings: Vec<RawLearning>,
}

/// Parses the model's JSON response, tolerating a response wrapped in a
/// markdown code fence.
pub fn parse_response(raw: &str) -> Result<ExtractionResponse, serde_json::Error> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed)
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let raw = r#"{"learnings":[{"category":"bug_fix","title":"t","content":"c","tags":["rust"],"confidence":0.9,"reasoning":"r"}]}"#;
        let parsed = parse_response(raw).unwrap();
        assert_eq!(parsed.learnings.len(), 1);
        assert_eq!(parsed.learnings[0].category, "bug_fix");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"learnings\":[]}\n```";
        let parsed = parse_response(raw).unwrap();
        assert!(parsed.learnings.is_empty());
    }
}
