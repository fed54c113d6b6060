use serde::Deserialize;

/// The single fixed prompt every validation call sends; the model is
/// asked for nothing but a JSON detection list over the given text
/// (spec.md §4.3).
pub fn build_prompt(content: &str) -> String {
    format!(
        r#"You are a privacy-redaction assistant. The following text has already \
passed a deterministic PII filter. Find any remaining personally \
identifying information: personal names, organization names, postal \
addresses, obfuscated secrets, or novel credential formats the filter \
would not recognize.

Respond with ONLY a JSON object of this exact shape, no prose:
{{"detections": [{{"category": "...", "text": "...", "start": 0, "end": 0, "confidence": 0.0, "reasoning": "..."}}]}}

`start`/`end` are character offsets into the text below, `confidence` is \
between 0.0 and 1.0. Return an empty array if nothing is found.

TEXT:
{content}"#
    )
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDetection {
    pub category: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelResponse {
    pub detections: Vec<RawDetection>,
}

/// Parses the model's JSON response, tolerating a response wrapped in a
/// markdown code fence (a common model habit this trait doesn't control).
pub fn parse_response(raw: &str) -> Result<ModelResponse, serde_json::Error> {
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
        let raw = r#"{"detections":[{"category":"person","text":"John Smith","start":0,"end":10,"confidence":0.92,"reasoning":"name"}]}"#;
        let parsed = parse_response(raw).unwrap();
        assert_eq!(parsed.detections.len(), 1);
        assert_eq!(parsed.detections[0].category, "person");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"detections\":[]}\n```";
        let parsed = parse_response(raw).unwrap();
        assert!(parsed.detections.is_empty());
    }
}
