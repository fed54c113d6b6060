use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Role;

/// One event read by the Hook Entry Point (spec.md §4.4).
///
/// The wire contract only guarantees `type`, a session grouping key, a
/// `role`, and one of `prompt` | `content` | `response` carrying the raw
/// text (spec.md §6) — different host versions use different names for
/// the same field, so all three are accepted as aliases of `text`.
/// Everything else a host sends along is preserved in `extra` rather than
/// rejected, so a richer event from a newer host doesn't fail parsing here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(alias = "session_id")]
    pub session_key: String,
    pub role: Role,
    #[serde(alias = "prompt", alias = "content", alias = "response")]
    pub text: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_event() {
        let raw = r#"{"type":"message","session_key":"abc","role":"user","text":"hi"}"#;
        let event: HookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.event_type, "message");
        assert_eq!(event.role, Role::User);
        assert!(event.extra.is_empty());
    }

    #[test]
    fn preserves_unknown_fields_in_extra() {
        let raw = r#"{"type":"message","session_key":"abc","role":"assistant","text":"hi","model":"x"}"#;
        let event: HookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.extra.get("model").unwrap(), "x");
    }

    #[test]
    fn accepts_session_id_and_content_field_names() {
        let raw = r#"{"type":"message","session_id":"S1","role":"user","content":"Contact me at alice@example.com"}"#;
        let event: HookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.session_key, "S1");
        assert_eq!(event.text, "Contact me at alice@example.com");
    }

    #[test]
    fn accepts_response_field_name() {
        let raw = r#"{"type":"message","session_key":"S2","role":"assistant","response":"here you go"}"#;
        let event: HookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.text, "here you go");
    }
}
