use mira_store::messages::MessageRow;
use mira_types::Role;

const MIN_ASSISTANT_CONTENT_LEN: usize = 200;

/// Keywords whose presence suggests the conversation actually solved
/// something worth distilling, rather than idle chat (spec.md §4.9).
const PROBLEM_SOLVING_CUES: &[&str] =
    &["because", "instead of", "the bug was", "root cause", "fix", "workaround", "turns out"];

/// Cheap pre-filter run before any LLM call: rejects conversations that
/// can't plausibly contain a learning, so the extraction job never spends
/// budget on them.
pub fn passes_prefilter(messages: &[MessageRow]) -> bool {
    let assistant_content: String = messages
        .iter()
        .filter(|m| m.role == Role::Assistant.as_str())
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    if assistant_content.is_empty() {
        return false;
    }
    if assistant_content.len() < MIN_ASSISTANT_CONTENT_LEN {
        return false;
    }

    has_code_fence(&assistant_content) || has_problem_solving_cue(&assistant_content)
}

fn has_code_fence(content: &str) -> bool {
    content.contains("```")
}

fn has_problem_solving_cue(content: &str) -> bool {
    let lowered = content.to_lowercase();
    PROBLEM_SOLVING_CUES.iter().any(|cue| lowered.contains(cue))
}
