use unicode_normalization::UnicodeNormalization;

const ZERO_WIDTH: [char; 5] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}', '\u{2060}'];

/// Canonical + compatibility composition, zero-width stripping, whitespace
/// collapsing, a fixed HTML entity table, and best-effort percent-decoding.
/// Any step that would fail (e.g. malformed percent escape) leaves its
/// input untouched rather than erroring — normalization never blocks
/// sanitization.
pub fn normalize(input: &str) -> String {
    let composed: String = input.nfkc().collect();
    let stripped: String = composed.chars().filter(|c| !ZERO_WIDTH.contains(c)).collect();
    let entities = decode_html_entities(&stripped);
    let url_decoded = best_effort_url_decode(&entities);
    collapse_whitespace(&url_decoded)
}

fn decode_html_entities(input: &str) -> String {
    input
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
}

fn best_effort_url_decode(input: &str) -> String {
    match urlencoding::decode(input) {
        Ok(decoded) if decoded.chars().all(|c| !c.is_control() || c.is_whitespace()) => {
            decoded.into_owned()
        }
        _ => input.to_string(),
    }
}

fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = false;
    for c in input.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_zero_width_characters() {
        let input = "se\u{200B}cret";
        assert_eq!(normalize(input), "secret");
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(normalize("a   b\t\tc\n\nd"), "a b c d");
    }

    #[test]
    fn decodes_html_entities() {
        assert_eq!(normalize("a &amp; b &lt;tag&gt;"), "a & b <tag>");
    }

    #[test]
    fn leaves_malformed_percent_escapes_alone() {
        assert_eq!(normalize("100%done"), "100%done");
    }
}
