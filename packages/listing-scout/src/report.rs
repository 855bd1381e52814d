//! Comparison report cleanup.
//!
//! Models wrap markdown in code fences and pad it with blank lines. The
//! cleaned text is what gets stored and returned.

use regex::Regex;
use std::sync::LazyLock;

static RE_BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)*").unwrap());
static RE_SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());

/// Strip a surrounding code fence, collapse runs of blank lines to one and
/// runs of spaces to a single space. Empty input stays empty.
pub fn clean_report(raw: &str) -> String {
    let mut text = raw.trim().replace("\r\n", "\n");

    if text.starts_with("```") {
        let lines: Vec<&str> = text.lines().collect();
        let body_end = if lines.len() > 1 && lines[lines.len() - 1].trim() == "```" {
            lines.len() - 1
        } else {
            lines.len()
        };
        text = lines[1..body_end].join("\n");
    }

    let text = RE_BLANK_RUNS.replace_all(&text, "\n\n");
    let text = RE_SPACE_RUNS.replace_all(&text, " ");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_fences() {
        let raw = "```markdown\n# Title\n\nBody\n```";
        assert_eq!(clean_report(raw), "# Title\n\nBody");
    }

    #[test]
    fn test_unterminated_fence() {
        assert_eq!(clean_report("```\n# Title"), "# Title");
    }

    #[test]
    fn test_collapses_whitespace() {
        let raw = "# Title\n\n\n   \n## Section   one\r\nline";
        assert_eq!(clean_report(raw), "# Title\n\n## Section one\nline");
    }

    #[test]
    fn test_blank_stays_blank() {
        assert_eq!(clean_report("  \n "), "");
        assert_eq!(clean_report("```\n```"), "");
    }

    #[test]
    fn test_idempotent() {
        let raw = "```\n# A\n\n\n\nB    C\n```";
        let once = clean_report(raw);
        assert_eq!(clean_report(&once), once);
    }
}
