//! Canonicalization shared by both sides of every comparison.
//!
//! Only structurally significant event lines survive: lines beginning with
//! `+`, `-` or `=`. Comment annotations and trailing empty-collection
//! indicators are removed first, then the whole blob is trimmed.

/// Prefix of comment-annotation lines emitted by some test receivers.
const COMMENT_PREFIX: &str = "=COMMENT ";

/// Canonicalize raw parser output into a comparable event stream.
#[must_use]
pub fn canonicalize(raw: &str) -> String {
    let kept: Vec<&str> = raw
        .lines()
        .map(strip_empty_collection)
        .filter(|line| !line.starts_with(COMMENT_PREFIX))
        .filter(|line| is_event_line(line))
        .collect();
    kept.join("\n").trim().to_string()
}

/// Remove one trailing ` {}` / ` []` (at least one whitespace before it).
fn strip_empty_collection(line: &str) -> &str {
    let Some(rest) = line
        .strip_suffix("{}")
        .or_else(|| line.strip_suffix("[]"))
    else {
        return line;
    };
    if rest.ends_with(char::is_whitespace) {
        rest.trim_end()
    } else {
        line
    }
}

fn is_event_line(line: &str) -> bool {
    matches!(line.as_bytes().first(), Some(b'+' | b'-' | b'='))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_flow_indicators() {
        assert_eq!(canonicalize("+MAP {}\n"), "+MAP");
        assert_eq!(canonicalize("+SEQ []\n"), "+SEQ");
        assert_eq!(canonicalize("+DOC {}"), "+DOC");
    }

    #[test]
    fn indicator_without_leading_space_is_kept() {
        assert_eq!(canonicalize("=VAL :{}"), "=VAL :{}");
    }

    #[test]
    fn only_last_indicator_is_stripped() {
        assert_eq!(canonicalize("+MAP {} {}"), "+MAP {}");
    }

    #[test]
    fn comment_lines_are_dropped() {
        let raw = "+STR\n=COMMENT hello world\n-STR\n";
        assert_eq!(canonicalize(raw), "+STR\n-STR");
    }

    #[test]
    fn non_event_lines_are_dropped() {
        let raw = "parsing...\n+STR\n  indented noise\n\n-STR\ndone\n";
        assert_eq!(canonicalize(raw), "+STR\n-STR");
    }

    #[test]
    fn blank_line_does_not_swallow_following_event() {
        let raw = "+STR\n\n+DOC\n-DOC\n-STR";
        assert_eq!(canonicalize(raw), "+STR\n+DOC\n-DOC\n-STR");
    }

    #[test]
    fn crlf_input_is_equivalent() {
        assert_eq!(
            canonicalize("+STR\r\n+DOC\r\n-DOC\r\n-STR\r\n"),
            canonicalize("+STR\n+DOC\n-DOC\n-STR\n")
        );
    }

    #[test]
    fn trailing_whitespace_of_blob_is_trimmed() {
        assert_eq!(canonicalize("+STR\n-STR   \n\n"), "+STR\n-STR");
        assert_eq!(canonicalize(""), "");
    }
}
