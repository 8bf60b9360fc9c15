//! Small string helpers shared by the digests

/// Collapse runs of whitespace (including newlines) into single spaces
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_chars` characters, marking the cut with `...`
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a\n\tb   c \n"), "a b c");
        assert_eq!(normalize_whitespace(""), "");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefghij", 10), "abcdefghij");
        assert_eq!(truncate_chars("abcdefghijk", 10), "abcdefg...");
        assert_eq!(truncate_chars("日本語のテキスト", 5), "日本...");
    }
}
