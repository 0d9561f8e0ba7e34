//! Helpers shared by tool implementations

/// Maximum tool output length before truncation
pub const MAX_RESPONSE_LEN: usize = 16000;

/// Appended to output that was cut short
pub const TRUNCATED_MESSAGE: &str = "<response clipped><NOTE>To save on context only part of this output has been shown to you. Narrow the command or view a smaller line range.</NOTE>";

/// Truncate content if it exceeds the specified length in bytes
///
/// The cut always lands on a char boundary.
pub fn maybe_truncate(content: &str, truncate_after: Option<usize>) -> String {
    let limit = truncate_after.unwrap_or(MAX_RESPONSE_LEN);
    if content.len() <= limit {
        return content.to_string();
    }

    let mut cut = limit;
    while !content.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &content[..cut], TRUNCATED_MESSAGE)
}

/// Number each line as `N: text`, starting at `start_line`
pub fn format_with_line_numbers(content: &str, start_line: usize) -> String {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{}: {}", i + start_line, line.trim_end()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maybe_truncate() {
        let short_content = "Hello, world!";
        assert_eq!(maybe_truncate(short_content, Some(20)), short_content);

        let long_content = "a".repeat(100);
        let truncated = maybe_truncate(&long_content, Some(50));
        assert!(truncated.starts_with(&"a".repeat(50)));
        assert!(truncated.ends_with(TRUNCATED_MESSAGE));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let content = "héllo wörld";
        let truncated = maybe_truncate(content, Some(2));
        assert!(truncated.starts_with('h'));
        assert!(truncated.contains(TRUNCATED_MESSAGE));
    }

    #[test]
    fn test_format_with_line_numbers() {
        let formatted = format_with_line_numbers("line1\nline2  \nline3", 10);
        assert_eq!(formatted, "10: line1\n11: line2\n12: line3");
    }
}
