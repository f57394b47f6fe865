//! Small text helpers shared by prompts and events.

/// Truncate a string to at most `max_chars` characters, appending an
/// ellipsis when anything was cut. Char-based, so multi-byte text is safe.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_string_untouched() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn test_long_string_cut_with_ellipsis() {
        assert_eq!(truncate("hello world", 5), "hello...");
    }

    #[test]
    fn test_multibyte_safe() {
        let s = "héllo wörld";
        let cut = truncate(s, 6);
        assert_eq!(cut, "héllo ...");
    }
}
