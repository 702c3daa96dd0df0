//! Graphviz DOT helpers.

/// Escapes `s` for use inside a double-quoted DOT string.
///
/// Quotes and backslashes are escaped, line breaks become `\n` and carriage
/// returns are dropped. Angle brackets are escaped as well, since record
/// labels give them a meaning.
///
/// # Examples
///
/// ```rust
/// use profinline::utils::escape_dot;
///
/// assert_eq!(escape_dot("hot \"loop\""), "hot \\\"loop\\\"");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            '<' => escaped.push_str("\\<"),
            '>' => escaped.push_str("\\>"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use crate::utils::escape_dot;

    #[test]
    fn test_escape_dot_plain_title() {
        assert_eq!(escape_dot("Call Graph Index"), "Call Graph Index");
    }

    #[test]
    fn test_escape_dot_special_characters() {
        assert_eq!(escape_dot("a\\b"), "a\\\\b");
        assert_eq!(escape_dot("gen<2>"), "gen\\<2\\>");
        assert_eq!(escape_dot("one\r\ntwo"), "one\\ntwo");
    }
}
