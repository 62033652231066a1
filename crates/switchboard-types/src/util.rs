//! Small shared helpers.

use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future. Used by the dyn-compatible async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Find the largest byte index <= `i` that is on a UTF-8 char boundary.
fn floor_char_boundary(s: &str, i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    let mut pos = i;
    while pos > 0 && !s.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Truncate `&str` to at most `max_bytes`, never splitting a UTF-8 codepoint.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        s
    } else {
        &s[..floor_char_boundary(s, max_bytes)]
    }
}

/// Shorten text for log lines, marking the cut with `...`.
pub fn truncate_for_display(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", truncate_str(s, max_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_str_short() {
        assert_eq!(truncate_str("hello", 10), "hello");
    }

    #[test]
    fn truncate_str_emoji() {
        let s = "\u{1F600}\u{1F601}\u{1F602}";
        assert_eq!(truncate_str(s, 5), "\u{1F600}");
        assert_eq!(truncate_str(s, 8), "\u{1F600}\u{1F601}");
    }

    #[test]
    fn truncate_str_accented() {
        let s = "caf\u{00e9}";
        assert_eq!(truncate_str(s, 4), "caf");
    }

    #[test]
    fn display_truncation_marks_cut() {
        assert_eq!(truncate_for_display("hello", 10), "hello");
        assert_eq!(truncate_for_display("hello world", 5), "hello...");
    }
}
