//! Utility functions for IRC protocol handling.
//!
//! This module provides helper functions that are commonly needed when
//! formatting outbound lines, including safe string truncation and the
//! protocol length limits the engine enforces.

/// Default maximum length of an outbound line, including the trailing CRLF.
pub const DEFAULT_LINE_LEN: usize = 512;

/// Maximum length for client-originated tag data, including the leading `@`.
pub const MAX_CLIENT_TAG_DATA: usize = 4094;

/// Truncates a string to at most `max_bytes` bytes without breaking
/// a multi-byte UTF-8 codepoint at the end.
///
/// This is essential when working with IRC message limits, as naively
/// truncating at a byte boundary could produce invalid UTF-8.
///
/// # Examples
///
/// ```
/// use slirc_client::util::truncate_utf8_safe;
///
/// // ASCII string truncates normally
/// assert_eq!(truncate_utf8_safe("hello world", 5), "hello");
///
/// // Multi-byte chars are not split
/// let emoji = "Hello 👋 World";
/// let truncated = truncate_utf8_safe(emoji, 8);
/// assert_eq!(truncated, "Hello "); // Stops before the 4-byte emoji
///
/// // String shorter than limit is unchanged
/// assert_eq!(truncate_utf8_safe("hi", 10), "hi");
/// ```
#[inline]
pub fn truncate_utf8_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    // Find the last valid UTF-8 boundary at or before max_bytes
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    &s[..end]
}

/// Truncates a string to at most `max_chars` characters.
///
/// Unlike [`truncate_utf8_safe`], this counts Unicode codepoints rather than
/// bytes. Used when the server advertises `NICKLEN`, which counts characters.
///
/// # Examples
///
/// ```
/// use slirc_client::util::truncate_chars;
///
/// assert_eq!(truncate_chars("hello", 3), "hel");
/// assert_eq!(truncate_chars("héllo", 3), "hél");
/// ```
#[inline]
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
