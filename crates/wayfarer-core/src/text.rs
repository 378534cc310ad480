//! UTF-8 safe string truncation.
//!
//! Device tokens and assertions are credentials; log lines carry only a short
//! prefix. `&str[..n]` panics inside a multi-byte character, so truncation
//! walks back to the nearest char boundary.

/// Truncate a string to at most `max_bytes` bytes at a char boundary.
#[inline]
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Short, log-safe rendering of a credential-like value: `prefix...(len)`.
pub fn redact(s: &str) -> String {
    format!("{}...({})", truncate_str(s, 8), s.len())
}
