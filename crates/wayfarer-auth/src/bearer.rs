//! `Authorization: Bearer <token>` parsing.

use std::sync::LazyLock;

use regex::Regex;

static BEARER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Bearer\s+(.+)$").unwrap());

/// Extract the token from an `Authorization` header value.
///
/// The scheme keyword is case-insensitive. Returns `None` when the header is
/// absent, does not match, or carries only whitespace after the scheme.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let captures = BEARER_PATTERN.captures(header?)?;
    let token = captures.get(1)?.as_str().trim();
    (!token.is_empty()).then_some(token)
}

/// Like [`extract_bearer`], for raw header bytes that may not be UTF-8.
pub fn extract_bearer_bytes(header: Option<&[u8]>) -> Option<&str> {
    extract_bearer(std::str::from_utf8(header?).ok())
}
