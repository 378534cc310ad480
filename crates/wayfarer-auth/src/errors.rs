//! Auth error types.

/// Errors raised while setting up the codec or issuing tokens.
///
/// Verification never produces these; see [`TokenRejection`].
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No secret configured and the development fallback is not allowed.
    #[error(
        "no mobile token secret configured: set MOBILE_AUTH_SECRET or SESSION_SECRET \
         (the development fallback secret is refused in production)"
    )]
    InsecureSecret,

    /// Tokens must name a subject.
    #[error("cannot issue a token for an empty subject")]
    EmptySubject,

    /// Token lifetime is not positive, or pushes expiry past `i64::MAX`.
    #[error("invalid token lifetime: {ttl_secs} seconds")]
    InvalidTtl {
        /// The rejected lifetime.
        ttl_secs: i64,
    },

    /// The HMAC key was rejected.
    #[error("invalid HMAC key")]
    InvalidKey,

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a presented token was not accepted.
///
/// Tampered and expired tokens are expected operating conditions, so
/// these are plain values rather than faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    /// Not three non-empty dot-separated segments.
    #[error("token is not three dot-separated segments")]
    Malformed,
    /// Leading version tag is not `m1`.
    #[error("unsupported token version tag")]
    VersionTag,
    /// Signature does not match the payload.
    #[error("signature mismatch")]
    BadSignature,
    /// Payload is not base64url-encoded JSON of the expected shape.
    #[error("payload could not be decoded")]
    BadPayload,
    /// Payload has no (or an empty) `uid`.
    #[error("payload has no subject")]
    MissingSubject,
    /// Payload `v` is not 1.
    #[error("unsupported payload version")]
    UnsupportedVersion,
    /// Payload `exp` is missing or not a number.
    #[error("payload expiry is not a number")]
    InvalidExpiry,
    /// `exp` is at or before the current time.
    #[error("token expired")]
    Expired,
}
