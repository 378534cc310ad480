//! Push error types.
//!
//! None of these escape [`crate::PushDispatcher::send_to_tokens`]: a batch
//! always answers with one [`crate::PushResult`] per token, and these errors
//! become the failure reasons.

/// Failure to produce a provider assertion.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// One or more signing credential fields are not configured.
    #[error(
        "APNS_TEAM_ID, APNS_KEY_ID, and APNS_PRIVATE_KEY are required (missing: {})",
        .missing.join(", ")
    )]
    NotConfigured {
        /// Names of the missing fields.
        missing: Vec<&'static str>,
    },
    /// Failed to read the private key file.
    #[error("failed to read APNS key at {path}: {reason}")]
    KeyRead {
        /// Key file path.
        path: String,
        /// Error description.
        reason: String,
    },
    /// Failed to parse the private key.
    #[error("failed to parse APNS key: {reason}")]
    KeyParse {
        /// Error description.
        reason: String,
    },
    /// Failed to sign the assertion.
    #[error("failed to sign APNS assertion: {reason}")]
    Signing {
        /// Error description.
        reason: String,
    },
}

/// Failure talking to the push provider.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {reason}")]
    ClientBuild {
        /// Error description.
        reason: String,
    },
    /// Could not open a session to the provider.
    #[error("failed to connect to {host}: {reason}")]
    Connect {
        /// Provider host.
        host: String,
        /// Error description.
        reason: String,
    },
    /// A single request failed below the HTTP status level.
    #[error("APNS request failed: {reason}")]
    Request {
        /// Error description.
        reason: String,
    },
    /// The session was already closed.
    #[error("APNS session closed")]
    Closed,
}

/// Failure in the injected device token store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend-specific failure.
    #[error("device token store error: {0}")]
    Backend(String),
}
