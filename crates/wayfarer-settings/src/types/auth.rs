//! Mobile access token settings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default token lifetime: 30 days.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 60 * 60 * 24 * 30;

/// Where a signing secret came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretSource {
    /// Dedicated mobile token secret (`MOBILE_AUTH_SECRET`).
    MobileAuthSecret,
    /// Shared web session secret (`SESSION_SECRET`).
    SessionSecret,
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MobileAuthSecret => f.write_str("MOBILE_AUTH_SECRET"),
            Self::SessionSecret => f.write_str("SESSION_SECRET"),
        }
    }
}

/// Mobile access token settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Dedicated HMAC secret for mobile tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_auth_secret: Option<String>,
    /// Web session secret, used when no dedicated secret is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_secret: Option<String>,
    /// Lifetime of issued tokens in seconds.
    pub token_ttl_secs: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            mobile_auth_secret: None,
            session_secret: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

impl AuthSettings {
    /// Configured secrets in priority order. Empty values are skipped.
    pub fn secret_candidates(&self) -> Vec<(SecretSource, &str)> {
        [
            (SecretSource::MobileAuthSecret, self.mobile_auth_secret.as_deref()),
            (SecretSource::SessionSecret, self.session_secret.as_deref()),
        ]
        .into_iter()
        .filter_map(|(source, value)| value.filter(|v| !v.is_empty()).map(|v| (source, v)))
        .collect()
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("mobile_auth_secret", &self.mobile_auth_secret.as_ref().map(|_| "<redacted>"))
            .field("session_secret", &self.session_secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}
