//! HMAC signing secret resolution.
//!
//! Candidates are tried in order: `MOBILE_AUTH_SECRET`, then the web session
//! secret. With neither set, development deployments fall back to a fixed,
//! publicly known secret; production deployments refuse to start.

use std::fmt;

use tracing::{debug, warn};
use wayfarer_settings::{AuthSettings, Environment, SecretSource};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::AuthError;

/// Fixed development secret. Anyone can forge tokens signed with it.
pub const DEV_FALLBACK_SECRET: &str = "supersecretfallback";

/// Where the active secret came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretOrigin {
    /// A configured candidate.
    Configured(SecretSource),
    /// Supplied directly by the caller.
    Explicit,
    /// [`DEV_FALLBACK_SECRET`].
    DevelopmentFallback,
}

/// Key material for token signatures. Every copy is zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningSecret {
    bytes: Vec<u8>,
    #[zeroize(skip)]
    origin: SecretOrigin,
}

impl SigningSecret {
    /// Use `secret` directly.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: secret.into(),
            origin: SecretOrigin::Explicit,
        }
    }

    /// Pick the first configured candidate, or the development fallback.
    pub fn resolve(auth: &AuthSettings, environment: Environment) -> Result<Self, AuthError> {
        if let Some((source, value)) = auth.secret_candidates().into_iter().next() {
            debug!(source = %source, "mobile token secret resolved");
            return Ok(Self {
                bytes: value.as_bytes().to_vec(),
                origin: SecretOrigin::Configured(source),
            });
        }

        if environment.is_production() {
            return Err(AuthError::InsecureSecret);
        }

        warn!("no mobile token secret configured, using the development fallback secret");
        Ok(Self {
            bytes: DEV_FALLBACK_SECRET.as_bytes().to_vec(),
            origin: SecretOrigin::DevelopmentFallback,
        })
    }

    /// Where this secret came from.
    pub fn origin(&self) -> SecretOrigin {
        self.origin
    }

    /// Whether this is the public development fallback.
    pub fn is_development_fallback(&self) -> bool {
        self.origin == SecretOrigin::DevelopmentFallback
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSecret")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
