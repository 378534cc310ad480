//! Provider assertion cache.
//!
//! APNs token auth wants a short-lived ES256 JWT (`{iss, iat}` with the key
//! ID in the header). Apple rejects assertions older than an hour and
//! throttles ones regenerated too often, so a single assertion is cached and
//! reused until it is within [`REFRESH_MARGIN_SECS`] of its own expiry.
//!
//! The private key is read and parsed on first use and kept for the life of
//! the cache, so a key file is touched at most once per process.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};
use wayfarer_core::Clock;
use wayfarer_settings::PushSettings;

use super::config::ProviderCredential;
use crate::errors::CredentialError;

/// Lifetime assigned to a freshly signed assertion (50 minutes).
pub const ASSERTION_TTL_SECS: i64 = 50 * 60;

/// A cached assertion is replaced once it is this close to expiry.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Signed provider assertion.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderAssertion {
    /// Compact JWT.
    pub value: String,
    /// Epoch seconds the assertion was signed.
    pub issued_at: i64,
    /// Epoch seconds after which the assertion must not be used.
    pub expires_at: i64,
}

impl std::fmt::Debug for ProviderAssertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAssertion")
            .field("value", &wayfarer_core::text::redact(&self.value))
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    iat: i64,
}

/// Parsed signing key plus the identifiers that go into every assertion.
struct SigningKey {
    team_id: String,
    key_id: String,
    key: EncodingKey,
}

impl SigningKey {
    fn load(settings: &PushSettings) -> Result<Self, CredentialError> {
        let credential = ProviderCredential::from_settings(settings)?;
        let pem = credential.load_pem()?;
        let key = EncodingKey::from_ec_pem(&pem).map_err(|e| CredentialError::KeyParse {
            reason: e.to_string(),
        })?;
        debug!(key_id = %credential.key_id, "APNS signing key loaded");
        Ok(Self {
            team_id: credential.team_id,
            key_id: credential.key_id,
            key,
        })
    }

    fn sign(&self, now: i64) -> Result<String, CredentialError> {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());

        let claims = AssertionClaims {
            iss: &self.team_id,
            iat: now,
        };
        jsonwebtoken::encode(&header, &claims, &self.key).map_err(|e| CredentialError::Signing {
            reason: e.to_string(),
        })
    }
}

#[derive(Default)]
struct CacheState {
    assertion: Option<ProviderAssertion>,
    key: Option<Arc<SigningKey>>,
}

/// Process-wide cache holding at most one provider assertion.
///
/// The check-and-regenerate step runs under one lock, so concurrent callers
/// racing an expired entry produce a single signing. Only the first
/// successful call does key I/O; later regenerations sign from memory.
pub struct AssertionCache {
    settings: PushSettings,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
    signings: AtomicU64,
}

impl AssertionCache {
    /// Create an empty cache over `settings`.
    pub fn new(settings: PushSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            state: Mutex::new(CacheState::default()),
            signings: AtomicU64::new(0),
        }
    }

    /// Return a valid assertion, signing a new one when needed.
    ///
    /// The cached assertion is reused while `now < expires_at - 60`.
    pub fn get(&self) -> Result<ProviderAssertion, CredentialError> {
        let mut state = self.state.lock();
        let now = self.clock.now_secs();

        if let Some(cached) = state
            .assertion
            .as_ref()
            .filter(|a| a.expires_at > now + REFRESH_MARGIN_SECS)
        {
            debug!(expires_at = cached.expires_at, "reusing cached APNS assertion");
            return Ok(cached.clone());
        }

        let key = match &state.key {
            Some(key) => Arc::clone(key),
            None => {
                let key = Arc::new(SigningKey::load(&self.settings)?);
                state.key = Some(Arc::clone(&key));
                key
            }
        };
        let value = key.sign(now)?;
        let assertion = ProviderAssertion {
            value,
            issued_at: now,
            expires_at: now + ASSERTION_TTL_SECS,
        };
        let _ = self.signings.fetch_add(1, Ordering::Relaxed);
        info!(
            key_id = %key.key_id,
            expires_at = assertion.expires_at,
            "APNS assertion regenerated"
        );
        state.assertion = Some(assertion.clone());
        Ok(assertion)
    }

    /// Drop the cached assertion so the next [`get`](Self::get) signs anew.
    ///
    /// The loaded key is kept.
    pub fn reset(&self) {
        self.state.lock().assertion = None;
    }

    /// Number of assertions signed since construction.
    pub fn signing_count(&self) -> u64 {
        self.signings.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for AssertionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssertionCache")
            .field("cached", &self.state.lock().assertion.is_some())
            .field("signings", &self.signing_count())
            .finish_non_exhaustive()
    }
}
