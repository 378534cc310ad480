//! # wayfarer-auth
//!
//! Stateless signed access tokens for native mobile clients.
//!
//! - [`MobileTokenCodec`]: issue and verify `m1.<payload>.<signature>` tokens
//!   (HMAC-SHA256, constant-time signature comparison, 30 day lifetime)
//! - [`SigningSecret`]: ordered secret resolution with a development-only fallback
//! - [`extract_bearer`]: pull the token out of an `Authorization` header
//!
//! Nothing here touches storage: a token carries everything needed to verify it.
//!
//! # Example
//!
//! ```no_run
//! use wayfarer_auth::{MobileTokenCodec, extract_bearer};
//!
//! let codec = MobileTokenCodec::from_settings(wayfarer_settings::get_settings())?;
//! let token = codec.issue("user-42")?;
//! let header = format!("Bearer {token}");
//! let uid = extract_bearer(Some(&header)).and_then(|t| codec.verify(t));
//! assert_eq!(uid.as_deref(), Some("user-42"));
//! # Ok::<(), wayfarer_auth::AuthError>(())
//! ```

#![deny(unsafe_code)]

pub mod bearer;
pub mod errors;
pub mod secret;
pub mod token;

pub use bearer::{extract_bearer, extract_bearer_bytes};
pub use errors::{AuthError, TokenRejection};
pub use secret::{DEV_FALLBACK_SECRET, SecretOrigin, SigningSecret};
pub use token::{MobileTokenClaims, MobileTokenCodec, PAYLOAD_VERSION, TOKEN_VERSION_TAG};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
