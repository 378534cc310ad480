//! Mobile access tokens.
//!
//! Wire format: `m1.<payload>.<signature>`, where `<payload>` is base64url
//! (unpadded) JSON `{"uid", "iat", "exp", "v": 1}` and `<signature>` is the
//! base64url HMAC-SHA256 of the encoded payload text.
//!
//! Verification order matters: the signature is checked before the payload is
//! decoded, so unsigned input never reaches the JSON parser.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;
use wayfarer_core::{Clock, SystemClock};
use wayfarer_settings::{DEFAULT_TOKEN_TTL_SECS, WayfarerSettings};

use crate::errors::{AuthError, TokenRejection};
use crate::secret::SigningSecret;

type HmacSha256 = Hmac<Sha256>;

/// Leading segment of every token.
pub const TOKEN_VERSION_TAG: &str = "m1";

/// Value of the payload `v` field.
pub const PAYLOAD_VERSION: u8 = 1;

/// Signed token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileTokenClaims {
    /// Subject (user id).
    pub uid: String,
    /// Issued at, epoch seconds.
    pub iat: i64,
    /// Expires at, epoch seconds.
    pub exp: i64,
    /// Payload format version.
    pub v: u8,
}

/// Payload as read back from a token whose signature checked out.
///
/// Field types are loose so that shape problems map to a specific
/// rejection instead of a generic parse failure.
#[derive(Deserialize)]
struct SignedClaims {
    uid: Option<String>,
    exp: Option<serde_json::Value>,
    v: Option<serde_json::Value>,
}

/// Issues and verifies mobile access tokens.
#[derive(Debug, Clone)]
pub struct MobileTokenCodec {
    secret: SigningSecret,
    clock: Arc<dyn Clock>,
    ttl_secs: i64,
}

impl MobileTokenCodec {
    /// Create a codec with the default 30 day lifetime.
    pub fn new(secret: SigningSecret, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret,
            clock,
            ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }

    /// Build from settings using the system clock.
    ///
    /// Fails in production when no secret is configured, and when the
    /// configured lifetime is not positive.
    pub fn from_settings(settings: &WayfarerSettings) -> Result<Self, AuthError> {
        let ttl_secs = settings.auth.token_ttl_secs;
        if ttl_secs <= 0 {
            return Err(AuthError::InvalidTtl { ttl_secs });
        }
        let secret = SigningSecret::resolve(&settings.auth, settings.environment)?;
        Ok(Self::new(secret, Arc::new(SystemClock)).with_ttl(ttl_secs))
    }

    /// Override the token lifetime. Non-positive values make
    /// [`issue`](Self::issue) fail.
    #[must_use]
    pub fn with_ttl(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Issue a token for `subject`, valid from now for the configured lifetime.
    pub fn issue(&self, subject: &str) -> Result<String, AuthError> {
        if subject.is_empty() {
            return Err(AuthError::EmptySubject);
        }
        let invalid = AuthError::InvalidTtl {
            ttl_secs: self.ttl_secs,
        };
        if self.ttl_secs <= 0 {
            return Err(invalid);
        }
        let now = self.clock.now_secs();
        let exp = now.checked_add(self.ttl_secs).ok_or(invalid)?;
        self.encode(&MobileTokenClaims {
            uid: subject.to_string(),
            iat: now,
            exp,
            v: PAYLOAD_VERSION,
        })
    }

    /// Sign arbitrary claims. Expiry is not checked here.
    pub fn encode(&self, claims: &MobileTokenClaims) -> Result<String, AuthError> {
        self.assemble(&serde_json::to_vec(claims)?)
    }

    /// Verify `token` and return its subject, or `None` if it is not acceptable.
    pub fn verify(&self, token: &str) -> Option<String> {
        match self.verify_detailed(token) {
            Ok(subject) => Some(subject),
            Err(rejection) => {
                debug!(reason = %rejection, "mobile token rejected");
                None
            }
        }
    }

    /// Verify `token`, reporting why it was rejected.
    pub fn verify_detailed(&self, token: &str) -> Result<String, TokenRejection> {
        let mut parts = token.split('.');
        let (Some(tag), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenRejection::Malformed);
        };
        if tag != TOKEN_VERSION_TAG {
            return Err(TokenRejection::VersionTag);
        }
        if payload.is_empty() || signature.is_empty() {
            return Err(TokenRejection::Malformed);
        }

        let expected = self
            .sign(payload)
            .map_err(|_| TokenRejection::BadSignature)?;
        let supplied = signature.as_bytes();
        let expected = expected.as_bytes();
        if supplied.len() != expected.len() || !bool::from(supplied.ct_eq(expected)) {
            return Err(TokenRejection::BadSignature);
        }

        let decoded = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenRejection::BadPayload)?;
        let claims: SignedClaims =
            serde_json::from_slice(&decoded).map_err(|_| TokenRejection::BadPayload)?;

        let subject = claims
            .uid
            .filter(|uid| !uid.is_empty())
            .ok_or(TokenRejection::MissingSubject)?;
        if claims.v.as_ref().and_then(serde_json::Value::as_f64) != Some(f64::from(PAYLOAD_VERSION))
        {
            return Err(TokenRejection::UnsupportedVersion);
        }
        let exp = claims
            .exp
            .as_ref()
            .and_then(serde_json::Value::as_f64)
            .filter(|exp| exp.is_finite())
            .ok_or(TokenRejection::InvalidExpiry)?;
        #[allow(clippy::cast_precision_loss)]
        let now = self.clock.now_secs() as f64;
        if exp <= now {
            return Err(TokenRejection::Expired);
        }

        Ok(subject)
    }

    /// Encode a payload and append its signature.
    fn assemble(&self, payload_json: &[u8]) -> Result<String, AuthError> {
        let payload = URL_SAFE_NO_PAD.encode(payload_json);
        let signature = self.sign(&payload)?;
        Ok(format!("{TOKEN_VERSION_TAG}.{payload}.{signature}"))
    }

    fn sign(&self, encoded_payload: &str) -> Result<String, AuthError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| AuthError::InvalidKey)?;
        mac.update(encoded_payload.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use wayfarer_core::ManualClock;

    use super::*;

    const NOW: i64 = 1_750_000_000;
    const THIRTY_DAYS: i64 = 60 * 60 * 24 * 30;

    fn codec_at(clock: &Arc<ManualClock>) -> MobileTokenCodec {
        MobileTokenCodec::new(SigningSecret::new("test-secret"), clock.clone())
    }

    fn codec() -> (MobileTokenCodec, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(NOW));
        (codec_at(&clock), clock)
    }

    fn decode_claims(token: &str) -> serde_json::Value {
        let payload = token.split('.').nth(1).unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
    }

    #[test]
    fn round_trip() {
        let (codec, _) = codec();
        let token = codec.issue("user-42").unwrap();
        assert_eq!(codec.verify(&token).as_deref(), Some("user-42"));
    }

    #[test]
    fn token_shape_and_claims() {
        let (codec, _) = codec();
        let token = codec.issue("user-42").unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "m1");
        assert!(!parts[1].contains('=') && !parts[2].contains('='));
        // 32-byte MAC, unpadded base64
        assert_eq!(parts[2].len(), 43);

        let claims = decode_claims(&token);
        assert_eq!(
            claims,
            serde_json::json!({"uid": "user-42", "iat": NOW, "exp": NOW + THIRTY_DAYS, "v": 1})
        );
    }

    #[test]
    fn matches_reference_signature() {
        // openssl dgst -sha256 -hmac test-secret, base64url without padding
        let (codec, _) = codec();
        assert_eq!(
            codec.sign("eyJ1aWQiOiJ1In0").unwrap(),
            "XUVE1uLtKJ0S3nJbZShXmKa9CeWij4I9YGESgDsuVkM"
        );
    }

    #[test]
    fn flipping_any_signature_byte_is_rejected() {
        let (codec, _) = codec();
        let token = codec.issue("user-42").unwrap();
        let sig_start = token.rfind('.').unwrap() + 1;

        for i in sig_start..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert_eq!(
                codec.verify_detailed(&tampered),
                Err(TokenRejection::BadSignature),
                "byte {i} flipped"
            );
        }
    }

    #[test]
    fn truncated_or_extended_signature_is_rejected() {
        let (codec, _) = codec();
        let token = codec.issue("user-42").unwrap();
        assert_eq!(
            codec.verify_detailed(&token[..token.len() - 1]),
            Err(TokenRejection::BadSignature)
        );
        assert_eq!(
            codec.verify_detailed(&format!("{token}A")),
            Err(TokenRejection::BadSignature)
        );
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let (codec, _) = codec();
        let token = codec.issue("user-42").unwrap();
        let signature = token.rsplit('.').next().unwrap();
        let forged_payload = URL_SAFE_NO_PAD
            .encode(br#"{"uid":"admin","iat":1750000000,"exp":1752592000,"v":1}"#);
        let forged = format!("m1.{forged_payload}.{signature}");
        assert_eq!(codec.verify(&forged), None);
    }

    #[test]
    fn other_secret_is_rejected() {
        let (codec, clock) = codec();
        let other = MobileTokenCodec::new(SigningSecret::new("other-secret"), clock);
        let token = other.issue("user-42").unwrap();
        assert_eq!(
            codec.verify_detailed(&token),
            Err(TokenRejection::BadSignature)
        );
    }

    #[test]
    fn expires_after_thirty_days() {
        let (codec, clock) = codec();
        let token = codec.issue("user-42").unwrap();

        clock.set(NOW + THIRTY_DAYS - 1);
        assert_eq!(codec.verify(&token).as_deref(), Some("user-42"));

        clock.set(NOW + THIRTY_DAYS);
        assert_eq!(codec.verify_detailed(&token), Err(TokenRejection::Expired));
    }

    #[test]
    fn past_expiry_with_valid_signature_is_rejected() {
        let (codec, _) = codec();
        let token = codec
            .encode(&MobileTokenClaims {
                uid: "user-42".to_string(),
                iat: NOW - 100,
                exp: NOW - 1,
                v: 1,
            })
            .unwrap();
        assert_eq!(codec.verify_detailed(&token), Err(TokenRejection::Expired));
    }

    #[test]
    fn malformed_shapes_are_rejected() {
        let (codec, _) = codec();
        let token = codec.issue("user-42").unwrap();
        let (_, rest) = token.split_once('.').unwrap();

        for input in ["", "m1", "m1.abc", "...", "m1..sig", "m1.payload.", "a.b.c.d"] {
            assert_eq!(
                codec.verify_detailed(input),
                Err(TokenRejection::Malformed),
                "{input:?}"
            );
        }
        assert_eq!(
            codec.verify_detailed(&format!("{token}.extra")),
            Err(TokenRejection::Malformed)
        );
        assert_eq!(
            codec.verify_detailed(&format!("m2.{rest}")),
            Err(TokenRejection::VersionTag)
        );
        assert_eq!(
            codec.verify_detailed(&format!("M1.{rest}")),
            Err(TokenRejection::VersionTag)
        );
    }

    #[test]
    fn signed_but_unparseable_payload_is_rejected() {
        let (codec, _) = codec();
        let token = codec.assemble(b"not json").unwrap();
        assert_eq!(codec.verify_detailed(&token), Err(TokenRejection::BadPayload));

        let token = codec.assemble(b"null").unwrap();
        assert_eq!(codec.verify_detailed(&token), Err(TokenRejection::BadPayload));
    }

    #[test]
    fn payload_field_checks() {
        let (codec, _) = codec();
        let exp = NOW + 60;
        let cases = [
            (serde_json::json!({"iat": NOW, "exp": exp, "v": 1}), TokenRejection::MissingSubject),
            (serde_json::json!({"uid": "", "exp": exp, "v": 1}), TokenRejection::MissingSubject),
            (serde_json::json!({"uid": "u", "exp": exp, "v": 2}), TokenRejection::UnsupportedVersion),
            (serde_json::json!({"uid": "u", "exp": exp}), TokenRejection::UnsupportedVersion),
            (serde_json::json!({"uid": "u", "exp": "soon", "v": 1}), TokenRejection::InvalidExpiry),
            (serde_json::json!({"uid": "u", "v": 1}), TokenRejection::InvalidExpiry),
        ];

        for (payload, expected) in cases {
            let token = codec.assemble(&serde_json::to_vec(&payload).unwrap()).unwrap();
            assert_eq!(codec.verify_detailed(&token), Err(expected), "{payload}");
        }
    }

    #[test]
    fn fractional_expiry_is_accepted() {
        let (codec, _) = codec();
        let payload = serde_json::json!({"uid": "u", "iat": NOW, "exp": NOW as f64 + 0.5, "v": 1});
        let token = codec.assemble(&serde_json::to_vec(&payload).unwrap()).unwrap();
        assert_eq!(codec.verify(&token).as_deref(), Some("u"));
    }

    #[test]
    fn empty_subject_cannot_be_issued() {
        let (codec, _) = codec();
        assert_matches!(codec.issue(""), Err(AuthError::EmptySubject));
    }

    #[test]
    fn custom_ttl() {
        let (codec, clock) = codec();
        let codec = codec.with_ttl(60);
        let token = codec.issue("user-42").unwrap();
        assert_eq!(decode_claims(&token)["exp"], NOW + 60);
        clock.advance(60);
        assert_eq!(codec.verify(&token), None);
    }

    #[test]
    fn from_settings_uses_configured_secret() {
        let mut settings = WayfarerSettings::default();
        settings.auth.mobile_auth_secret = Some("test-secret".to_string());
        let from_settings = MobileTokenCodec::from_settings(&settings).unwrap();
        let token = from_settings.issue("user-42").unwrap();

        // Same secret, different clock: signature still verifies.
        let (codec, _) = codec();
        let clock = Arc::new(ManualClock::new(SystemClock.now_secs()));
        let codec = MobileTokenCodec { clock, ..codec };
        assert_eq!(codec.verify(&token).as_deref(), Some("user-42"));
    }

    #[test]
    fn from_settings_rejects_fallback_in_production() {
        let mut settings = WayfarerSettings::default();
        settings.environment = wayfarer_settings::Environment::Production;
        assert_matches!(
            MobileTokenCodec::from_settings(&settings),
            Err(AuthError::InsecureSecret)
        );
    }

    #[test]
    fn non_positive_ttl_refuses_to_issue() {
        let (codec, _) = codec();
        for ttl in [0, -5, i64::MIN] {
            assert_matches!(
                codec.clone().with_ttl(ttl).issue("u"),
                Err(AuthError::InvalidTtl { ttl_secs }) if ttl_secs == ttl
            );
        }
    }

    #[test]
    fn overflowing_ttl_is_an_error() {
        let (codec, _) = codec();
        assert_matches!(
            codec.with_ttl(i64::MAX).issue("u"),
            Err(AuthError::InvalidTtl { ttl_secs: i64::MAX })
        );
    }

    #[test]
    fn largest_representable_expiry_still_issues() {
        let (codec, _) = codec();
        let token = codec.with_ttl(i64::MAX - NOW).issue("u").unwrap();
        assert_eq!(decode_claims(&token)["exp"], i64::MAX);
    }

    #[test]
    fn from_settings_rejects_non_positive_ttl() {
        let mut settings = WayfarerSettings::default();
        settings.auth.mobile_auth_secret = Some("s".to_string());
        settings.auth.token_ttl_secs = 0;
        assert_matches!(
            MobileTokenCodec::from_settings(&settings),
            Err(AuthError::InvalidTtl { ttl_secs: 0 })
        );
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn any_subject_round_trips(subject in "\\PC{1,64}") {
                let (codec, _) = codec();
                let token = codec.issue(&subject).unwrap();
                prop_assert_eq!(codec.verify(&token), Some(subject));
            }

            #[test]
            fn garbage_never_verifies(input in "\\PC{0,128}") {
                let (codec, _) = codec();
                prop_assert_eq!(codec.verify(&input), None);
            }
        }
    }
}
