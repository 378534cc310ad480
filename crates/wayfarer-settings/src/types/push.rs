//! Push provider (APNs) settings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Push provider settings.
///
/// Every credential field is optional: push delivery is disabled, not
/// broken, when any of them is missing.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushSettings {
    /// Apple Developer Team ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    /// Key ID of the `.p8` signing key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    /// Inline PEM private key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Path to a `.p8` file, used when no inline key is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,
    /// App bundle identifier, sent as the `apns-topic`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    /// Deliver through the sandbox host instead of production.
    pub use_sandbox: bool,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            team_id: None,
            key_id: None,
            private_key: None,
            private_key_path: None,
            bundle_id: None,
            use_sandbox: false,
            request_timeout_ms: 30_000,
        }
    }
}

fn present(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

impl PushSettings {
    /// Whether private key material is available inline or by path.
    pub fn has_private_key(&self) -> bool {
        present(self.private_key.as_ref()) || present(self.private_key_path.as_ref())
    }

    /// Names of the signing credential fields that are missing.
    pub fn missing_credential_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !present(self.team_id.as_ref()) {
            missing.push("APNS_TEAM_ID");
        }
        if !present(self.key_id.as_ref()) {
            missing.push("APNS_KEY_ID");
        }
        if !self.has_private_key() {
            missing.push("APNS_PRIVATE_KEY");
        }
        missing
    }

    /// Names of every field required for delivery that is missing.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = self.missing_credential_fields();
        if !present(self.bundle_id.as_ref()) {
            missing.push("APNS_BUNDLE_ID");
        }
        missing
    }
}

impl fmt::Debug for PushSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushSettings")
            .field("team_id", &self.team_id)
            .field("key_id", &self.key_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("private_key_path", &self.private_key_path)
            .field("bundle_id", &self.bundle_id)
            .field("use_sandbox", &self.use_sandbox)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}
