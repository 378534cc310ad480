//! Provider configuration: readiness check, host selection, signing credential.

use std::fmt;
use std::path::PathBuf;

use wayfarer_settings::PushSettings;

use crate::errors::CredentialError;

/// Production APNs host.
pub const PRODUCTION_HOST: &str = "api.push.apple.com";

/// Sandbox (development build) APNs host.
pub const SANDBOX_HOST: &str = "api.sandbox.push.apple.com";

/// Whether every field needed for delivery is configured.
///
/// Pure and cheap: checked before each batch so an unconfigured deployment
/// never touches the network.
pub fn is_configured(settings: &PushSettings) -> bool {
    settings.missing_fields().is_empty()
}

/// APNs environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApnsEnvironment {
    /// Apps installed from the App Store or TestFlight.
    Production,
    /// Apps built for development.
    Sandbox,
}

impl ApnsEnvironment {
    /// Select from the `use_sandbox` flag.
    pub fn from_settings(settings: &PushSettings) -> Self {
        if settings.use_sandbox {
            Self::Sandbox
        } else {
            Self::Production
        }
    }

    /// Provider hostname.
    pub fn host(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_HOST,
            Self::Sandbox => SANDBOX_HOST,
        }
    }
}

impl fmt::Display for ApnsEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => f.write_str("production"),
            Self::Sandbox => f.write_str("sandbox"),
        }
    }
}

/// Where the private key comes from.
#[derive(Clone)]
pub enum KeySource {
    /// PEM text from configuration.
    Inline(String),
    /// A `.p8` file on disk.
    File(PathBuf),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("Inline(<redacted>)"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// Long-lived signing credential for provider assertions.
#[derive(Debug, Clone)]
pub struct ProviderCredential {
    /// Apple Developer Team ID (assertion issuer).
    pub team_id: String,
    /// Key ID (assertion `kid`).
    pub key_id: String,
    /// Private key material.
    pub key: KeySource,
}

impl ProviderCredential {
    /// Extract the credential, naming any missing fields.
    ///
    /// An inline key takes precedence over a key path.
    pub fn from_settings(settings: &PushSettings) -> Result<Self, CredentialError> {
        let missing = settings.missing_credential_fields();
        if !missing.is_empty() {
            return Err(CredentialError::NotConfigured { missing });
        }

        let inline = settings
            .private_key
            .as_ref()
            .filter(|k| !k.trim().is_empty());
        let key = match (inline, settings.private_key_path.as_deref()) {
            (Some(pem), _) => KeySource::Inline(pem.clone()),
            (None, Some(path)) => KeySource::File(expand_home(path.trim())),
            (None, None) => {
                return Err(CredentialError::NotConfigured {
                    missing: vec!["APNS_PRIVATE_KEY"],
                });
            }
        };

        Ok(Self {
            team_id: settings.team_id.clone().unwrap_or_default().trim().to_string(),
            key_id: settings.key_id.clone().unwrap_or_default().trim().to_string(),
            key,
        })
    }

    /// Load PEM bytes.
    ///
    /// Inline keys supplied through a single-line environment variable carry
    /// literal `\n` sequences; those are turned back into newlines.
    pub fn load_pem(&self) -> Result<Vec<u8>, CredentialError> {
        match &self.key {
            KeySource::Inline(pem) => Ok(pem.replace("\\n", "\n").into_bytes()),
            KeySource::File(path) => std::fs::read(path).map_err(|e| CredentialError::KeyRead {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
            PathBuf::from(home).join(rest)
        }
        None => PathBuf::from(path),
    }
}
