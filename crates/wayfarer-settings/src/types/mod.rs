//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may specify any subset of fields; missing fields take their defaults.

mod auth;
mod push;

pub use auth::*;
pub use push::*;

use serde::{Deserialize, Serialize};

/// Deployment environment.
///
/// Production refuses weak development defaults (see
/// [`AuthSettings::secret_candidates`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local or test deployment.
    #[default]
    Development,
    /// Production deployment.
    Production,
}

impl Environment {
    /// Whether this is a production deployment.
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Root settings type.
///
/// ```json
/// {
///   "environment": "production",
///   "push": { "bundleId": "com.example.Wayfarer", "useSandbox": true }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WayfarerSettings {
    /// Deployment environment.
    pub environment: Environment,
    /// Mobile access token settings.
    pub auth: AuthSettings,
    /// Push provider settings.
    pub push: PushSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
