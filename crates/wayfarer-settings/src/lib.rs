//! # wayfarer-settings
//!
//! Layered configuration for the Wayfarer mobile auth and push services.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`WayfarerSettings::default()`]
//! 2. **User file**: `~/.wayfarer/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `MOBILE_AUTH_SECRET`, `APNS_*`, `WAYFARER_*`
//!
//! # Usage
//!
//! ```no_run
//! use wayfarer_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("sandbox: {}", settings.push.use_sandbox);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings, load_settings_from_path,
    parse_bool, settings_path,
};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
static SETTINGS: OnceLock<WayfarerSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.wayfarer/settings.json` with env var
/// overrides. If loading fails, returns compiled defaults with env overrides
/// still applied so credentials supplied purely through the environment work.
pub fn get_settings() -> &'static WayfarerSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings file, using defaults");
            let mut settings = WayfarerSettings::default();
            apply_env_overrides(&mut settings);
            settings
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the provided settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: WayfarerSettings) -> std::result::Result<(), WayfarerSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
