//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`WayfarerSettings::default()`]
//! 2. If `~/.wayfarer/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{Environment, WayfarerSettings};

/// Resolve the path to the settings file (`~/.wayfarer/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".wayfarer").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<WayfarerSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<WayfarerSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Load defaults merged with the settings file, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<WayfarerSettings> {
    let defaults = serde_json::to_value(WayfarerSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(settings: &mut WayfarerSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Empty values are treated as unset. Invalid booleans and integers are
/// ignored with a warning and fall back to the file/default value.
pub fn apply_overrides_from<F>(settings: &mut WayfarerSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let boolean = |name: &str| {
        let val = string(name)?;
        let parsed = parse_bool(&val);
        if parsed.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        parsed
    };

    // ── Environment ─────────────────────────────────────────────────
    if let Some(v) = string("WAYFARER_ENV") {
        match parse_environment(&v) {
            Some(env) => settings.environment = env,
            None => warn!(key = "WAYFARER_ENV", value = %v, "unknown environment, ignoring"),
        }
    }

    // ── Mobile auth ─────────────────────────────────────────────────
    if let Some(v) = string("MOBILE_AUTH_SECRET") {
        settings.auth.mobile_auth_secret = Some(v);
    }
    if let Some(v) = string("SESSION_SECRET") {
        settings.auth.session_secret = Some(v);
    }

    // ── Push provider ───────────────────────────────────────────────
    if let Some(v) = string("APNS_TEAM_ID") {
        settings.push.team_id = Some(v);
    }
    if let Some(v) = string("APNS_KEY_ID") {
        settings.push.key_id = Some(v);
    }
    if let Some(v) = string("APNS_PRIVATE_KEY") {
        settings.push.private_key = Some(v);
    }
    if let Some(v) = string("APNS_PRIVATE_KEY_PATH") {
        settings.push.private_key_path = Some(v);
    }
    if let Some(v) = string("APNS_BUNDLE_ID") {
        settings.push.bundle_id = Some(v);
    }
    if let Some(v) = boolean("APNS_USE_SANDBOX") {
        settings.push.use_sandbox = v;
    }
    if let Some(v) = string("APNS_TIMEOUT_MS") {
        match parse_u64_range(&v, 100, 600_000) {
            Some(ms) => settings.push.request_timeout_ms = ms,
            None => warn!(key = "APNS_TIMEOUT_MS", value = %v, "invalid u64 env var, ignoring"),
        }
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("WAYFARER_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = boolean("WAYFARER_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive, surrounding whitespace ignored):
/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a deployment environment name.
pub fn parse_environment(val: &str) -> Option<Environment> {
    match val.trim().to_lowercase().as_str() {
        "production" | "prod" => Some(Environment::Production),
        "development" | "dev" | "test" => Some(Environment::Development),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
