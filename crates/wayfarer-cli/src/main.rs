//! # wayfarer
//!
//! Operator tool for mobile access tokens and push delivery. Every command
//! prints one JSON document on stdout; logs go to stderr.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use wayfarer_auth::{MobileTokenCodec, SecretOrigin, SigningSecret};
use wayfarer_core::SystemClock;
use wayfarer_core::logging::{LogFormat, init_subscriber};
use wayfarer_push::{ApnsEnvironment, PushDispatcher, PushPayload};
use wayfarer_settings::WayfarerSettings;

/// Wayfarer mobile auth and push tools.
#[derive(Parser, Debug)]
#[command(name = "wayfarer", about = "Wayfarer mobile auth and push tools")]
struct Cli {
    /// Settings file (defaults to `~/.wayfarer/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log level filter (overrides settings; `RUST_LOG` wins over both).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mobile access tokens.
    #[command(subcommand)]
    Token(TokenCommand),
    /// Push notifications.
    #[command(subcommand)]
    Push(PushCommand),
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Issue a token for a user ID.
    Issue {
        /// User ID to embed as the subject.
        uid: String,
        /// Lifetime in seconds (defaults to the configured TTL).
        #[arg(long)]
        ttl_secs: Option<i64>,
    },
    /// Verify a token and print its subject.
    Verify {
        /// Token, with or without a `Bearer ` prefix.
        token: String,
    },
}

#[derive(Subcommand, Debug)]
enum PushCommand {
    /// Send one notification to one or more device tokens.
    Send {
        /// Target device token (repeatable).
        #[arg(long = "device", required = true)]
        devices: Vec<String>,
        /// Alert title.
        #[arg(long)]
        title: String,
        /// Alert body.
        #[arg(long)]
        body: String,
        /// Custom data entry as `key=value` (repeatable).
        #[arg(long = "data", value_parser = parse_key_value)]
        data: Vec<(String, String)>,
    },
    /// Show whether push delivery is configured.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.settings.as_deref())?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| settings.logging.level.clone());
    let format = if settings.logging.json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    init_subscriber(&level, format);

    let output = match cli.command {
        Command::Token(command) => run_token(command, &settings)?,
        Command::Push(command) => run_push(command, &settings)?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_settings(path: Option<&std::path::Path>) -> Result<WayfarerSettings> {
    match path {
        Some(path) => wayfarer_settings::load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => Ok(wayfarer_settings::get_settings().clone()),
    }
}

fn run_token(command: TokenCommand, settings: &WayfarerSettings) -> Result<serde_json::Value> {
    let secret = SigningSecret::resolve(&settings.auth, settings.environment)
        .context("failed to resolve token signing secret")?;
    let origin = secret.origin();
    let mut codec = MobileTokenCodec::new(secret, Arc::new(SystemClock))
        .with_ttl(settings.auth.token_ttl_secs);

    match command {
        TokenCommand::Issue { uid, ttl_secs } => {
            if let Some(ttl) = ttl_secs {
                codec = codec.with_ttl(ttl);
            }
            let token = codec.issue(&uid).context("failed to issue token")?;
            Ok(json!({
                "uid": uid,
                "token": token,
                "secret": origin_label(origin),
            }))
        }
        TokenCommand::Verify { token } => {
            let raw = wayfarer_auth::extract_bearer(Some(&token)).unwrap_or(token.trim());
            Ok(match codec.verify_detailed(raw) {
                Ok(uid) => json!({ "valid": true, "uid": uid }),
                Err(rejection) => json!({ "valid": false, "reason": rejection.to_string() }),
            })
        }
    }
}

fn run_push(command: PushCommand, settings: &WayfarerSettings) -> Result<serde_json::Value> {
    match command {
        PushCommand::Status => {
            let environment = ApnsEnvironment::from_settings(&settings.push);
            Ok(json!({
                "configured": wayfarer_push::is_configured(&settings.push),
                "missing": settings.push.missing_fields(),
                "environment": environment.to_string(),
                "host": environment.host(),
            }))
        }
        PushCommand::Send {
            devices,
            title,
            body,
            data,
        } => {
            let mut payload = PushPayload::new(title, body);
            payload.data.extend(data);

            let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            let dispatcher = PushDispatcher::from_settings(&settings.push);
            let results = runtime.block_on(dispatcher.send_to_tokens(&devices, &payload));
            let delivered = results.iter().filter(|r| r.success).count();
            Ok(json!({
                "attempted": results.len(),
                "delivered": delivered,
                "results": results,
            }))
        }
    }
}

fn origin_label(origin: SecretOrigin) -> String {
    match origin {
        SecretOrigin::Configured(source) => source.to_string(),
        SecretOrigin::Explicit => "explicit".to_string(),
        SecretOrigin::DevelopmentFallback => "development-fallback".to_string(),
    }
}

/// Parse a `key=value` pair. The value may itself contain `=`.
fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
