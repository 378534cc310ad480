//! # wayfarer-core
//!
//! Foundation utilities shared by the Wayfarer crates:
//!
//! - **Clock**: [`Clock`] trait with [`SystemClock`] and a test-friendly [`ManualClock`]
//! - **Text**: UTF-8 safe truncation, used to log device tokens by prefix only
//! - **Logging**: [`logging::init_subscriber`] for the global `tracing` subscriber

#![deny(unsafe_code)]

pub mod clock;
pub mod logging;
pub mod text;

pub use clock::{Clock, ManualClock, SystemClock};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
