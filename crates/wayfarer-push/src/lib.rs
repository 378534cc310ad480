//! # wayfarer-push
//!
//! Push notification delivery through APNs.
//!
//! - [`PushDispatcher`]: one payload to many device tokens over a single
//!   HTTP/2 session, one [`PushResult`] per token
//! - [`AssertionCache`]: ES256 provider assertions, reused until near expiry
//! - [`PushNotifier`]: user-addressed sends over a [`DeviceTokenStore`],
//!   deactivating tokens the provider reports invalid
//!
//! Delivery is best-effort. An unconfigured deployment reports
//! `apns_not_configured` per token instead of failing.

#![deny(unsafe_code)]

pub mod apns;
pub mod delivery;
pub mod errors;

pub use apns::{
    ApnsEnvironment, AssertionCache, HttpTransportOptions, ProviderAssertion, PushDispatcher,
    PushPayload, PushResult, PushSession, PushTransport, ReqwestTransport, is_configured, reasons,
};
pub use delivery::{
    DeliverySummary, DeviceRegistration, DeviceTokenStore, InMemoryDeviceTokenStore, PushNotifier,
};
pub use errors::{CredentialError, StoreError, TransportError};
