//! Apple Push Notification service provider.
//!
//! Token-based provider authentication (ES256 assertions cached for reuse)
//! and HTTP/2 fan-out of one payload to many device tokens.

pub mod config;
pub mod credential;
pub mod dispatcher;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ApnsEnvironment, KeySource, ProviderCredential, is_configured};
pub use credential::{ASSERTION_TTL_SECS, AssertionCache, ProviderAssertion, REFRESH_MARGIN_SECS};
pub use dispatcher::{BatchStage, PushDispatcher};
pub use transport::{
    HttpTransportOptions, ProviderRequest, ProviderResponse, PushSession, PushTransport,
    ReqwestTransport,
};
pub use types::{PushPayload, PushResult, is_valid_device_token, reasons};
