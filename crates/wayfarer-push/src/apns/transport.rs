//! Provider transport seam.
//!
//! A batch opens one [`PushSession`] to the provider host, sends every
//! request over it concurrently, then closes it. [`ReqwestTransport`] is the
//! production implementation; tests substitute their own.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;
use wayfarer_settings::PushSettings;

use crate::errors::TransportError;

/// One notification request to one device.
#[derive(Clone)]
pub struct ProviderRequest {
    /// Target device token. Hex only; see
    /// [`is_valid_device_token`](super::types::is_valid_device_token).
    pub device_token: String,
    /// App bundle ID (`apns-topic`).
    pub topic: String,
    /// Provider assertion (`authorization: bearer <jwt>`).
    pub assertion: String,
    /// `apns-push-type`.
    pub push_type: &'static str,
    /// `apns-priority`.
    pub priority: u8,
    /// JSON body.
    pub body: String,
}

impl ProviderRequest {
    /// Request path on the provider host.
    pub fn path(&self) -> String {
        format!("/3/device/{}", self.device_token)
    }
}

impl std::fmt::Debug for ProviderRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRequest")
            .field("device_token", &wayfarer_core::text::redact(&self.device_token))
            .field("topic", &self.topic)
            .field("push_type", &self.push_type)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Provider response to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    /// HTTP status.
    pub status: u16,
    /// `apns-id` response header.
    pub apns_id: Option<String>,
    /// Raw response body (empty on success).
    pub body: String,
}

/// Opens sessions to the provider.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Open a multiplexed session to `host`.
    async fn connect(&self, host: &str) -> Result<Arc<dyn PushSession>, TransportError>;
}

/// A session that carries many concurrent requests.
#[async_trait]
pub trait PushSession: Send + Sync {
    /// Send one request and wait for its response.
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, TransportError>;

    /// Release the session. Requests after close fail with
    /// [`TransportError::Closed`].
    async fn close(&self);
}

/// Options for [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Speak HTTP/2 without negotiation. The provider requires HTTP/2.
    pub http2_prior_knowledge: bool,
    /// Replace `https://<host>` (for local test servers).
    pub base_url: Option<String>,
}

impl Default for HttpTransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            http2_prior_knowledge: true,
            base_url: None,
        }
    }
}

impl HttpTransportOptions {
    /// Options derived from push settings.
    pub fn from_settings(settings: &PushSettings) -> Self {
        Self {
            timeout: Duration::from_millis(settings.request_timeout_ms),
            ..Self::default()
        }
    }
}

/// HTTP/2 transport built on `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    options: HttpTransportOptions,
}

impl ReqwestTransport {
    /// Create a transport with `options`.
    pub fn new(options: HttpTransportOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl PushTransport for ReqwestTransport {
    async fn connect(&self, host: &str) -> Result<Arc<dyn PushSession>, TransportError> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.options.timeout)
            .pool_max_idle_per_host(1);
        if self.options.http2_prior_knowledge {
            builder = builder.http2_prior_knowledge();
        }
        let client = builder.build().map_err(|e| TransportError::ClientBuild {
            reason: e.to_string(),
        })?;

        let base_url = self
            .options
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{host}"));
        debug!(%base_url, "APNS session opened");

        Ok(Arc::new(ReqwestSession {
            client,
            base_url,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Session over one `reqwest` client; its pool keeps a single HTTP/2
/// connection that all requests of the batch multiplex over.
struct ReqwestSession {
    client: reqwest::Client,
    base_url: String,
    closed: AtomicBool,
}

#[async_trait]
impl PushSession for ReqwestSession {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let url = format!("{}{}", self.base_url, request.path());
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("bearer {}", request.assertion))
            .header("apns-topic", &request.topic)
            .header("apns-push-type", request.push_type)
            .header("apns-priority", request.priority.to_string())
            .header(CONTENT_TYPE, "application/json")
            .body(request.body)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let apns_id = response
            .headers()
            .get("apns-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.text().await.map_err(|e| TransportError::Request {
            reason: e.to_string(),
        })?;

        Ok(ProviderResponse {
            status,
            apns_id,
            body,
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        debug!(base_url = %self.base_url, "APNS session closed");
    }
}
