//! Push payload and per-token result types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Failure reason codes reported in [`PushResult::reason`].
///
/// Provider rejections carry the provider's own reason string (for example
/// `BadDeviceToken`) when it can be parsed from the response body.
pub mod reasons {
    /// Push configuration is incomplete; nothing was sent.
    pub const NOT_CONFIGURED: &str = "apns_not_configured";
    /// Non-200 response without a parseable reason.
    pub const REJECTED: &str = "apns_rejected";
    /// The request for this token failed before a status was received.
    pub const REQUEST_ERROR: &str = "apns_request_error";
    /// Session-level failure affecting the whole batch.
    pub const SEND_ERROR: &str = "apns_send_error";
    /// Provider reason: the token is no longer active for the topic.
    pub const UNREGISTERED: &str = "Unregistered";
    /// Provider reason: the token is malformed or for another environment.
    pub const BAD_DEVICE_TOKEN: &str = "BadDeviceToken";
}

/// HTTP status the provider returns for a token that is no longer valid.
pub const STATUS_GONE: u16 = 410;

/// Whether `token` has the provider's device token shape: non-empty hex.
///
/// Tokens become a request path segment, so anything else is refused
/// before it reaches the transport.
pub fn is_valid_device_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// A notification to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    /// Alert title.
    pub title: String,
    /// Alert body.
    pub body: String,
    /// Custom string data passed through to the app.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl PushPayload {
    /// Create a payload with no custom data.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: BTreeMap::new(),
        }
    }

    /// Add a custom data entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.data.insert(key.into(), value.into());
        self
    }

    /// Serialize into the provider request body.
    ///
    /// Shape: `{"aps":{"alert":{"title","body"},"sound":"default"},"data":{..}}`.
    pub fn to_request_body(&self) -> serde_json::Result<String> {
        serde_json::to_string(&ApnsBody {
            aps: Aps {
                alert: Alert {
                    title: &self.title,
                    body: &self.body,
                },
                sound: "default",
            },
            data: &self.data,
        })
    }
}

#[derive(Serialize)]
struct ApnsBody<'a> {
    aps: Aps<'a>,
    data: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct Aps<'a> {
    alert: Alert<'a>,
    sound: &'static str,
}

#[derive(Serialize)]
struct Alert<'a> {
    title: &'a str,
    body: &'a str,
}

/// Rejection body returned with a non-200 status.
#[derive(Debug, Deserialize)]
pub(crate) struct RejectionBody {
    pub reason: Option<String>,
}

/// Parse the provider's reason from a rejection body.
pub(crate) fn rejection_reason(body: &str) -> Option<String> {
    serde_json::from_str::<RejectionBody>(body)
        .ok()
        .and_then(|b| b.reason)
        .filter(|r| !r.is_empty())
}

/// Outcome for one device token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResult {
    /// The target token.
    pub device_token: String,
    /// Whether the provider accepted the notification.
    pub success: bool,
    /// Failure reason; `None` on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// HTTP status, when a response was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Provider-assigned notification ID (`apns-id` header).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apns_id: Option<String>,
    /// Diagnostic detail such as a transport error or raw rejection body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PushResult {
    /// Accepted by the provider.
    pub fn delivered(device_token: impl Into<String>, apns_id: Option<String>) -> Self {
        Self {
            device_token: device_token.into(),
            success: true,
            reason: None,
            status_code: Some(200),
            apns_id,
            error: None,
        }
    }

    /// Failed with `reason`.
    pub fn failed(device_token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            device_token: device_token.into(),
            success: false,
            reason: Some(reason.into()),
            status_code: None,
            apns_id: None,
            error: None,
        }
    }

    /// Attach diagnostic detail.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Whether the provider reported this token as permanently invalid.
    ///
    /// Such tokens should be deactivated so later batches skip them.
    pub fn is_token_invalid(&self) -> bool {
        !self.success
            && (self.status_code == Some(STATUS_GONE)
                || matches!(
                    self.reason.as_deref(),
                    Some(reasons::UNREGISTERED | reasons::BAD_DEVICE_TOKEN)
                ))
    }
}

/// Build one failed result per token, all with the same reason.
pub(crate) fn fail_all(tokens: &[String], reason: &str, error: Option<&str>) -> Vec<PushResult> {
    tokens
        .iter()
        .map(|token| {
            let result = PushResult::failed(token.as_str(), reason);
            match error {
                Some(e) => result.with_error(e),
                None => result,
            }
        })
        .collect()
}
