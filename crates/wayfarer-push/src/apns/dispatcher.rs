//! Batch fan-out to device tokens.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use wayfarer_core::SystemClock;
use wayfarer_core::text::redact;
use wayfarer_settings::PushSettings;

use super::config::{ApnsEnvironment, is_configured};
use super::credential::AssertionCache;
use super::transport::{
    HttpTransportOptions, ProviderRequest, PushSession, PushTransport, ReqwestTransport,
};
use super::types::{
    PushPayload, PushResult, fail_all, is_valid_device_token, reasons, rejection_reason,
};

/// `apns-push-type` for user-visible notifications.
pub const PUSH_TYPE_ALERT: &str = "alert";

/// `apns-priority` for immediate delivery.
pub const PRIORITY_IMMEDIATE: u8 = 10;

const MALFORMED_TOKEN: &str = "device token must be non-empty hexadecimal";

/// Progress of one batch, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    /// Nothing done yet.
    Idle,
    /// Configuration verified complete.
    ConfigChecked,
    /// Provider assertion in hand.
    AssertionObtained,
    /// Session to the provider host open.
    SessionOpen,
    /// Every per-token request has settled.
    AllResultsResolved,
    /// Session released.
    SessionClosed,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ConfigChecked => "config_checked",
            Self::AssertionObtained => "assertion_obtained",
            Self::SessionOpen => "session_open",
            Self::AllResultsResolved => "all_results_resolved",
            Self::SessionClosed => "session_closed",
        };
        f.write_str(name)
    }
}

/// Sends one payload to many device tokens over a single provider session.
///
/// [`send_to_tokens`](Self::send_to_tokens) never fails as a whole: every
/// token gets exactly one [`PushResult`], in input order.
pub struct PushDispatcher {
    settings: PushSettings,
    credentials: Arc<AssertionCache>,
    transport: Arc<dyn PushTransport>,
}

impl PushDispatcher {
    /// Create a dispatcher from its parts.
    pub fn new(
        settings: PushSettings,
        credentials: Arc<AssertionCache>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            settings,
            credentials,
            transport,
        }
    }

    /// Production dispatcher: system clock and HTTP/2 transport.
    pub fn from_settings(settings: &PushSettings) -> Self {
        let credentials = Arc::new(AssertionCache::new(settings.clone(), Arc::new(SystemClock)));
        let transport = Arc::new(ReqwestTransport::new(HttpTransportOptions::from_settings(
            settings,
        )));
        Self::new(settings.clone(), credentials, transport)
    }

    /// Whether every field needed for delivery is configured.
    pub fn is_configured(&self) -> bool {
        is_configured(&self.settings)
    }

    /// Provider environment in use.
    pub fn environment(&self) -> ApnsEnvironment {
        ApnsEnvironment::from_settings(&self.settings)
    }

    /// Shared assertion cache.
    pub fn credentials(&self) -> &Arc<AssertionCache> {
        &self.credentials
    }

    /// Send `payload` to every token in `tokens`.
    ///
    /// Failures affecting the whole batch (missing configuration, assertion
    /// signing, opening the session) mark every token failed with the same
    /// reason. Once the session is open, each token succeeds or fails on its
    /// own and the session is always closed afterwards.
    ///
    /// Tokens that are not hex fail with `BadDeviceToken` and are never sent.
    /// Dropping the returned future aborts requests still in flight.
    pub async fn send_to_tokens(&self, tokens: &[String], payload: &PushPayload) -> Vec<PushResult> {
        if tokens.is_empty() {
            return Vec::new();
        }
        let count = tokens.len();
        let mut stage = BatchStage::Idle;

        if !self.is_configured() {
            warn!(
                count,
                missing = ?self.settings.missing_fields(),
                "APNS not configured, skipping push"
            );
            return fail_all(tokens, reasons::NOT_CONFIGURED, None);
        }
        advance(&mut stage, BatchStage::ConfigChecked);

        let assertion = match self.credentials.get() {
            Ok(assertion) => assertion,
            Err(e) => {
                warn!(count, error = %e, "APNS assertion unavailable");
                return fail_all(tokens, &e.to_string(), None);
            }
        };
        advance(&mut stage, BatchStage::AssertionObtained);

        let body = match payload.to_request_body() {
            Ok(body) => body,
            Err(e) => {
                warn!(count, error = %e, "APNS payload serialization failed");
                return fail_all(tokens, reasons::SEND_ERROR, Some(&e.to_string()));
            }
        };

        let mut slots: Vec<Option<PushResult>> = tokens
            .iter()
            .map(|token| {
                (!is_valid_device_token(token)).then(|| {
                    warn!(token = %redact(token), "malformed device token, not sent");
                    PushResult::failed(token.as_str(), reasons::BAD_DEVICE_TOKEN)
                        .with_error(MALFORMED_TOKEN)
                })
            })
            .collect();
        if slots.iter().all(Option::is_some) {
            return slots.into_iter().flatten().collect();
        }

        let environment = self.environment();
        let session = match self.transport.connect(environment.host()).await {
            Ok(session) => session,
            Err(e) => {
                warn!(count, %environment, error = %e, "APNS session failed to open");
                let error = e.to_string();
                return tokens
                    .iter()
                    .zip(slots)
                    .map(|(token, slot)| {
                        slot.unwrap_or_else(|| {
                            PushResult::failed(token.as_str(), reasons::SEND_ERROR)
                                .with_error(error.as_str())
                        })
                    })
                    .collect();
            }
        };
        advance(&mut stage, BatchStage::SessionOpen);

        let topic = self
            .settings
            .bundle_id
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        let mut tasks = JoinSet::new();
        for (index, token) in tokens.iter().enumerate() {
            if slots[index].is_some() {
                continue;
            }
            let session = Arc::clone(&session);
            let request = ProviderRequest {
                device_token: token.clone(),
                topic: topic.clone(),
                assertion: assertion.value.clone(),
                push_type: PUSH_TYPE_ALERT,
                priority: PRIORITY_IMMEDIATE,
                body: body.clone(),
            };
            let _ = tasks.spawn(async move {
                let outcome = AssertUnwindSafe(deliver(session.as_ref(), request))
                    .catch_unwind()
                    .await;
                (index, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(result))) => slots[index] = Some(result),
                Ok((index, Err(_panic))) => {
                    warn!(token = %redact(&tokens[index]), "APNS delivery task panicked");
                    slots[index] = Some(
                        PushResult::failed(tokens[index].as_str(), reasons::SEND_ERROR)
                            .with_error("delivery task panicked"),
                    );
                }
                Err(e) => warn!(error = %e, "APNS delivery task failed"),
            }
        }
        let results: Vec<PushResult> = tokens
            .iter()
            .zip(slots)
            .map(|(token, slot)| {
                slot.unwrap_or_else(|| {
                    PushResult::failed(token.as_str(), reasons::SEND_ERROR)
                        .with_error("delivery task did not complete")
                })
            })
            .collect();
        advance(&mut stage, BatchStage::AllResultsResolved);

        session.close().await;
        advance(&mut stage, BatchStage::SessionClosed);

        let delivered = results.iter().filter(|r| r.success).count();
        info!(
            count,
            delivered,
            failed = count - delivered,
            %environment,
            "APNS batch complete"
        );
        results
    }
}

impl fmt::Debug for PushDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushDispatcher")
            .field("settings", &self.settings)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

fn advance(stage: &mut BatchStage, next: BatchStage) {
    debug!(from = %stage, to = %next, "APNS batch stage");
    *stage = next;
}

async fn deliver(session: &dyn PushSession, request: ProviderRequest) -> PushResult {
    let token = request.device_token.clone();
    match session.send(request).await {
        Ok(response) if response.status == 200 => {
            debug!(token = %redact(&token), "APNS notification sent");
            PushResult::delivered(token, response.apns_id)
        }
        Ok(response) => {
            let reason =
                rejection_reason(&response.body).unwrap_or_else(|| reasons::REJECTED.to_string());
            warn!(
                token = %redact(&token),
                status = response.status,
                %reason,
                "APNS rejected notification"
            );
            PushResult {
                device_token: token,
                success: false,
                reason: Some(reason),
                status_code: Some(response.status),
                apns_id: response.apns_id,
                error: (!response.body.is_empty()).then_some(response.body),
            }
        }
        Err(e) => {
            warn!(
                token = %redact(&token),
                error = %e,
                "APNS request failed"
            );
            PushResult::failed(token, reasons::REQUEST_ERROR).with_error(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wayfarer_core::ManualClock;

    use super::*;
    use crate::apns::test_support::{MockTransport, Reply, configured_settings};

    fn dispatcher(settings: PushSettings, transport: Arc<MockTransport>) -> PushDispatcher {
        let credentials = Arc::new(AssertionCache::new(
            settings.clone(),
            Arc::new(ManualClock::new(1_700_000_000)),
        ));
        PushDispatcher::new(settings, credentials, transport)
    }

    fn tokens(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn payload() -> PushPayload {
        PushPayload::new("Trip updated", "New stop added").with_data("tripId", "trip-1")
    }

    #[tokio::test]
    async fn empty_batch_does_nothing() {
        let transport = Arc::new(MockTransport::default());
        let dispatcher = dispatcher(configured_settings(), transport.clone());
        let results = dispatcher.send_to_tokens(&[], &payload()).await;
        assert!(results.is_empty());
        assert_eq!(transport.connects(), 0);
        assert_eq!(dispatcher.credentials().signing_count(), 0);
    }

    #[tokio::test]
    async fn unconfigured_fails_every_token_without_network() {
        let transport = Arc::new(MockTransport::default());
        let settings = PushSettings {
            bundle_id: None,
            ..configured_settings()
        };
        let dispatcher = dispatcher(settings, transport.clone());
        let results = dispatcher.send_to_tokens(&tokens(&["a", "b"]), &payload()).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success));
        assert!(results.iter().all(|r| r.reason.as_deref() == Some("apns_not_configured")));
        assert_eq!(transport.connects(), 0);
    }

    #[tokio::test]
    async fn assertion_failure_reason_is_error_message() {
        let transport = Arc::new(MockTransport::default());
        let settings = PushSettings {
            private_key: Some("garbage".to_string()),
            ..configured_settings()
        };
        let dispatcher = dispatcher(settings, transport.clone());
        let results = dispatcher.send_to_tokens(&tokens(&["a", "b"]), &payload()).await;

        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(!result.success);
            assert!(result.reason.as_deref().unwrap().starts_with("failed to parse APNS key"));
        }
        assert_eq!(transport.connects(), 0);
    }

    #[tokio::test]
    async fn session_open_failure_fails_every_token() {
        let transport = Arc::new(MockTransport::refusing());
        let dispatcher = dispatcher(configured_settings(), transport.clone());
        let results = dispatcher.send_to_tokens(&tokens(&["a", "b", "c"]), &payload()).await;

        assert_eq!(results.len(), 3);
        for result in &results {
            assert_eq!(result.reason.as_deref(), Some("apns_send_error"));
            assert!(result.error.as_deref().unwrap().contains("refused"));
        }
        assert!(!transport.closed());
    }

    #[tokio::test]
    async fn session_open_failure_keeps_malformed_token_reason() {
        let transport = Arc::new(MockTransport::refusing());
        let dispatcher = dispatcher(configured_settings(), transport);
        let results = dispatcher.send_to_tokens(&tokens(&["a/b", "a1"]), &payload()).await;

        assert_eq!(results[0].reason.as_deref(), Some("BadDeviceToken"));
        assert_eq!(results[1].reason.as_deref(), Some("apns_send_error"));
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_siblings() {
        let transport = Arc::new(
            MockTransport::default().reply("a2", Reply::TransportError("connection reset")),
        );
        let dispatcher = dispatcher(configured_settings(), transport.clone());
        let results = dispatcher.send_to_tokens(&tokens(&["a1", "a2", "a3"]), &payload()).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert_eq!(results[0].status_code, Some(200));
        assert!(!results[1].success);
        assert_eq!(results[1].reason.as_deref(), Some("apns_request_error"));
        assert!(results[1].error.as_deref().unwrap().contains("connection reset"));
        assert!(results[2].success);
        assert_eq!(transport.connects(), 1);
        assert!(transport.closed());
    }

    #[tokio::test]
    async fn results_keep_input_order_regardless_of_completion() {
        let transport = Arc::new(
            MockTransport::default()
                .reply("5104", Reply::Delayed(Duration::from_millis(50)))
                .reply("fa57", Reply::Ok),
        );
        let dispatcher = dispatcher(configured_settings(), transport.clone());
        let results = dispatcher.send_to_tokens(&tokens(&["5104", "fa57"]), &payload()).await;

        assert_eq!(results[0].device_token, "5104");
        assert_eq!(results[1].device_token, "fa57");
        assert!(results.iter().all(|r| r.success));
        assert_eq!(transport.completion_order(), vec!["fa57", "5104"]);
    }

    #[tokio::test]
    async fn rejection_reason_from_body() {
        let transport = Arc::new(
            MockTransport::default()
                .reply("90e", Reply::Status(410, r#"{"reason":"Unregistered","timestamp":1}"#))
                .reply("f00", Reply::Status(502, "<html>bad gateway</html>"))
                .reply("e0", Reply::Status(500, "")),
        );
        let dispatcher = dispatcher(configured_settings(), transport);
        let results = dispatcher
            .send_to_tokens(&tokens(&["90e", "f00", "e0"]), &payload())
            .await;

        assert_eq!(results[0].reason.as_deref(), Some("Unregistered"));
        assert_eq!(results[0].status_code, Some(410));
        assert!(results[0].is_token_invalid());

        assert_eq!(results[1].reason.as_deref(), Some("apns_rejected"));
        assert_eq!(results[1].status_code, Some(502));
        assert_eq!(results[1].error.as_deref(), Some("<html>bad gateway</html>"));

        assert_eq!(results[2].reason.as_deref(), Some("apns_rejected"));
        assert_eq!(results[2].error, None);
    }

    #[tokio::test]
    async fn panicking_request_is_isolated() {
        let transport = Arc::new(MockTransport::default().reply("b00", Reply::Panic));
        let dispatcher = dispatcher(configured_settings(), transport.clone());
        let results = dispatcher.send_to_tokens(&tokens(&["0c", "b00"]), &payload()).await;

        assert!(results[0].success);
        assert!(!results[1].success);
        assert_eq!(results[1].reason.as_deref(), Some("apns_send_error"));
        assert_eq!(results[1].error.as_deref(), Some("delivery task panicked"));
        assert!(transport.closed());
    }

    #[tokio::test]
    async fn malformed_tokens_are_never_sent() {
        let transport = Arc::new(MockTransport::default());
        let dispatcher = dispatcher(configured_settings(), transport.clone());
        let batch = tokens(&["attacker/../victim", "a1?x=1", "ab#cd", "..", "", "a1"]);
        let results = dispatcher.send_to_tokens(&batch, &payload()).await;

        assert_eq!(results.len(), 6);
        for (result, token) in results.iter().zip(&batch).take(5) {
            assert_eq!(&result.device_token, token);
            assert!(!result.success);
            assert_eq!(result.reason.as_deref(), Some("BadDeviceToken"));
            assert_eq!(result.status_code, None);
            assert!(result.is_token_invalid());
        }
        assert!(results[5].success);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path(), "/3/device/a1");
        assert!(transport.closed());
    }

    #[tokio::test]
    async fn all_malformed_batch_opens_no_session() {
        let transport = Arc::new(MockTransport::default());
        let dispatcher = dispatcher(configured_settings(), transport.clone());
        let results = dispatcher.send_to_tokens(&tokens(&["../3/device/x", "zz"]), &payload()).await;

        assert!(results.iter().all(|r| r.reason.as_deref() == Some("BadDeviceToken")));
        assert_eq!(transport.connects(), 0);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn dropping_the_batch_aborts_in_flight_requests() {
        let transport = Arc::new(
            MockTransport::default().reply("5104", Reply::Delayed(Duration::from_millis(200))),
        );
        let dispatcher = dispatcher(configured_settings(), transport.clone());
        let batch = tokens(&["5104"]);

        let outcome = tokio::time::timeout(
            Duration::from_millis(20),
            dispatcher.send_to_tokens(&batch, &payload()),
        )
        .await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(transport.requests().len(), 1);
        assert!(transport.completion_order().is_empty());
    }

    #[tokio::test]
    async fn requests_carry_provider_headers_and_body() {
        let transport = Arc::new(MockTransport::default());
        let dispatcher = dispatcher(configured_settings(), transport.clone());
        let _ = dispatcher.send_to_tokens(&tokens(&["abc"]), &payload()).await;

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.path(), "/3/device/abc");
        assert_eq!(request.topic, "com.example.Wayfarer");
        assert_eq!(request.push_type, "alert");
        assert_eq!(request.priority, 10);
        assert_eq!(request.assertion.split('.').count(), 3);

        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body["aps"]["alert"]["title"], "Trip updated");
        assert_eq!(body["aps"]["sound"], "default");
        assert_eq!(body["data"]["tripId"], "trip-1");
        assert_eq!(transport.hosts(), vec!["api.push.apple.com"]);
    }

    #[tokio::test]
    async fn sandbox_flag_selects_sandbox_host() {
        let transport = Arc::new(MockTransport::default());
        let settings = PushSettings {
            use_sandbox: true,
            ..configured_settings()
        };
        let dispatcher = dispatcher(settings, transport.clone());
        let _ = dispatcher.send_to_tokens(&tokens(&["abc"]), &payload()).await;
        assert_eq!(transport.hosts(), vec!["api.sandbox.push.apple.com"]);
    }

    #[tokio::test]
    async fn assertion_reused_across_batches() {
        let transport = Arc::new(MockTransport::default());
        let dispatcher = dispatcher(configured_settings(), transport.clone());
        let _ = dispatcher.send_to_tokens(&tokens(&["a"]), &payload()).await;
        let _ = dispatcher.send_to_tokens(&tokens(&["b"]), &payload()).await;

        assert_eq!(dispatcher.credentials().signing_count(), 1);
        assert_eq!(transport.connects(), 2);
        let requests = transport.requests();
        assert_eq!(requests[0].assertion, requests[1].assertion);
    }

    #[test]
    fn stage_display() {
        assert_eq!(BatchStage::AllResultsResolved.to_string(), "all_results_resolved");
        assert_eq!(BatchStage::Idle.to_string(), "idle");
    }
}
