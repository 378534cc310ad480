//! Scripted transport for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use wayfarer_settings::PushSettings;

use super::transport::{ProviderRequest, ProviderResponse, PushSession, PushTransport};
use crate::errors::TransportError;

pub(crate) const TEST_KEY: &str = include_str!("../../tests/fixtures/AuthKey_TESTKEY01.p8");

pub(crate) fn configured_settings() -> PushSettings {
    PushSettings {
        team_id: Some("TEAM123456".to_string()),
        key_id: Some("TESTKEY01".to_string()),
        private_key: Some(TEST_KEY.to_string()),
        bundle_id: Some("com.example.Wayfarer".to_string()),
        ..PushSettings::default()
    }
}

/// Scripted reply for one token. Unscripted tokens get `Ok`.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Ok,
    Status(u16, &'static str),
    TransportError(&'static str),
    Delayed(Duration),
    Panic,
}

#[derive(Default)]
struct Shared {
    replies: HashMap<String, Reply>,
    requests: Mutex<Vec<ProviderRequest>>,
    completed: Mutex<Vec<String>>,
    hosts: Mutex<Vec<String>>,
    connects: AtomicUsize,
    closed: AtomicBool,
}

#[derive(Default)]
pub(crate) struct MockTransport {
    shared: Arc<Shared>,
    refuse: bool,
}

impl MockTransport {
    pub(crate) fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Script the reply for `token`. Must be called before sharing.
    pub(crate) fn reply(mut self, token: &str, reply: Reply) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            let _ = shared.replies.insert(token.to_string(), reply);
        }
        self
    }

    pub(crate) fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<ProviderRequest> {
        self.shared.requests.lock().clone()
    }

    pub(crate) fn completion_order(&self) -> Vec<String> {
        self.shared.completed.lock().clone()
    }

    pub(crate) fn hosts(&self) -> Vec<String> {
        self.shared.hosts.lock().clone()
    }
}

#[async_trait]
impl PushTransport for MockTransport {
    async fn connect(&self, host: &str) -> Result<Arc<dyn PushSession>, TransportError> {
        let _ = self.shared.connects.fetch_add(1, Ordering::SeqCst);
        self.shared.hosts.lock().push(host.to_string());
        if self.refuse {
            return Err(TransportError::Connect {
                host: host.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(Arc::new(MockSession {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockSession {
    shared: Arc<Shared>,
}

#[async_trait]
impl PushSession for MockSession {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, TransportError> {
        let token = request.device_token.clone();
        self.shared.requests.lock().push(request);
        let reply = self
            .shared
            .replies
            .get(&token)
            .cloned()
            .unwrap_or(Reply::Ok);

        let outcome = match reply {
            Reply::Ok => Ok(ok_response(&token)),
            Reply::Delayed(delay) => {
                tokio::time::sleep(delay).await;
                Ok(ok_response(&token))
            }
            Reply::Status(status, body) => Ok(ProviderResponse {
                status,
                apns_id: Some(format!("id-{token}")),
                body: body.to_string(),
            }),
            Reply::TransportError(reason) => Err(TransportError::Request {
                reason: reason.to_string(),
            }),
            Reply::Panic => panic!("scripted panic for {token}"),
        };
        self.shared.completed.lock().push(token);
        outcome
    }

    async fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }
}

fn ok_response(token: &str) -> ProviderResponse {
    ProviderResponse {
        status: 200,
        apns_id: Some(format!("id-{token}")),
        body: String::new(),
    }
}
