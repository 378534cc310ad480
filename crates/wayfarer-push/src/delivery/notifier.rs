//! User-addressed delivery with invalid token cleanup.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::store::DeviceTokenStore;
use crate::apns::{PushDispatcher, PushPayload, PushResult};
use crate::errors::StoreError;

/// Outcome of notifying one or more users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySummary {
    /// Tokens a send was attempted for.
    pub attempted: usize,
    /// Tokens the provider accepted.
    pub delivered: usize,
    /// Tokens deactivated because the provider reported them invalid.
    pub deactivated: Vec<String>,
    /// Per-token results in send order.
    pub results: Vec<PushResult>,
}

/// Resolves users to device tokens, sends, then deactivates dead tokens.
pub struct PushNotifier {
    dispatcher: Arc<PushDispatcher>,
    store: Arc<dyn DeviceTokenStore>,
}

impl PushNotifier {
    /// Create a notifier.
    pub fn new(dispatcher: Arc<PushDispatcher>, store: Arc<dyn DeviceTokenStore>) -> Self {
        Self { dispatcher, store }
    }

    /// Notify every active device of `user_id`.
    pub async fn notify_user(
        &self,
        user_id: &str,
        payload: &PushPayload,
    ) -> Result<DeliverySummary, StoreError> {
        self.notify_users(&[user_id], payload).await
    }

    /// Notify every active device of each user, sending each token once.
    pub async fn notify_users(
        &self,
        user_ids: &[&str],
        payload: &PushPayload,
    ) -> Result<DeliverySummary, StoreError> {
        let mut seen = HashSet::new();
        let mut tokens = Vec::new();
        for user_id in user_ids {
            for token in self.store.active_for_user(user_id).await? {
                if seen.insert(token.clone()) {
                    tokens.push(token);
                }
            }
        }

        if tokens.is_empty() {
            info!(users = user_ids.len(), "no active device tokens, nothing to send");
            return Ok(DeliverySummary::default());
        }

        let results = self.dispatcher.send_to_tokens(&tokens, payload).await;

        let mut deactivated = Vec::new();
        for result in results.iter().filter(|r| r.is_token_invalid()) {
            match self.store.deactivate(&result.device_token).await {
                Ok(true) => deactivated.push(result.device_token.clone()),
                Ok(false) => {}
                Err(e) => warn!(
                    token = %wayfarer_core::text::redact(&result.device_token),
                    error = %e,
                    "failed to deactivate invalid device token"
                ),
            }
        }

        let summary = DeliverySummary {
            attempted: tokens.len(),
            delivered: results.iter().filter(|r| r.success).count(),
            deactivated,
            results,
        };
        info!(
            users = user_ids.len(),
            attempted = summary.attempted,
            delivered = summary.delivered,
            deactivated = summary.deactivated.len(),
            "push delivery complete"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for PushNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushNotifier")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
