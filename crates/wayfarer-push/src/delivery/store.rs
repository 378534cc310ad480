//! Device token registrations.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::StoreError;

/// Client platform of a registered device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePlatform {
    /// iPhone or iPad.
    #[default]
    Ios,
}

/// A device token registered by a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    /// Provider device token (hex).
    pub device_token: String,
    /// Owning user ID.
    pub user_id: String,
    /// Client platform.
    #[serde(default)]
    pub platform: DevicePlatform,
    /// Stable client device identifier, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Client app version, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

impl DeviceRegistration {
    /// Registration for an iOS device.
    pub fn ios(device_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            device_token: device_token.into(),
            user_id: user_id.into(),
            platform: DevicePlatform::Ios,
            device_id: None,
            app_version: None,
        }
    }
}

/// Persistence for device token registrations.
#[async_trait]
pub trait DeviceTokenStore: Send + Sync {
    /// Insert or replace a registration and mark it active.
    ///
    /// Returns `true` when the token was not previously known.
    async fn register(&self, registration: DeviceRegistration) -> Result<bool, StoreError>;

    /// Remove a registration. Returns `true` if it existed.
    async fn unregister(&self, device_token: &str) -> Result<bool, StoreError>;

    /// Active tokens for `user_id`.
    async fn active_for_user(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    /// Mark a token inactive after the provider reported it invalid.
    ///
    /// Returns `true` if an active registration was deactivated. A later
    /// [`register`](Self::register) of the same token reactivates it.
    async fn deactivate(&self, device_token: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone)]
struct Entry {
    registration: DeviceRegistration,
    active: bool,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// In-process [`DeviceTokenStore`].
#[derive(Debug, Default)]
pub struct InMemoryDeviceTokenStore {
    inner: RwLock<Inner>,
}

impl InMemoryDeviceTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a registration regardless of state.
    pub fn get(&self, device_token: &str) -> Option<(DeviceRegistration, bool)> {
        self.inner
            .read()
            .entries
            .get(device_token)
            .map(|e| (e.registration.clone(), e.active))
    }
}

#[async_trait]
impl DeviceTokenStore for InMemoryDeviceTokenStore {
    async fn register(&self, registration: DeviceRegistration) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        inner.next_seq += 1;
        let seq = inner.next_seq;
        let token = registration.device_token.clone();
        let previous = inner.entries.insert(
            token,
            Entry {
                registration,
                active: true,
                seq,
            },
        );
        debug!(created = previous.is_none(), "device token registered");
        Ok(previous.is_none())
    }

    async fn unregister(&self, device_token: &str) -> Result<bool, StoreError> {
        Ok(self.inner.write().entries.remove(device_token).is_some())
    }

    async fn active_for_user(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read();
        let mut active: Vec<&Entry> = inner
            .entries
            .values()
            .filter(|e| e.active && e.registration.user_id == user_id)
            .collect();
        active.sort_by_key(|e| e.seq);
        Ok(active
            .into_iter()
            .map(|e| e.registration.device_token.clone())
            .collect())
    }

    async fn deactivate(&self, device_token: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        match inner.entries.get_mut(device_token) {
            Some(entry) if entry.active => {
                entry.active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
