//! Device registrations and user-level notification delivery.

pub mod notifier;
pub mod store;

pub use notifier::{DeliverySummary, PushNotifier};
pub use store::{DevicePlatform, DeviceRegistration, DeviceTokenStore, InMemoryDeviceTokenStore};
