//! Trait abstractions over the platform Bluetooth capability.
//!
//! The connection actor is generic over [`Bluetooth`], so the same protocol
//! runs against real hardware ([`crate::ble::BtleplugBluetooth`]) and the
//! in-memory mock ([`crate::mock::MockBluetooth`]).
//!
//! # Example
//!
//! ```ignore
//! use hrmon_core::{Bluetooth, DeviceFilter, Result, SensorDevice};
//!
//! async fn pair_name<B: Bluetooth>(bt: &B) -> Result<Option<String>> {
//!     let device = bt.request_device(&DeviceFilter::heart_rate()).await?;
//!     Ok(device.name())
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use hrmon_types::uuid::{BATTERY_SERVICE, HEART_RATE_SERVICE};

use crate::error::Result;

/// Callback a backend fires from its own task when something happens on
/// the device.
pub type Observer = Arc<dyn Fn() + Send + Sync>;

/// Services a discovered device must (or may) expose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    /// Every one of these must be advertised.
    pub services: Vec<Uuid>,
    /// Accessed if present, never required.
    pub optional_services: Vec<Uuid>,
}

impl DeviceFilter {
    /// Filter for a heart-rate sensor, with battery service as optional.
    pub fn heart_rate() -> Self {
        Self {
            services: vec![HEART_RATE_SERVICE],
            optional_services: vec![BATTERY_SERVICE],
        }
    }

    /// Whether a device advertising `advertised` passes the filter.
    pub fn matches(&self, advertised: &[Uuid]) -> bool {
        self.services.iter().all(|s| advertised.contains(s))
    }
}

/// The platform Bluetooth capability.
#[async_trait]
pub trait Bluetooth: Send + Sync + 'static {
    /// Device handle produced by discovery.
    type Device: SensorDevice;

    /// Check that the capability exists on this platform.
    ///
    /// An error here is fatal for the connection actor.
    async fn availability(&self) -> Result<()>;

    /// Discover a device passing `filter`.
    async fn request_device(&self, filter: &DeviceFilter) -> Result<Self::Device>;
}

/// A discovered (paired) sensor.
#[async_trait]
pub trait SensorDevice: Send + Sync + 'static {
    /// Measurement characteristic handle.
    type Characteristic: MeasurementCharacteristic;

    /// Advertised device name, if known.
    fn name(&self) -> Option<String>;

    /// Register a callback fired when the link to the device drops.
    async fn on_disconnected(&self, observer: Observer) -> Result<()>;

    /// Open the GATT connection.
    async fn connect_gatt(&self) -> Result<()>;

    /// Resolve `characteristic` within primary service `service`.
    async fn characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Self::Characteristic>;

    /// Drop the GATT connection.
    async fn disconnect(&self) -> Result<()>;
}

/// The subscribed measurement characteristic.
#[async_trait]
pub trait MeasurementCharacteristic: Send + Sync + 'static {
    /// Register a callback fired whenever the value changes.
    async fn on_value_changed(&self, observer: Observer) -> Result<()>;

    /// Enable value-change notifications.
    async fn start_notifications(&self) -> Result<()>;

    /// Disable value-change notifications.
    async fn stop_notifications(&self) -> Result<()>;

    /// The characteristic's current raw value.
    async fn read_value(&self) -> Result<Bytes>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrmon_types::uuid::HEART_RATE_MEASUREMENT;

    #[test]
    fn test_heart_rate_filter() {
        let filter = DeviceFilter::heart_rate();
        assert_eq!(filter.services, vec![HEART_RATE_SERVICE]);
        assert_eq!(filter.optional_services, vec![BATTERY_SERVICE]);
    }

    #[test]
    fn test_filter_requires_all_services() {
        let filter = DeviceFilter::heart_rate();
        assert!(filter.matches(&[BATTERY_SERVICE, HEART_RATE_SERVICE]));
        assert!(filter.matches(&[HEART_RATE_SERVICE]));
        assert!(!filter.matches(&[BATTERY_SERVICE]));
        assert!(!filter.matches(&[]));
        assert!(!filter.matches(&[HEART_RATE_MEASUREMENT]));
    }
}
