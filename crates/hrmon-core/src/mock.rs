//! In-memory Bluetooth backend for testing and demo mode.
//!
//! [`MockBluetooth`] implements the [`Bluetooth`] capability traits without
//! any hardware, so the actors can be driven end to end in tests and in the
//! CLI's `--demo` mode.
//!
//! # Features
//!
//! - **Failure injection**: make any [`MockOperation`] fail with a message
//! - **Latency simulation**: delay every capability call
//! - **Frame injection**: push raw measurement frames with [`MockBluetooth::emit_frame`]
//! - **Link drops**: simulate the sensor going away with [`MockBluetooth::drop_link`]
//!
//! All handles share one state, so a test keeps a clone of the
//! [`MockBluetooth`] and inspects it while the actor owns the device.
//!
//! ```
//! use hrmon_core::mock::{MockBluetooth, MockOperation};
//!
//! let bluetooth = MockBluetooth::builder().name("Test HRM").build();
//! bluetooth.fail(MockOperation::Connect, "out of range");
//! assert!(!bluetooth.is_connected());
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::trace;
use uuid::Uuid;

use hrmon_types::uuid::{HEART_RATE_MEASUREMENT, HEART_RATE_SERVICE};
use hrmon_types::{HeartRateSample, encode};

use crate::error::{Error, Result};
use crate::traits::{Bluetooth, DeviceFilter, MeasurementCharacteristic, Observer, SensorDevice};

/// A capability call that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    /// `request_device`
    Discover,
    /// `connect_gatt`
    Connect,
    /// `characteristic`
    Resolve,
    /// `start_notifications`
    Start,
    /// `stop_notifications`
    Stop,
    /// `read_value`
    Read,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct MockState {
    name: String,
    available: AtomicBool,
    failures: Mutex<HashMap<MockOperation, String>>,
    /// Simulated latency in milliseconds (0 = no delay).
    latency_ms: AtomicU64,
    connected: AtomicBool,
    notifying: AtomicBool,
    value: Mutex<Option<Bytes>>,
    value_observer: Mutex<Option<Observer>>,
    disconnect_observer: Mutex<Option<Observer>>,
    live_characteristics: AtomicUsize,
    discover_count: AtomicU32,
}

impl MockState {
    async fn simulate(&self, operation: MockOperation) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let failure = lock(&self.failures).get(&operation).cloned();
        match failure {
            Some(message) => Err(Error::Rejected(message)),
            None => Ok(()),
        }
    }

    fn fire_disconnect(&self) {
        let observer = lock(&self.disconnect_observer).clone();
        if let Some(observer) = observer {
            observer();
        }
    }
}

/// A mock Bluetooth capability.
///
/// Cloning is cheap; every clone and every device or characteristic it
/// hands out observes and mutates the same state.
#[derive(Clone)]
pub struct MockBluetooth {
    state: Arc<MockState>,
}

impl std::fmt::Debug for MockBluetooth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBluetooth")
            .field("name", &self.state.name)
            .field("available", &self.state.available.load(Ordering::Relaxed))
            .field("connected", &self.is_connected())
            .field("notifying", &self.is_notifying())
            .finish()
    }
}

impl Default for MockBluetooth {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBluetooth {
    /// Create an available mock with a random device name.
    pub fn new() -> Self {
        MockBluetoothBuilder::new().build()
    }

    /// Start building a mock.
    pub fn builder() -> MockBluetoothBuilder {
        MockBluetoothBuilder::new()
    }

    /// Name the mock device advertises.
    pub fn name(&self) -> &str {
        &self.state.name
    }

    // --- Test control methods ---

    /// Toggle whether the capability exists.
    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::Relaxed);
    }

    /// Make `operation` fail with `message` until [`succeed`](Self::succeed) is called.
    pub fn fail(&self, operation: MockOperation, message: &str) {
        lock(&self.state.failures).insert(operation, message.to_string());
    }

    /// Let `operation` succeed again.
    pub fn succeed(&self, operation: MockOperation) {
        lock(&self.state.failures).remove(&operation);
    }

    /// Set simulated latency for every capability call.
    ///
    /// Set to `Duration::ZERO` to disable latency simulation.
    pub fn set_latency(&self, latency: Duration) {
        self.state
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Store `frame` as the characteristic value and fire the value observer.
    ///
    /// Returns `true` if an observer was notified, which only happens while
    /// notifications are enabled.
    pub fn emit_frame(&self, frame: impl Into<Bytes>) -> bool {
        *lock(&self.state.value) = Some(frame.into());

        if !self.state.notifying.load(Ordering::Relaxed) {
            trace!("Frame stored without notifying");
            return false;
        }
        let observer = lock(&self.state.value_observer).clone();
        match observer {
            Some(observer) => {
                observer();
                true
            }
            None => false,
        }
    }

    /// Encode `sample` and emit it as a frame.
    pub fn emit_sample(&self, sample: &HeartRateSample) -> bool {
        self.emit_frame(encode(sample))
    }

    /// Simulate the sensor dropping the link.
    pub fn drop_link(&self) {
        self.state.connected.store(false, Ordering::Relaxed);
        self.state.notifying.store(false, Ordering::Relaxed);
        self.state.fire_disconnect();
    }

    // --- Inspection ---

    /// Whether the GATT link is up.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Relaxed)
    }

    /// Whether notifications are enabled.
    pub fn is_notifying(&self) -> bool {
        self.state.notifying.load(Ordering::Relaxed)
    }

    /// Number of characteristic handles currently alive.
    pub fn live_characteristics(&self) -> usize {
        self.state.live_characteristics.load(Ordering::Relaxed)
    }

    /// Number of `request_device` calls made.
    pub fn discover_count(&self) -> u32 {
        self.state.discover_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Bluetooth for MockBluetooth {
    type Device = MockDevice;

    async fn availability(&self) -> Result<()> {
        if self.state.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(Error::CapabilityUnavailable(
                "Bluetooth is not supported on this platform".to_string(),
            ))
        }
    }

    async fn request_device(&self, filter: &DeviceFilter) -> Result<MockDevice> {
        self.state.discover_count.fetch_add(1, Ordering::Relaxed);
        self.state.simulate(MockOperation::Discover).await?;

        if !filter.matches(&[HEART_RATE_SERVICE]) {
            return Err(Error::NoDeviceFound {
                duration: Duration::ZERO,
            });
        }
        Ok(MockDevice {
            state: Arc::clone(&self.state),
        })
    }
}

/// Device handle produced by [`MockBluetooth`].
pub struct MockDevice {
    state: Arc<MockState>,
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDevice")
            .field("name", &self.state.name)
            .field("connected", &self.state.connected.load(Ordering::Relaxed))
            .finish()
    }
}

#[async_trait]
impl SensorDevice for MockDevice {
    type Characteristic = MockCharacteristic;

    fn name(&self) -> Option<String> {
        Some(self.state.name.clone())
    }

    async fn on_disconnected(&self, observer: Observer) -> Result<()> {
        *lock(&self.state.disconnect_observer) = Some(observer);
        Ok(())
    }

    async fn connect_gatt(&self) -> Result<()> {
        self.state.simulate(MockOperation::Connect).await?;
        self.state.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn characteristic(&self, service: Uuid, characteristic: Uuid) -> Result<MockCharacteristic> {
        self.state.simulate(MockOperation::Resolve).await?;

        if !self.state.connected.load(Ordering::Relaxed) {
            return Err(Error::Rejected("GATT server is disconnected".to_string()));
        }
        if service != HEART_RATE_SERVICE {
            return Err(Error::service_not_found(service));
        }
        if characteristic != HEART_RATE_MEASUREMENT {
            return Err(Error::characteristic_not_found(characteristic));
        }

        self.state.live_characteristics.fetch_add(1, Ordering::Relaxed);
        Ok(MockCharacteristic {
            state: Arc::clone(&self.state),
        })
    }

    async fn disconnect(&self) -> Result<()> {
        let was_connected = self.state.connected.swap(false, Ordering::Relaxed);
        self.state.notifying.store(false, Ordering::Relaxed);
        // Like a real stack, a requested disconnect is also reported.
        if was_connected {
            self.state.fire_disconnect();
        }
        Ok(())
    }
}

/// Measurement characteristic handle produced by [`MockDevice`].
pub struct MockCharacteristic {
    state: Arc<MockState>,
}

impl std::fmt::Debug for MockCharacteristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCharacteristic")
            .field("notifying", &self.state.notifying.load(Ordering::Relaxed))
            .finish()
    }
}

impl Drop for MockCharacteristic {
    fn drop(&mut self) {
        self.state.live_characteristics.fetch_sub(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl MeasurementCharacteristic for MockCharacteristic {
    async fn on_value_changed(&self, observer: Observer) -> Result<()> {
        *lock(&self.state.value_observer) = Some(observer);
        Ok(())
    }

    async fn start_notifications(&self) -> Result<()> {
        self.state.simulate(MockOperation::Start).await?;
        if !self.state.connected.load(Ordering::Relaxed) {
            return Err(Error::Rejected("GATT server is disconnected".to_string()));
        }
        self.state.notifying.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn stop_notifications(&self) -> Result<()> {
        self.state.simulate(MockOperation::Stop).await?;
        self.state.notifying.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn read_value(&self) -> Result<Bytes> {
        self.state.simulate(MockOperation::Read).await?;
        lock(&self.state.value)
            .clone()
            .ok_or_else(|| Error::Rejected("No value has been notified".to_string()))
    }
}

/// Builder for creating mock Bluetooth backends with custom settings.
#[derive(Debug, Clone)]
pub struct MockBluetoothBuilder {
    name: String,
    available: bool,
    latency: Duration,
    failures: HashMap<MockOperation, String>,
    initial_value: Option<Bytes>,
}

impl Default for MockBluetoothBuilder {
    fn default() -> Self {
        Self {
            name: format!("Mock HRM {:04X}", rand::random::<u16>()),
            available: true,
            latency: Duration::ZERO,
            failures: HashMap::new(),
            initial_value: None,
        }
    }
}

impl MockBluetoothBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the advertised device name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set whether the capability exists.
    #[must_use]
    pub fn available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Set simulated latency for every capability call.
    #[must_use]
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make `operation` fail with `message`.
    #[must_use]
    pub fn fail(mut self, operation: MockOperation, message: &str) -> Self {
        self.failures.insert(operation, message.to_string());
        self
    }

    /// Set the characteristic value before any frame is emitted.
    #[must_use]
    pub fn value(mut self, value: impl Into<Bytes>) -> Self {
        self.initial_value = Some(value.into());
        self
    }

    /// Build the mock.
    pub fn build(self) -> MockBluetooth {
        MockBluetooth {
            state: Arc::new(MockState {
                name: self.name,
                available: AtomicBool::new(self.available),
                failures: Mutex::new(self.failures),
                latency_ms: AtomicU64::new(self.latency.as_millis() as u64),
                connected: AtomicBool::new(false),
                notifying: AtomicBool::new(false),
                value: Mutex::new(self.initial_value),
                value_observer: Mutex::new(None),
                disconnect_observer: Mutex::new(None),
                live_characteristics: AtomicUsize::new(0),
                discover_count: AtomicU32::new(0),
            }),
        }
    }
}

/// Unit tests for MockBluetooth and MockBluetoothBuilder.
#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Observer, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let observed = Arc::clone(&count);
        let observer: Observer = Arc::new(move || {
            observed.fetch_add(1, Ordering::Relaxed);
        });
        (observer, count)
    }

    async fn connected(bluetooth: &MockBluetooth) -> (MockDevice, MockCharacteristic) {
        let device = bluetooth
            .request_device(&DeviceFilter::heart_rate())
            .await
            .unwrap();
        device.connect_gatt().await.unwrap();
        let characteristic = device
            .characteristic(HEART_RATE_SERVICE, HEART_RATE_MEASUREMENT)
            .await
            .unwrap();
        (device, characteristic)
    }

    #[test]
    fn test_builder_defaults() {
        let bluetooth = MockBluetooth::new();
        assert!(bluetooth.name().starts_with("Mock HRM "));
        assert!(!bluetooth.is_connected());
        assert!(!bluetooth.is_notifying());
        assert_eq!(bluetooth.live_characteristics(), 0);
        assert_eq!(bluetooth.discover_count(), 0);
    }

    #[tokio::test]
    async fn test_availability() {
        let bluetooth = MockBluetooth::builder().available(false).build();
        let err = bluetooth.availability().await.unwrap_err();
        assert!(err.is_fatal());

        bluetooth.set_available(true);
        assert!(bluetooth.availability().await.is_ok());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let bluetooth = MockBluetooth::builder()
            .fail(MockOperation::Discover, "chooser cancelled")
            .build();
        let err = bluetooth
            .request_device(&DeviceFilter::heart_rate())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Rejected: chooser cancelled");
        assert_eq!(bluetooth.discover_count(), 1);

        bluetooth.succeed(MockOperation::Discover);
        assert!(bluetooth.request_device(&DeviceFilter::heart_rate()).await.is_ok());
    }

    #[tokio::test]
    async fn test_filter_without_heart_rate_finds_nothing() {
        let bluetooth = MockBluetooth::new();
        let filter = DeviceFilter {
            services: vec![hrmon_types::uuid::BATTERY_SERVICE, Uuid::nil()],
            optional_services: vec![],
        };
        let err = bluetooth.request_device(&filter).await.unwrap_err();
        assert!(matches!(err, Error::NoDeviceFound { .. }));
    }

    #[tokio::test]
    async fn test_resolve_checks_uuids() {
        let bluetooth = MockBluetooth::new();
        let device = bluetooth
            .request_device(&DeviceFilter::heart_rate())
            .await
            .unwrap();
        device.connect_gatt().await.unwrap();

        let err = device
            .characteristic(Uuid::nil(), HEART_RATE_MEASUREMENT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServiceNotFound { .. }));

        let err = device
            .characteristic(HEART_RATE_SERVICE, Uuid::nil())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CharacteristicNotFound { .. }));
        assert_eq!(bluetooth.live_characteristics(), 0);
    }

    #[tokio::test]
    async fn test_live_characteristics_tracks_drops() {
        let bluetooth = MockBluetooth::new();
        let (_device, characteristic) = connected(&bluetooth).await;
        assert_eq!(bluetooth.live_characteristics(), 1);

        drop(characteristic);
        assert_eq!(bluetooth.live_characteristics(), 0);
    }

    #[tokio::test]
    async fn test_emit_frame_only_notifies_while_started() {
        let bluetooth = MockBluetooth::new();
        let (_device, characteristic) = connected(&bluetooth).await;
        let (observer, count) = counter();
        characteristic.on_value_changed(observer).await.unwrap();

        assert!(!bluetooth.emit_frame(vec![0x00, 60]));
        assert_eq!(count.load(Ordering::Relaxed), 0);

        characteristic.start_notifications().await.unwrap();
        assert!(bluetooth.emit_sample(&HeartRateSample::new(61)));
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(characteristic.read_value().await.unwrap().as_ref(), &[0x00, 61]);
    }

    #[tokio::test]
    async fn test_read_without_value_fails() {
        let bluetooth = MockBluetooth::new();
        let (_device, characteristic) = connected(&bluetooth).await;
        assert!(characteristic.read_value().await.is_err());

        let bluetooth = MockBluetooth::builder().value(vec![0x00, 70]).build();
        let (_device, characteristic) = connected(&bluetooth).await;
        assert_eq!(characteristic.read_value().await.unwrap().as_ref(), &[0x00, 70]);
    }

    #[tokio::test]
    async fn test_drop_link_fires_observer() {
        let bluetooth = MockBluetooth::new();
        let (device, characteristic) = connected(&bluetooth).await;
        let (observer, count) = counter();
        device.on_disconnected(observer).await.unwrap();
        characteristic.start_notifications().await.unwrap();

        bluetooth.drop_link();

        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert!(!bluetooth.is_connected());
        assert!(!bluetooth.is_notifying());
        assert!(characteristic.start_notifications().await.is_err());
    }

    #[tokio::test]
    async fn test_requested_disconnect_reports_once() {
        let bluetooth = MockBluetooth::new();
        let (device, _characteristic) = connected(&bluetooth).await;
        let (observer, count) = counter();
        device.on_disconnected(observer).await.unwrap();

        device.disconnect().await.unwrap();
        device.disconnect().await.unwrap();

        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_simulation() {
        let bluetooth = MockBluetooth::builder()
            .latency(Duration::from_millis(250))
            .build();
        let start = tokio::time::Instant::now();
        bluetooth
            .request_device(&DeviceFilter::heart_rate())
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}
