//! Bluetooth backend built on btleplug.
//!
//! [`BtleplugBluetooth`] implements the capability traits on top of the
//! platform BLE stack. Observers are driven by background tasks reading
//! btleplug's event and notification streams; those tasks are aborted when
//! the handle that spawned them is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, CharPropFlags, Characteristic, Peripheral as _};
use btleplug::platform::{Adapter, Peripheral};
use bytes::Bytes;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::scan::{ScanOptions, create_identifier, find_sensor, format_peripheral_id, get_adapter};
use crate::traits::{Bluetooth, DeviceFilter, MeasurementCharacteristic, Observer, SensorDevice};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Replace the task stored in `slot`, aborting the previous one.
fn replace_task(slot: &Mutex<Option<JoinHandle<()>>>, task: JoinHandle<()>) {
    if let Some(previous) = lock(slot).replace(task) {
        previous.abort();
    }
}

fn abort_task(slot: &Mutex<Option<JoinHandle<()>>>) {
    if let Some(task) = lock(slot).take() {
        task.abort();
    }
}

/// The platform Bluetooth capability.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use hrmon_core::{Bluetooth, BtleplugBluetooth, DeviceFilter, SensorDevice};
///
/// # async fn example() -> hrmon_core::Result<()> {
/// use hrmon_core::ScanOptions;
///
/// let options = ScanOptions::new().duration(Duration::from_secs(10));
/// let bluetooth = BtleplugBluetooth::with_options(options);
/// bluetooth.availability().await?;
/// let sensor = bluetooth.request_device(&DeviceFilter::heart_rate()).await?;
/// println!("Found {:?}", sensor.name());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct BtleplugBluetooth {
    options: ScanOptions,
}

impl BtleplugBluetooth {
    /// Create a backend with default scan options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend with custom scan options.
    pub fn with_options(options: ScanOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Bluetooth for BtleplugBluetooth {
    type Device = BtleplugDevice;

    async fn availability(&self) -> Result<()> {
        get_adapter().await.map(|_| ())
    }

    #[tracing::instrument(level = "info", skip_all, fields(scan = ?self.options.duration))]
    async fn request_device(&self, filter: &DeviceFilter) -> Result<BtleplugDevice> {
        let adapter = get_adapter().await?;
        let peripheral = find_sensor(&adapter, filter, &self.options).await?;
        BtleplugDevice::new(adapter, peripheral).await
    }
}

/// A discovered heart-rate sensor.
pub struct BtleplugDevice {
    /// Kept alive for the lifetime of the peripheral and used for events.
    adapter: Adapter,
    peripheral: Peripheral,
    name: Option<String>,
    /// MAC address on Linux/Windows, peripheral UUID on macOS.
    identifier: String,
    /// Task watching adapter events for our disconnect.
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for BtleplugDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleplugDevice")
            .field("name", &self.name)
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

impl BtleplugDevice {
    async fn new(adapter: Adapter, peripheral: Peripheral) -> Result<Self> {
        let properties = peripheral.properties().await?;
        let name = properties.as_ref().and_then(|p| p.local_name.clone());
        let identifier = properties
            .as_ref()
            .map(|p| create_identifier(&p.address.to_string(), &peripheral.id()))
            .unwrap_or_else(|| format_peripheral_id(&peripheral.id()));

        Ok(Self {
            adapter,
            peripheral,
            name,
            identifier,
            watcher: Mutex::new(None),
        })
    }

    /// Platform identifier of the sensor.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

#[async_trait]
impl SensorDevice for BtleplugDevice {
    type Characteristic = BtleplugCharacteristic;

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    async fn on_disconnected(&self, observer: Observer) -> Result<()> {
        let mut events = self.adapter.events().await?;
        let id = self.peripheral.id();

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(disconnected) = event {
                    if disconnected == id {
                        debug!("Peripheral reported disconnect");
                        observer();
                    }
                }
            }
        });
        replace_task(&self.watcher, task);
        Ok(())
    }

    #[tracing::instrument(level = "info", skip(self), fields(device = %self.identifier))]
    async fn connect_gatt(&self) -> Result<()> {
        if !self.peripheral.is_connected().await? {
            info!("Connecting to device...");
            self.peripheral.connect().await?;
        }

        info!("Discovering services...");
        self.peripheral.discover_services().await?;
        for service in self.peripheral.services() {
            debug!("  Service: {}", service.uuid);
        }
        Ok(())
    }

    async fn characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<BtleplugCharacteristic> {
        let services = self.peripheral.services();
        let found = services
            .iter()
            .find(|s| s.uuid == service)
            .ok_or_else(|| Error::service_not_found(service))?;
        let resolved = found
            .characteristics
            .iter()
            .find(|c| c.uuid == characteristic)
            .cloned()
            .ok_or_else(|| Error::characteristic_not_found(characteristic))?;

        if !resolved.properties.contains(CharPropFlags::NOTIFY) {
            warn!(uuid = %characteristic, "Characteristic does not advertise notifications");
        }

        Ok(BtleplugCharacteristic {
            peripheral: self.peripheral.clone(),
            characteristic: resolved,
            latest: Arc::new(Mutex::new(None)),
            listener: Mutex::new(None),
        })
    }

    #[tracing::instrument(level = "info", skip(self), fields(device = %self.identifier))]
    async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from device...");
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

impl Drop for BtleplugDevice {
    fn drop(&mut self) {
        abort_task(&self.watcher);
    }
}

/// The heart-rate measurement characteristic on a connected sensor.
pub struct BtleplugCharacteristic {
    peripheral: Peripheral,
    characteristic: Characteristic,
    /// Most recent notified value.
    latest: Arc<Mutex<Option<Bytes>>>,
    /// Task reading the peripheral's notification stream.
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for BtleplugCharacteristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleplugCharacteristic")
            .field("uuid", &self.characteristic.uuid)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MeasurementCharacteristic for BtleplugCharacteristic {
    async fn on_value_changed(&self, observer: Observer) -> Result<()> {
        let mut stream = self.peripheral.notifications().await?;
        let uuid = self.characteristic.uuid;
        let latest = Arc::clone(&self.latest);

        let task = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid == uuid {
                    *lock(&latest) = Some(Bytes::from(notification.value));
                    observer();
                }
            }
        });
        replace_task(&self.listener, task);
        Ok(())
    }

    async fn start_notifications(&self) -> Result<()> {
        self.peripheral.subscribe(&self.characteristic).await?;
        Ok(())
    }

    async fn stop_notifications(&self) -> Result<()> {
        self.peripheral.unsubscribe(&self.characteristic).await?;
        Ok(())
    }

    async fn read_value(&self) -> Result<Bytes> {
        let cached = lock(&self.latest).clone();
        match cached {
            Some(value) => Ok(value),
            None => Ok(Bytes::from(self.peripheral.read(&self.characteristic).await?)),
        }
    }
}

impl Drop for BtleplugCharacteristic {
    fn drop(&mut self) {
        abort_task(&self.listener);
    }
}
