//! Device discovery and scanning.
//!
//! This module finds heart-rate sensors using Bluetooth Low Energy. The
//! scan is filtered by advertised service so that only sensors exposing
//! the Heart Rate service are considered.

use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::traits::DeviceFilter;

/// Default time to wait for a matching sensor to advertise.
const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(20);

/// Default interval between checks of the discovered peripherals.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Information about a discovered sensor.
#[derive(Debug, Clone)]
pub struct DiscoveredSensor {
    /// The advertised name (e.g., "Polar H10 1A2B3C4D").
    pub name: Option<String>,
    /// A connection identifier (peripheral ID on macOS, address on other platforms).
    pub identifier: String,
    /// RSSI signal strength.
    pub rssi: Option<i16>,
    /// Advertised service UUIDs.
    pub services: Vec<Uuid>,
}

/// Options for scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// How long to wait for a matching sensor.
    pub duration: Duration,
    /// How often to check the adapter's discovered peripherals.
    pub poll_interval: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: DEFAULT_SCAN_DURATION,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ScanOptions {
    /// Create new scan options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan duration.
    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Get the first available Bluetooth adapter.
///
/// Any failure here means the platform has no usable Bluetooth capability.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new()
        .await
        .map_err(|e| Error::CapabilityUnavailable(e.to_string()))?;
    let adapters = manager
        .adapters()
        .await
        .map_err(|e| Error::CapabilityUnavailable(e.to_string()))?;

    adapters
        .into_iter()
        .next()
        .ok_or_else(|| Error::CapabilityUnavailable("No Bluetooth adapter found".to_string()))
}

/// Scan until a peripheral passing `filter` shows up.
///
/// The scan is stopped before returning, whether or not a sensor was found.
/// If the returned future is dropped early, the scan is stopped in the
/// background.
pub async fn find_sensor(
    adapter: &Adapter,
    filter: &DeviceFilter,
    options: &ScanOptions,
) -> Result<Peripheral> {
    info!(
        "Scanning for heart-rate sensors for up to {} seconds...",
        options.duration.as_secs()
    );

    adapter
        .start_scan(ScanFilter {
            services: filter.services.clone(),
        })
        .await?;
    let scan = ScanGuard::new(adapter);

    let found = poll_for_sensor(adapter, filter, options).await;

    scan.stop().await;
    found
}

/// Stops a running scan, on request or when dropped.
struct ScanGuard {
    adapter: Option<Adapter>,
}

impl ScanGuard {
    fn new(adapter: &Adapter) -> Self {
        Self {
            adapter: Some(adapter.clone()),
        }
    }

    async fn stop(mut self) {
        if let Some(adapter) = self.adapter.take() {
            stop_scan(adapter).await;
        }
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        let Some(adapter) = self.adapter.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Discovery cancelled, stopping scan");
                handle.spawn(stop_scan(adapter));
            }
            Err(_) => debug!("No runtime left to stop the scan on"),
        }
    }
}

async fn stop_scan(adapter: Adapter) {
    if let Err(e) = adapter.stop_scan().await {
        debug!("Failed to stop scan: {}", e);
    }
}

async fn poll_for_sensor(
    adapter: &Adapter,
    filter: &DeviceFilter,
    options: &ScanOptions,
) -> Result<Peripheral> {
    let deadline = Instant::now() + options.duration;

    loop {
        for peripheral in adapter.peripherals().await? {
            match describe_peripheral(&peripheral).await {
                Ok(Some(sensor)) if filter.matches(&sensor.services) => {
                    info!(
                        name = ?sensor.name,
                        identifier = %sensor.identifier,
                        rssi = ?sensor.rssi,
                        "Found heart-rate sensor"
                    );
                    return Ok(peripheral);
                }
                Ok(_) => {}
                Err(e) => debug!("Error processing peripheral: {}", e),
            }
        }

        if Instant::now() >= deadline {
            return Err(Error::NoDeviceFound {
                duration: options.duration,
            });
        }
        sleep(options.poll_interval).await;
    }
}

/// Read the advertisement details of a peripheral.
pub async fn describe_peripheral(peripheral: &Peripheral) -> Result<Option<DiscoveredSensor>> {
    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };

    let address = properties.address.to_string();
    Ok(Some(DiscoveredSensor {
        name: properties.local_name,
        identifier: create_identifier(&address, &peripheral.id()),
        rssi: properties.rssi,
        services: properties.services,
    }))
}

/// Format a peripheral ID as a string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms, they may be
/// MAC addresses or other formats.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    strip_debug_wrapper(&format!("{:?}", id)).to_string()
}

fn strip_debug_wrapper(debug: &str) -> &str {
    debug
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
}

/// Pick the identifier to show for a peripheral.
///
/// On macOS the address is all zeros, so the peripheral ID is used instead.
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if is_zero_address(address) {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}

fn is_zero_address(address: &str) -> bool {
    address == "00:00:00:00:00:00"
}
