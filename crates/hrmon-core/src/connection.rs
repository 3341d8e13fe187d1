//! The connection actor.
//!
//! [`ConnectionActor`] owns the paired device and the measurement
//! characteristic and runs the pair → connect → start → stop protocol
//! against a [`Bluetooth`] capability. It consumes [`ConnectionMessage`]s
//! from its own mailbox one at a time and reports every outcome as a
//! [`Notification`] into the presentation mailbox.
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──► Idle ──Pair──► Paired ──Connect──► Connected ──Start──► Started
//!       │            ▲                ▲                  ▲   ▲                │
//!       ▼            │                │                  │   └─────Stop───────┘
//!  Unavailable       │           Connect (retry)         │
//!                    │                │                  │
//!                    └──Pair── Disconnected ◄──link drop─┴──── (any connected state)
//! ```
//!
//! A failed operation leaves the actor in the state it started from. Only a
//! missing Bluetooth capability is terminal.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use hrmon_types::uuid::{HEART_RATE_MEASUREMENT, HEART_RATE_SERVICE};
use hrmon_types::{HeartRateSample, decode};

use crate::error::{Error, Result};
use crate::mailbox::{Mailbox, MailboxSender};
use crate::messages::{ConnectionMessage, Intent, Notification, PresentationMessage};
use crate::traits::{Bluetooth, DeviceFilter, MeasurementCharacteristic, Observer, SensorDevice};

/// Name reported for devices that do not advertise one.
pub const UNKNOWN_DEVICE: &str = "Unknown device";

/// Default bound on device discovery (includes the user picking a device).
const DEFAULT_PAIR_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on opening the GATT connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default bound on every other capability call.
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeouts applied to capability calls made by the actor.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use hrmon_core::ActorConfig;
///
/// let config = ActorConfig::default()
///     .pair_timeout(Duration::from_secs(60))
///     .operation_timeout(Duration::from_secs(5));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorConfig {
    /// Timeout for device discovery.
    pub pair_timeout: Duration,
    /// Timeout for opening the GATT connection.
    pub connect_timeout: Duration,
    /// Timeout for service resolution, notification toggles and reads.
    pub operation_timeout: Duration,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            pair_timeout: DEFAULT_PAIR_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl ActorConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the discovery timeout.
    #[must_use]
    pub fn pair_timeout(mut self, timeout: Duration) -> Self {
        self.pair_timeout = timeout;
        self
    }

    /// Set the GATT connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the timeout for all other operations.
    #[must_use]
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Validate the config and return an error if any timeout is zero.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("pair_timeout", self.pair_timeout),
            ("connect_timeout", self.connect_timeout),
            ("operation_timeout", self.operation_timeout),
        ];
        for (name, value) in fields {
            if value.is_zero() {
                return Err(Error::invalid_config(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }
}

/// Where the connection actor is in the device lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Capability not yet checked.
    Uninitialized,
    /// Capability missing; no intents are processed.
    Unavailable,
    /// Ready to pair.
    Idle,
    /// Discovery in flight.
    Pairing,
    /// Device held, no GATT connection.
    Paired,
    /// GATT connection in flight.
    Connecting,
    /// Measurement characteristic resolved, notifications off.
    Connected,
    /// Enabling notifications.
    Starting,
    /// Notifications on; samples flowing.
    Started,
    /// Disabling notifications.
    Stopping,
    /// Link dropped; device still held for reconnect.
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Unavailable => "unavailable",
            ConnectionState::Idle => "idle",
            ConnectionState::Pairing => "pairing",
            ConnectionState::Paired => "paired",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Starting => "starting",
            ConnectionState::Started => "started",
            ConnectionState::Stopping => "stopping",
            ConnectionState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

type CharacteristicOf<B> = <<B as Bluetooth>::Device as SensorDevice>::Characteristic;

/// Actor that owns the sensor and runs the connection protocol.
///
/// The device and characteristic handles are private to the actor; nothing
/// else can reach them. Each message is handled to completion before the
/// next one is taken from the mailbox.
pub struct ConnectionActor<B: Bluetooth> {
    bluetooth: B,
    /// Intents and observer signals, in arrival order.
    mailbox: Mailbox<ConnectionMessage>,
    /// Producer for our own mailbox, handed to capability observers.
    inbox: MailboxSender<ConnectionMessage>,
    /// Where notifications go.
    presentation: MailboxSender<PresentationMessage>,
    config: ActorConfig,
    state: ConnectionState,
    /// Valid from a successful pair; kept across disconnects.
    device: Option<B::Device>,
    /// Valid from a successful connect until the link drops.
    characteristic: Option<CharacteristicOf<B>>,
}

impl<B: Bluetooth> fmt::Debug for ConnectionActor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionActor")
            .field("state", &self.state)
            .field("paired", &self.device.is_some())
            .field("characteristic", &self.characteristic.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<B: Bluetooth> ConnectionActor<B> {
    /// Create an actor consuming `mailbox` and reporting to `presentation`.
    pub fn new(
        bluetooth: B,
        mailbox: Mailbox<ConnectionMessage>,
        presentation: MailboxSender<PresentationMessage>,
        config: ActorConfig,
    ) -> Self {
        let inbox = mailbox.sender();
        Self {
            bluetooth,
            mailbox,
            inbox,
            presentation,
            config,
            state: ConnectionState::Uninitialized,
            device: None,
            characteristic: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a device handle is held.
    pub fn is_paired(&self) -> bool {
        self.device.is_some()
    }

    /// Whether a measurement characteristic handle is held.
    pub fn has_characteristic(&self) -> bool {
        self.characteristic.is_some()
    }

    /// Run the actor until its mailbox is closed.
    ///
    /// Returns immediately after emitting `InitFailed` if the Bluetooth
    /// capability is missing.
    pub async fn run(mut self) {
        info!("ConnectionActor started");

        if self.initialize().await {
            while let Some(message) = self.mailbox.pop().await {
                self.handle(message).await;
            }
            debug!("Connection mailbox closed");
        }

        info!(state = %self.state, "ConnectionActor stopped");
    }

    /// Check the capability and announce the result.
    ///
    /// Returns `false` if the actor must not process any intents.
    pub async fn initialize(&mut self) -> bool {
        let check = with_timeout(
            "check Bluetooth availability",
            self.config.operation_timeout,
            self.bluetooth.availability(),
        )
        .await;

        match check {
            Ok(()) => {
                self.state = ConnectionState::Idle;
                info!("Bluetooth available");
                self.emit(Notification::Initialized);
                true
            }
            Err(e) => {
                if e.is_fatal() {
                    error!(error = %e, "Bluetooth capability unavailable");
                } else {
                    warn!(error = %e, "Bluetooth availability check failed");
                }
                self.state = ConnectionState::Unavailable;
                self.emit(Notification::InitFailed(e.to_string()));
                false
            }
        }
    }

    /// Handle a single message to completion.
    pub async fn handle(&mut self, message: ConnectionMessage) {
        debug!(?message, state = %self.state, "Handling message");

        match message {
            ConnectionMessage::Intent(Intent::Pair) => self.pair().await,
            ConnectionMessage::Intent(Intent::Connect) => self.connect().await,
            ConnectionMessage::Intent(Intent::Start) => self.start().await,
            ConnectionMessage::Intent(Intent::Stop) => self.stop().await,
            ConnectionMessage::Intent(Intent::Disconnect) => self.disconnect().await,
            ConnectionMessage::RateChanged => self.rate_changed().await,
        }
    }

    #[tracing::instrument(level = "info", skip(self), fields(state = %self.state))]
    async fn pair(&mut self) {
        let prior = self.state;
        if !matches!(prior, ConnectionState::Idle | ConnectionState::Disconnected) {
            return self.reject(Intent::Pair, Notification::PairFailed);
        }

        self.state = ConnectionState::Pairing;
        match self.request_device().await {
            Ok(device) => {
                let name = device.name().unwrap_or_else(|| UNKNOWN_DEVICE.to_string());
                // A re-pair replaces the old device and anything resolved on it.
                self.characteristic = None;
                self.device = Some(device);
                self.state = ConnectionState::Paired;
                info!(device = %name, "Paired");
                self.emit(Notification::Paired(name));
            }
            Err(e) => {
                self.state = prior;
                self.fail(Intent::Pair, e, Notification::PairFailed);
            }
        }
    }

    async fn request_device(&self) -> Result<B::Device> {
        let filter = DeviceFilter::heart_rate();
        let device = with_timeout(
            "pair",
            self.config.pair_timeout,
            self.bluetooth.request_device(&filter),
        )
        .await?;

        let inbox = self.inbox.clone();
        let on_disconnect: Observer = Arc::new(move || {
            inbox.push(ConnectionMessage::Intent(Intent::Disconnect));
        });
        with_timeout(
            "watch for disconnect",
            self.config.operation_timeout,
            device.on_disconnected(on_disconnect),
        )
        .await?;

        Ok(device)
    }

    #[tracing::instrument(level = "info", skip(self), fields(state = %self.state))]
    async fn connect(&mut self) {
        let prior = self.state;
        if !matches!(prior, ConnectionState::Paired | ConnectionState::Disconnected) {
            return self.reject(Intent::Connect, Notification::ConnectFailed);
        }
        let Some(device) = self.device.as_ref() else {
            return self.reject(Intent::Connect, Notification::ConnectFailed);
        };

        self.state = ConnectionState::Connecting;
        let result = open_measurement(device, self.inbox.clone(), &self.config).await;
        match result {
            Ok(characteristic) => {
                self.characteristic = Some(characteristic);
                self.state = ConnectionState::Connected;
                info!("Connected");
                self.emit(Notification::Connected);
            }
            Err(e) => {
                self.state = prior;
                self.fail(Intent::Connect, e, Notification::ConnectFailed);
            }
        }
    }

    #[tracing::instrument(level = "info", skip(self), fields(state = %self.state))]
    async fn start(&mut self) {
        let prior = self.state;
        if prior != ConnectionState::Connected {
            return self.reject(Intent::Start, Notification::StartFailed);
        }
        let Some(characteristic) = self.characteristic.as_ref() else {
            return self.reject(Intent::Start, Notification::StartFailed);
        };

        self.state = ConnectionState::Starting;
        let result = with_timeout(
            "start notifications",
            self.config.operation_timeout,
            characteristic.start_notifications(),
        )
        .await;
        match result {
            Ok(()) => {
                self.state = ConnectionState::Started;
                info!("Notifications started");
                self.emit(Notification::Started);
            }
            Err(e) => {
                self.state = prior;
                self.fail(Intent::Start, e, Notification::StartFailed);
            }
        }
    }

    #[tracing::instrument(level = "info", skip(self), fields(state = %self.state))]
    async fn stop(&mut self) {
        let prior = self.state;
        if prior != ConnectionState::Started {
            return self.reject(Intent::Stop, Notification::StopFailed);
        }
        let Some(characteristic) = self.characteristic.as_ref() else {
            return self.reject(Intent::Stop, Notification::StopFailed);
        };

        self.state = ConnectionState::Stopping;
        let result = with_timeout(
            "stop notifications",
            self.config.operation_timeout,
            characteristic.stop_notifications(),
        )
        .await;
        match result {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                info!("Notifications stopped");
                self.emit(Notification::Stopped);
            }
            Err(e) => {
                self.state = prior;
                self.fail(Intent::Stop, e, Notification::StopFailed);
            }
        }
    }

    async fn rate_changed(&mut self) {
        if self.state != ConnectionState::Started {
            debug!(state = %self.state, "Ignoring value change outside of streaming");
            return;
        }
        let Some(characteristic) = self.characteristic.as_ref() else {
            debug!("Ignoring value change without a characteristic");
            return;
        };

        match read_sample(characteristic, self.config.operation_timeout).await {
            Ok(sample) => {
                debug!(bpm = sample.bpm, rr = sample.rr_intervals.len(), "Sample");
                self.emit(Notification::Sample(sample));
            }
            Err(e) => {
                warn!(error = %e, "Failed to read measurement");
                self.emit(Notification::DecodeFailed(e.to_string()));
            }
        }
    }

    #[tracing::instrument(level = "info", skip(self), fields(state = %self.state))]
    async fn disconnect(&mut self) {
        let Some(device) = self.device.as_ref() else {
            debug!("Ignoring disconnect without a paired device");
            return;
        };
        // Duplicate drops, and the echo of a link closed by a failed
        // connect, arrive while no link is open.
        if !matches!(self.state, ConnectionState::Connected | ConnectionState::Started) {
            debug!(state = %self.state, "Ignoring disconnect without an open link");
            return;
        }

        // A no-op for a link the device side already dropped.
        let result = with_timeout(
            "disconnect",
            self.config.operation_timeout,
            device.disconnect(),
        )
        .await;
        if let Err(e) = result {
            debug!(error = %e, "Disconnect request failed");
        }

        self.characteristic = None;
        self.state = ConnectionState::Disconnected;
        info!("Disconnected");
        self.emit(Notification::Disconnected);
    }

    fn reject(&self, intent: Intent, failed: fn(String) -> Notification) {
        let error = Error::InvalidState {
            operation: intent.verb(),
            state: self.state,
        };
        self.fail(intent, error, failed);
    }

    fn fail(&self, intent: Intent, error: Error, failed: fn(String) -> Notification) {
        warn!(%intent, error = %error, "Operation failed");
        self.emit(failed(error.to_string()));
    }

    fn emit(&self, notification: Notification) {
        if !self.presentation.push(notification.into()) {
            debug!("Presentation mailbox closed, dropping notification");
        }
    }
}

/// Open GATT, resolve the measurement characteristic and hook its observer.
async fn open_measurement<D: SensorDevice>(
    device: &D,
    inbox: MailboxSender<ConnectionMessage>,
    config: &ActorConfig,
) -> Result<D::Characteristic> {
    with_timeout("connect", config.connect_timeout, device.connect_gatt()).await?;

    match resolve_measurement(device, inbox, config).await {
        Ok(characteristic) => Ok(characteristic),
        Err(e) => {
            // Do not leave the link open without a characteristic to use it.
            let closed = with_timeout(
                "disconnect",
                config.operation_timeout,
                device.disconnect(),
            )
            .await;
            if let Err(teardown) = closed {
                debug!(error = %teardown, "Failed to close link after connect failure");
            }
            Err(e)
        }
    }
}

async fn resolve_measurement<D: SensorDevice>(
    device: &D,
    inbox: MailboxSender<ConnectionMessage>,
    config: &ActorConfig,
) -> Result<D::Characteristic> {
    let characteristic = with_timeout(
        "resolve measurement characteristic",
        config.operation_timeout,
        device.characteristic(HEART_RATE_SERVICE, HEART_RATE_MEASUREMENT),
    )
    .await?;

    let on_change: Observer = Arc::new(move || {
        inbox.push(ConnectionMessage::RateChanged);
    });
    with_timeout(
        "watch measurement",
        config.operation_timeout,
        characteristic.on_value_changed(on_change),
    )
    .await?;

    Ok(characteristic)
}

async fn read_sample<C: MeasurementCharacteristic>(
    characteristic: &C,
    limit: Duration,
) -> Result<HeartRateSample> {
    let raw = with_timeout("read measurement", limit, characteristic.read_value()).await?;
    Ok(decode(&raw)?)
}

/// Bound a capability call so a hung backend cannot stall the actor.
async fn with_timeout<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    timeout(limit, call)
        .await
        .map_err(|_| Error::timeout(operation, limit))?
}
