//! Message types exchanged between the two actors.
//!
//! # Architecture
//!
//! ```text
//! +--------------------+  ConnectionMessage  +--------------------+
//! | PresentationActor  | ------------------> |  ConnectionActor   |
//! |  (label, sample,   |                     | (device handles,   |
//! |   failure log)     | <------------------ |  capability calls) |
//! +--------------------+ PresentationMessage +--------------------+
//!          ^                                     |      ^
//!          | Press / Submit                      v      | observers
//!       UI layer                          Bluetooth capability
//! ```
//!
//! - [`Intent`]: a request flowing toward the connection actor
//! - [`Notification`]: a status or result flowing back
//! - [`ConnectionMessage`] / [`PresentationMessage`]: what each mailbox holds

use std::fmt;

use hrmon_types::HeartRateSample;

/// A request for the connection actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Discover and pair with a heart-rate sensor.
    Pair,
    /// Open a GATT connection and resolve the measurement characteristic.
    Connect,
    /// Enable measurement notifications.
    Start,
    /// Disable measurement notifications.
    Stop,
    /// The link dropped, or should be dropped.
    Disconnect,
}

impl Intent {
    /// Verb used in logs and error messages.
    pub fn verb(self) -> &'static str {
        match self {
            Intent::Pair => "pair",
            Intent::Connect => "connect",
            Intent::Start => "start",
            Intent::Stop => "stop",
            Intent::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Intent::Pair => "Pair",
            Intent::Connect => "Connect",
            Intent::Start => "Start",
            Intent::Stop => "Stop",
            Intent::Disconnect => "Disconnect",
        };
        f.write_str(name)
    }
}

/// A status or result emitted by the connection actor.
///
/// Failure variants carry a human-readable cause.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The Bluetooth capability is present; the actor is idle.
    Initialized,
    /// The Bluetooth capability is missing; the actor has stopped.
    InitFailed(String),
    /// A sensor was paired.
    Paired(String),
    /// Pairing failed.
    PairFailed(String),
    /// The measurement characteristic is ready.
    Connected,
    /// Connecting failed.
    ConnectFailed(String),
    /// Notifications are enabled.
    Started,
    /// Enabling notifications failed.
    StartFailed(String),
    /// Notifications are disabled.
    Stopped,
    /// Disabling notifications failed.
    StopFailed(String),
    /// The link to the sensor is gone.
    Disconnected,
    /// A decoded measurement.
    Sample(HeartRateSample),
    /// A measurement could not be read or decoded.
    DecodeFailed(String),
}

/// What the connection actor's mailbox holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMessage {
    /// A request from the presentation actor or a capability observer.
    Intent(Intent),
    /// The measurement characteristic has a new value.
    RateChanged,
}

impl From<Intent> for ConnectionMessage {
    fn from(intent: Intent) -> Self {
        ConnectionMessage::Intent(intent)
    }
}

/// What the presentation actor's mailbox holds.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationMessage {
    /// Status from the connection actor.
    Notification(Notification),
    /// A request from the UI layer, forwarded to the connection actor.
    Submit(Intent),
    /// A click on the action control; resolves to the intent it is labelled with.
    Press,
}

impl From<Notification> for PresentationMessage {
    fn from(notification: Notification) -> Self {
        PresentationMessage::Notification(notification)
    }
}

impl From<Intent> for PresentationMessage {
    fn from(intent: Intent) -> Self {
        PresentationMessage::Submit(intent)
    }
}
