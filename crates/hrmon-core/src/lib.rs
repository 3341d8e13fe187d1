//! Actor runtime and BLE plumbing for heart-rate sensors.
//!
//! This crate drives a Bluetooth Low Energy heart-rate sensor (chest strap,
//! watch in broadcast mode, ...) through its lifecycle: pair, connect, start
//! streaming, stop, and recover from dropped links.
//!
//! # Architecture
//!
//! Two actors, each consuming its own [`Mailbox`]:
//!
//! - [`ConnectionActor`] owns the device and characteristic handles and runs
//!   every Bluetooth call, one at a time.
//! - [`PresentationActor`] owns the button label, busy flag, latest
//!   [`HeartRateSample`] and failure log, and renders them through a
//!   [`View`].
//!
//! They talk only through [`Intent`]s and [`Notification`]s. [`Session`]
//! wires the two together.
//!
//! The Bluetooth stack sits behind the [`Bluetooth`] trait family:
//! [`BtleplugBluetooth`] for real hardware, [`mock::MockBluetooth`] for tests
//! and demos.
//!
//! # Quick Start
//!
//! ```no_run
//! use hrmon_core::{ActorConfig, BtleplugBluetooth, Session};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (view, mut states) = mpsc::unbounded_channel();
//!     let session = Session::spawn(BtleplugBluetooth::new(), view, ActorConfig::default())?;
//!
//!     session.press(); // Pair
//!     while let Some(state) = states.recv().await {
//!         println!("[{}] {:?}", state.label, state.latest);
//!     }
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod ble;
pub mod connection;
pub mod error;
pub mod mailbox;
pub mod messages;
pub mod mock;
pub mod presentation;
pub mod scan;
pub mod session;
pub mod traits;

// Core exports
pub use ble::{BtleplugBluetooth, BtleplugCharacteristic, BtleplugDevice};
pub use connection::{ActorConfig, ConnectionActor, ConnectionState};
pub use error::{Error, Result};
pub use mailbox::{Mailbox, MailboxSender, mailbox, mailbox_with_token};
pub use messages::{ConnectionMessage, Intent, Notification, PresentationMessage};
pub use mock::{MockBluetooth, MockBluetoothBuilder, MockOperation};
pub use presentation::{
    ActionLabel, FailureEntry, FailureKind, PresentationActor, PresentationState, View,
};
pub use scan::{DiscoveredSensor, ScanOptions};
pub use session::Session;
pub use traits::{Bluetooth, DeviceFilter, MeasurementCharacteristic, Observer, SensorDevice};

// Re-export from hrmon-types
pub use hrmon_types::uuid as uuids;
pub use hrmon_types::{DecodeError, HeartRateSample, decode, encode};
