//! Platform-agnostic types for BLE heart-rate sensors.
//!
//! This crate holds everything about heart-rate data that does not touch
//! a Bluetooth stack, so it can be shared by the actor runtime in
//! hrmon-core and by any other front end.
//!
//! # Features
//!
//! - [`HeartRateSample`], the decoded measurement
//! - [`frame::decode`] / [`frame::encode`] for the Heart Rate Measurement
//!   characteristic value
//! - UUID constants for the services and characteristic involved
//! - [`DecodeError`] for frame parsing
//!
//! # Example
//!
//! ```
//! use hrmon_types::HeartRateSample;
//!
//! let sample = HeartRateSample::from_bytes(&[0x10, 64, 0x00, 0x04]).unwrap();
//! assert_eq!(sample.bpm, 64);
//! assert_eq!(sample.rr_intervals, vec![1.0]);
//! ```

pub mod error;
pub mod frame;
pub mod types;
pub mod uuid;

pub use error::{DecodeError, DecodeResult};
pub use frame::{decode, encode};
pub use types::HeartRateSample;
pub use uuid as uuids;
