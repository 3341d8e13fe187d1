//! Error types for hrmon-core.
//!
//! Every capability call made by the connection actor returns
//! [`Result`]. The actor never lets an [`Error`] escape; it renders the
//! error into the cause string of the matching failure notification.
//!
//! | Error | Raised by | Surfaces as |
//! |-------|-----------|-------------|
//! | [`Error::CapabilityUnavailable`] | startup check | `InitFailed` (fatal) |
//! | [`Error::NoDeviceFound`] | discovery | `PairFailed` |
//! | [`Error::ServiceNotFound`], [`Error::CharacteristicNotFound`] | GATT resolution | `ConnectFailed` |
//! | [`Error::InvalidState`] | intent arriving in the wrong state | matching `*Failed` |
//! | [`Error::Timeout`] | any bounded capability call | matching `*Failed` |
//! | [`Error::Decode`] | frame decoding | `DecodeFailed` |
//! | [`Error::Bluetooth`], [`Error::Rejected`] | backend | matching `*Failed` |

use std::time::Duration;

use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors that can occur when driving a heart-rate sensor.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// The platform has no usable Bluetooth capability.
    #[error("Bluetooth unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Discovery finished without a matching device.
    #[error("No heart-rate sensor found after {duration:?}")]
    NoDeviceFound {
        /// How long discovery ran.
        duration: Duration,
    },

    /// Required GATT service not present on the device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The service UUID that was not found.
        uuid: String,
    },

    /// Required GATT characteristic not present on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The characteristic UUID that was not found.
        uuid: String,
    },

    /// An intent arrived in a state where it cannot be honored.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The actor state at the time.
        state: ConnectionState,
    },

    /// The capability rejected the request.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Frame decoding failed.
    #[error(transparent)]
    Decode(#[from] hrmon_types::DecodeError),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a service not found error.
    pub fn service_not_found(uuid: impl ToString) -> Self {
        Self::ServiceNotFound {
            uuid: uuid.to_string(),
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl ToString) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether this error means the actor can never start.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CapabilityUnavailable(_))
    }
}

/// Result type alias using hrmon-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use hrmon_types::DecodeError;

    #[test]
    fn test_error_display() {
        let err = Error::CapabilityUnavailable("no adapter".to_string());
        assert_eq!(err.to_string(), "Bluetooth unavailable: no adapter");

        let err = Error::timeout("connect", Duration::from_secs(15));
        assert!(err.to_string().contains("connect"));
        assert!(err.to_string().contains("15s"));

        let err = Error::characteristic_not_found("0x2A37");
        assert_eq!(err.to_string(), "Characteristic not found: 0x2A37");

        let err = Error::InvalidState {
            operation: "start",
            state: ConnectionState::Idle,
        };
        assert_eq!(err.to_string(), "Cannot start while idle");
    }

    #[test]
    fn test_decode_error_conversion() {
        let err: Error = DecodeError::truncated(2, 2, 2).into();
        assert!(matches!(err, Error::Decode(_)));
        assert!(err.to_string().starts_with("Truncated frame"));
    }

    #[test]
    fn test_only_capability_unavailable_is_fatal() {
        assert!(Error::CapabilityUnavailable(String::new()).is_fatal());
        assert!(!Error::Rejected("user cancelled".to_string()).is_fatal());
        assert!(!Error::timeout("pair", Duration::from_secs(1)).is_fatal());
    }

    #[test]
    fn test_btleplug_error_conversion() {
        fn _assert_from_impl<T: From<btleplug::Error>>() {}
        _assert_from_impl::<Error>();
    }
}
