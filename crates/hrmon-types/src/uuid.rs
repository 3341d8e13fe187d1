//! Bluetooth UUIDs for heart-rate sensors.
//!
//! All of these are 16-bit SIG-assigned numbers expanded onto the
//! Bluetooth base UUID.

use uuid::{Uuid, uuid};

// --- Standard BLE Service UUIDs ---

/// Heart Rate service (`heart_rate`, 0x180D).
pub const HEART_RATE_SERVICE: Uuid = uuid!("0000180d-0000-1000-8000-00805f9b34fb");

/// Battery service (`battery_service`, 0x180F).
pub const BATTERY_SERVICE: Uuid = uuid!("0000180f-0000-1000-8000-00805f9b34fb");

// --- Heart Rate Characteristic UUIDs ---

/// Heart Rate Measurement characteristic (`heart_rate_measurement`, 0x2A37).
pub const HEART_RATE_MEASUREMENT: Uuid = uuid!("00002a37-0000-1000-8000-00805f9b34fb");

/// Expand a 16-bit SIG-assigned number onto the Bluetooth base UUID.
pub const fn from_short(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_0080_5f9b_34fb)
}

/// Look up a service or characteristic by its Web Bluetooth name.
///
/// ```
/// use hrmon_types::uuid::{by_name, HEART_RATE_SERVICE};
///
/// assert_eq!(by_name("heart_rate"), Some(HEART_RATE_SERVICE));
/// assert_eq!(by_name("glucose"), None);
/// ```
pub fn by_name(name: &str) -> Option<Uuid> {
    match name {
        "heart_rate" => Some(HEART_RATE_SERVICE),
        "battery_service" => Some(BATTERY_SERVICE),
        "heart_rate_measurement" => Some(HEART_RATE_MEASUREMENT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heart_rate_service_uuid() {
        let expected = "0000180d-0000-1000-8000-00805f9b34fb";
        assert_eq!(HEART_RATE_SERVICE.to_string(), expected);
    }

    #[test]
    fn test_battery_service_uuid() {
        let expected = "0000180f-0000-1000-8000-00805f9b34fb";
        assert_eq!(BATTERY_SERVICE.to_string(), expected);
    }

    #[test]
    fn test_heart_rate_measurement_uuid() {
        let expected = "00002a37-0000-1000-8000-00805f9b34fb";
        assert_eq!(HEART_RATE_MEASUREMENT.to_string(), expected);
    }

    #[test]
    fn test_from_short_matches_constants() {
        assert_eq!(from_short(0x180D), HEART_RATE_SERVICE);
        assert_eq!(from_short(0x180F), BATTERY_SERVICE);
        assert_eq!(from_short(0x2A37), HEART_RATE_MEASUREMENT);
    }

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("battery_service"), Some(BATTERY_SERVICE));
        assert_eq!(by_name("heart_rate_measurement"), Some(HEART_RATE_MEASUREMENT));
        assert_eq!(by_name("HEART_RATE"), None);
    }
}
