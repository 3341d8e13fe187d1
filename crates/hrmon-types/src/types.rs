//! Core types for heart-rate sensor data.

use core::fmt;

use bytes::Bytes;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::frame;

/// One decoded Heart Rate Measurement.
///
/// Optional fields are `None` when the sensor's flags byte did not
/// declare them.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HeartRateSample {
    /// Heart rate in beats per minute.
    pub bpm: u16,
    /// Cumulative energy expended in kilojoules, if reported.
    pub energy_expended: Option<u16>,
    /// RR intervals in seconds, oldest first.
    pub rr_intervals: Vec<f64>,
    /// Skin contact state, if the sensor supports contact detection.
    pub sensor_contact: Option<bool>,
}

impl HeartRateSample {
    /// Create a sample carrying only a heart rate.
    pub fn new(bpm: u16) -> Self {
        Self {
            bpm,
            ..Self::default()
        }
    }

    /// Decode a sample from a raw Heart Rate Measurement frame.
    ///
    /// This is an alias for [`frame::decode`].
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] if a field declared by the flags
    /// runs past the end of `data`, or [`DecodeError::Malformed`] if `data`
    /// is empty.
    #[must_use = "decoding returns a Result that should be handled"]
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        frame::decode(data)
    }

    /// Encode this sample as a Heart Rate Measurement frame.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        frame::encode(self)
    }

    /// Most recent RR interval, in seconds.
    pub fn latest_rr(&self) -> Option<f64> {
        self.rr_intervals.last().copied()
    }
}

impl fmt::Display for HeartRateSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bpm", self.bpm)?;
        if let Some(energy) = self.energy_expended {
            write!(f, ", {} kJ", energy)?;
        }
        match self.sensor_contact {
            Some(true) => write!(f, ", contact")?,
            Some(false) => write!(f, ", no contact")?,
            None => {}
        }
        if !self.rr_intervals.is_empty() {
            let rrs: Vec<String> = self
                .rr_intervals
                .iter()
                .map(|rr| format!("{:.0}ms", rr * 1000.0))
                .collect();
            write!(f, ", RR [{}]", rrs.join(" "))?;
        }
        Ok(())
    }
}
