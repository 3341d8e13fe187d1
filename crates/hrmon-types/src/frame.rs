//! Heart Rate Measurement frame codec.
//!
//! Frames follow the Bluetooth SIG Heart Rate Measurement characteristic
//! (0x2A37). All multi-byte fields are little-endian:
//!
//! | field | present when | width |
//! |-------|--------------|-------|
//! | flags | always | u8 |
//! | heart rate | always; u16 if `flags & 0x01`, else u8 | 1 or 2 |
//! | energy expended | `flags & 0x08` | u16 |
//! | RR intervals | `flags & 0x10`, repeated to end of frame | u16 each, 1/1024 s |
//!
//! Sensor contact is carried in the flags byte itself: bit 2 says the
//! sensor supports contact detection, bit 1 holds the contact state.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, DecodeResult};
use crate::types::HeartRateSample;

/// Heart rate field is a u16 instead of a u8.
pub const FLAG_BPM_U16: u8 = 0x01;

/// Skin contact detected (meaningful only with [`FLAG_CONTACT_SUPPORTED`]).
pub const FLAG_CONTACT_DETECTED: u8 = 0x02;

/// Sensor supports contact detection.
pub const FLAG_CONTACT_SUPPORTED: u8 = 0x04;

/// Energy expended field is present.
pub const FLAG_ENERGY_EXPENDED: u8 = 0x08;

/// One or more RR intervals follow.
pub const FLAG_RR_INTERVALS: u8 = 0x10;

/// RR interval ticks per second.
pub const RR_TICKS_PER_SECOND: f64 = 1024.0;

/// Decode a raw Heart Rate Measurement frame.
///
/// Decoding is all-or-nothing: if any field declared by the flags runs past
/// the end of the frame, no partial sample is returned.
///
/// # Errors
///
/// - [`DecodeError::Malformed`] if `data` is empty.
/// - [`DecodeError::Truncated`] if a declared field does not fit.
///
/// # Examples
///
/// ```
/// use hrmon_types::frame::decode;
///
/// let sample = decode(&[0x00, 72]).unwrap();
/// assert_eq!(sample.bpm, 72);
/// assert!(sample.rr_intervals.is_empty());
/// ```
pub fn decode(data: &[u8]) -> DecodeResult<HeartRateSample> {
    let len = data.len();
    let mut buf = data;

    if !buf.has_remaining() {
        return Err(DecodeError::Malformed("empty frame".to_string()));
    }
    let flags = buf.get_u8();

    let bpm = if (flags & FLAG_BPM_U16) != 0 {
        read_u16(&mut buf, len)?
    } else {
        u16::from(read_u8(&mut buf, len)?)
    };

    let sensor_contact = if (flags & FLAG_CONTACT_SUPPORTED) != 0 {
        Some((flags & FLAG_CONTACT_DETECTED) != 0)
    } else {
        None
    };

    let energy_expended = if (flags & FLAG_ENERGY_EXPENDED) != 0 {
        Some(read_u16(&mut buf, len)?)
    } else {
        None
    };

    let mut rr_intervals = Vec::new();
    if (flags & FLAG_RR_INTERVALS) != 0 {
        rr_intervals.reserve(buf.remaining() / 2);
        while buf.has_remaining() {
            let ticks = read_u16(&mut buf, len)?;
            rr_intervals.push(f64::from(ticks) / RR_TICKS_PER_SECOND);
        }
    }

    Ok(HeartRateSample {
        bpm,
        energy_expended,
        rr_intervals,
        sensor_contact,
    })
}

/// Encode a sample as the smallest frame that decodes back to it.
///
/// The heart rate is written as a u8 when it fits. RR intervals are
/// rounded to the nearest 1/1024 s and saturate at `u16::MAX` ticks.
pub fn encode(sample: &HeartRateSample) -> Bytes {
    let mut flags = 0u8;
    let wide_bpm = sample.bpm > u16::from(u8::MAX);
    if wide_bpm {
        flags |= FLAG_BPM_U16;
    }
    if let Some(contact) = sample.sensor_contact {
        flags |= FLAG_CONTACT_SUPPORTED;
        if contact {
            flags |= FLAG_CONTACT_DETECTED;
        }
    }
    if sample.energy_expended.is_some() {
        flags |= FLAG_ENERGY_EXPENDED;
    }
    if !sample.rr_intervals.is_empty() {
        flags |= FLAG_RR_INTERVALS;
    }

    let mut out = BytesMut::with_capacity(5 + sample.rr_intervals.len() * 2);
    out.put_u8(flags);
    if wide_bpm {
        out.put_u16_le(sample.bpm);
    } else {
        out.put_u8(sample.bpm as u8);
    }
    if let Some(energy) = sample.energy_expended {
        out.put_u16_le(energy);
    }
    for rr in &sample.rr_intervals {
        let ticks = (rr * RR_TICKS_PER_SECOND)
            .round()
            .clamp(0.0, f64::from(u16::MAX)) as u16;
        out.put_u16_le(ticks);
    }
    out.freeze()
}

fn read_u8(buf: &mut &[u8], len: usize) -> DecodeResult<u8> {
    if buf.remaining() < 1 {
        return Err(DecodeError::truncated(1, len - buf.remaining(), len));
    }
    Ok(buf.get_u8())
}

fn read_u16(buf: &mut &[u8], len: usize) -> DecodeResult<u16> {
    if buf.remaining() < 2 {
        return Err(DecodeError::truncated(2, len - buf.remaining(), len));
    }
    Ok(buf.get_u16_le())
}
