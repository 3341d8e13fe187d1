//! Simulated sensor for `--demo`.
//!
//! Wraps a [`MockBluetooth`] with a bit of latency so the busy labels are
//! visible, and feeds it a wandering heart rate once per beat interval.

use std::time::Duration;

use hrmon_core::MockBluetooth;
use hrmon_types::HeartRateSample;
use hrmon_types::frame::RR_TICKS_PER_SECOND;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Name the demo sensor advertises.
pub const DEMO_NAME: &str = "hrmon demo sensor";

/// Latency added to every simulated Bluetooth call.
const DEMO_LATENCY: Duration = Duration::from_millis(400);

/// How often the demo sensor emits a measurement.
const DEMO_PERIOD: Duration = Duration::from_secs(1);

const MIN_BPM: f64 = 55.0;
const MAX_BPM: f64 = 150.0;

/// Create the mock backend used in demo mode.
pub fn demo_bluetooth() -> MockBluetooth {
    MockBluetooth::builder()
        .name(DEMO_NAME)
        .latency(DEMO_LATENCY)
        .build()
}

/// A heart rate doing a bounded random walk.
#[derive(Debug, Clone)]
pub struct HeartRateWalk {
    bpm: f64,
    energy: u16,
}

impl Default for HeartRateWalk {
    fn default() -> Self {
        Self {
            bpm: 68.0,
            energy: 0,
        }
    }
}

impl HeartRateWalk {
    /// Move the rate by `delta` bpm and return the next sample.
    pub fn step(&mut self, delta: f64) -> HeartRateSample {
        self.bpm = (self.bpm + delta).clamp(MIN_BPM, MAX_BPM);
        self.energy = self.energy.saturating_add(1);
        synth_sample(self.bpm.round() as u16, self.energy)
    }
}

/// Build a sample whose single RR interval matches `bpm`, quantized to
/// the 1/1024 s resolution of the wire format.
pub fn synth_sample(bpm: u16, energy: u16) -> HeartRateSample {
    let rr = if bpm == 0 {
        Vec::new()
    } else {
        let ticks = (60.0 / f64::from(bpm) * RR_TICKS_PER_SECOND).round();
        vec![ticks / RR_TICKS_PER_SECOND]
    };
    HeartRateSample {
        bpm,
        energy_expended: Some(energy),
        rr_intervals: rr,
        sensor_contact: Some(true),
    }
}

/// Emit a sample on `bluetooth` every period until `token` is cancelled.
///
/// Frames emitted while notifications are off are stored but not observed.
pub fn spawn_frame_generator(bluetooth: MockBluetooth, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut walk = HeartRateWalk::default();
        let mut ticker = tokio::time::interval(DEMO_PERIOD);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let delta = rand::rng().random_range(-3.0..=3.0);
            let sample = walk.step(delta);
            if !bluetooth.emit_sample(&sample) {
                trace!(bpm = sample.bpm, "Demo sensor is not streaming");
            }
        }
    })
}
