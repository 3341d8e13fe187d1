//! Terminal rendering of presentation state.
//!
//! Status changes and failures go to stderr; samples go to stdout so that
//! `--json` output can be piped.

use hrmon_core::{FailureEntry, HeartRateSample, PresentationState, View};
use owo_colors::OwoColorize;

/// Heart-rate zones (bpm) used for coloring.
pub mod zone {
    pub const MODERATE: u16 = 100; // Yellow: 100-140 bpm
    pub const HARD: u16 = 140; // Red: > 140 bpm
}

/// Format a bpm value colored by zone.
pub fn format_bpm_colored(bpm: u16, no_color: bool) -> String {
    if no_color {
        format!("{bpm}")
    } else if bpm < zone::MODERATE {
        format!("{}", bpm.green())
    } else if bpm < zone::HARD {
        format!("{}", bpm.yellow())
    } else {
        format!("{}", bpm.red())
    }
}

/// One line of a sample in text mode.
pub fn format_sample(sample: &HeartRateSample, no_color: bool) -> String {
    let mut line = format!("♥ {} bpm", format_bpm_colored(sample.bpm, no_color));
    if let Some(energy) = sample.energy_expended {
        line.push_str(&format!("  {energy} kJ"));
    }
    if sample.sensor_contact == Some(false) {
        line.push_str("  (no skin contact)");
    }
    if let Some(rr) = sample.latest_rr() {
        line.push_str(&format!("  RR {:.0} ms", rr * 1000.0));
    }
    line
}

/// One sample as a JSON line.
pub fn format_sample_json(sample: &HeartRateSample) -> String {
    serde_json::to_string(sample).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

/// One line of the failure log.
pub fn format_failure(entry: &FailureEntry, no_color: bool) -> String {
    let at = entry.at.time();
    let stamp = format!("{:02}:{:02}:{:02}", at.hour(), at.minute(), at.second());
    let text = format!("✗ {stamp} {entry}");
    if no_color {
        text
    } else {
        format!("{}", text.red())
    }
}

/// Output produced for one state change.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Rendered {
    /// Lines for stderr.
    pub status: Vec<String>,
    /// Line for stdout.
    pub sample: Option<String>,
}

/// [`View`] that prints to the terminal.
#[derive(Debug, Default)]
pub struct TerminalView {
    json: bool,
    no_color: bool,
    /// Failure log entries already printed.
    printed_failures: usize,
    last_status: Option<String>,
    /// Sample count at the last printed sample.
    printed_samples: u64,
}

impl TerminalView {
    pub fn new(json: bool, no_color: bool) -> Self {
        Self {
            json,
            no_color,
            ..Default::default()
        }
    }

    /// Work out what changed since the previous state.
    pub fn diff(&mut self, state: &PresentationState) -> Rendered {
        let mut rendered = Rendered::default();

        let status = self.status_line(state);
        if self.last_status.as_ref() != Some(&status) {
            rendered.status.push(status.clone());
            self.last_status = Some(status);
        }

        for entry in state.failures.iter().skip(self.printed_failures) {
            rendered.status.push(format_failure(entry, self.no_color));
        }
        self.printed_failures = state.failures.len();

        // Every received sample is printed, including repeats of the last one.
        if state.samples != self.printed_samples {
            self.printed_samples = state.samples;
            rendered.sample = state.latest.as_ref().map(|sample| {
                if self.json {
                    format_sample_json(sample)
                } else {
                    format_sample(sample, self.no_color)
                }
            });
        }

        rendered
    }

    fn status_line(&self, state: &PresentationState) -> String {
        let label = format!("[{}]", state.label);
        let mut line = if self.no_color {
            label
        } else if state.busy {
            format!("{}", label.dimmed())
        } else {
            format!("{}", label.cyan().bold())
        };
        if let Some(name) = &state.device_name {
            line.push_str(&format!(" {name}"));
        }
        line
    }
}

impl View for TerminalView {
    fn render(&mut self, state: &PresentationState) {
        let rendered = self.diff(state);
        for line in rendered.status {
            eprintln!("{line}");
        }
        if let Some(line) = rendered.sample {
            println!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrmon_core::{ActionLabel, FailureKind};
    use time::OffsetDateTime;

    fn state(label: ActionLabel, busy: bool) -> PresentationState {
        PresentationState {
            label,
            busy,
            ..Default::default()
        }
    }

    #[test]
    fn test_bpm_zones_plain() {
        assert_eq!(format_bpm_colored(72, true), "72");
        assert_ne!(format_bpm_colored(72, false), "72");
    }

    #[test]
    fn test_format_sample_text() {
        let sample = HeartRateSample {
            bpm: 64,
            energy_expended: Some(12),
            rr_intervals: vec![0.9, 0.875],
            sensor_contact: Some(false),
        };
        assert_eq!(
            format_sample(&sample, true),
            "♥ 64 bpm  12 kJ  (no skin contact)  RR 875 ms"
        );
        assert_eq!(format_sample(&HeartRateSample::new(58), true), "♥ 58 bpm");
    }

    #[test]
    fn test_format_sample_json() {
        let json = format_sample_json(&HeartRateSample::new(90));
        assert!(json.starts_with("{\"bpm\":90"));
    }

    #[test]
    fn test_status_printed_only_on_change() {
        let mut view = TerminalView::new(false, true);
        let first = view.diff(&state(ActionLabel::Pair, false));
        assert_eq!(first.status, vec!["[Pair]".to_string()]);

        let again = view.diff(&state(ActionLabel::Pair, false));
        assert!(again.status.is_empty());

        let mut paired = state(ActionLabel::Connect, false);
        paired.device_name = Some("Polar H9".to_string());
        assert_eq!(view.diff(&paired).status, vec!["[Connect] Polar H9".to_string()]);
    }

    #[test]
    fn test_failures_printed_once() {
        let mut view = TerminalView::new(false, true);
        let mut failing = state(ActionLabel::Pair, false);
        failing.failures.push(FailureEntry {
            at: OffsetDateTime::UNIX_EPOCH,
            kind: FailureKind::Pair,
            cause: "User cancelled".to_string(),
        });

        let rendered = view.diff(&failing);
        assert_eq!(rendered.status.len(), 2);
        assert_eq!(rendered.status[1], "✗ 00:00:00 pair failed: User cancelled");

        assert!(view.diff(&failing).status.is_empty());
    }

    #[test]
    fn test_sample_printed_once() {
        let mut view = TerminalView::new(true, true);
        let mut streaming = state(ActionLabel::Stop, false);
        streaming.latest = Some(HeartRateSample::new(80));
        streaming.samples = 1;

        let rendered = view.diff(&streaming);
        assert!(rendered.sample.unwrap().contains("\"bpm\":80"));
        assert!(view.diff(&streaming).sample.is_none());
    }

    #[test]
    fn test_repeated_sample_printed_again() {
        let mut view = TerminalView::new(true, true);
        let mut streaming = state(ActionLabel::Stop, false);
        streaming.latest = Some(HeartRateSample::new(80));
        streaming.samples = 1;
        assert!(view.diff(&streaming).sample.is_some());

        // Same reading from a steady sensor.
        streaming.samples = 2;
        let expected = format_sample_json(&HeartRateSample::new(80));
        assert_eq!(view.diff(&streaming).sample, Some(expected));
    }
}
