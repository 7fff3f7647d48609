//! Console presentation of the live readings
//!
//! Redraws a single status line on stdout every display frame. Chart frames
//! refresh the min/max ranges shown next to each reading.

use bubblelog_core::scheduler::{ChartSnapshot, DisplayFrame, Presenter};
use bubblelog_core::source::ConnectionStatus;
use chrono::{DateTime, Local};
use std::io::{self, Write};

/// Value range over a chart history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
}

impl Range {
    fn of(points: &[(f64, f64)]) -> Option<Self> {
        points
            .iter()
            .map(|&(_, v)| v)
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<Range>, v| {
                Some(match acc {
                    None => Range { min: v, max: v },
                    Some(r) => Range {
                        min: r.min.min(v),
                        max: r.max.max(v),
                    },
                })
            })
    }
}

/// Chart ranges kept between chart refreshes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChartRanges {
    /// Temperature history range
    pub temperature: Option<Range>,
    /// Pressure history range
    pub pressure: Option<Range>,
}

impl ChartRanges {
    fn from_snapshot(charts: &ChartSnapshot) -> Self {
        Self {
            temperature: Range::of(&charts.temperature),
            pressure: Range::of(&charts.pressure),
        }
    }
}

fn reading(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{:>8.*}", decimals, value)
    } else {
        format!("{:>8}", "---")
    }
}

fn range(r: Option<Range>, decimals: usize) -> String {
    match r {
        Some(r) => format!("[{:.*} .. {:.*}]", decimals, r.min, decimals, r.max),
        None => String::new(),
    }
}

fn rate(status: &ConnectionStatus) -> String {
    let rate = if !status.alive {
        "DEAD".to_string()
    } else if status.obtained_rate_hz.is_finite() {
        format!("{:.1} Hz", status.obtained_rate_hz)
    } else {
        "-- Hz".to_string()
    };
    format!("{} {} #{}", status.name, rate, status.update_count)
}

/// Text of the status line for one frame, stamped with the wall clock `now`
pub fn status_line(frame: &DisplayFrame, ranges: &ChartRanges, now: DateTime<Local>) -> String {
    let sample = &frame.sample;
    let mut line = format!(
        "{}  T {} °C {}  P {} bar {}  |",
        now.format("%Y-%m-%d %H:%M:%S"),
        reading(sample.temperature, 3),
        range(ranges.temperature, 2),
        reading(sample.pressure, 3),
        range(ranges.pressure, 2),
    );
    for status in &frame.statuses {
        line.push(' ');
        line.push_str(&rate(status));
    }

    if frame.halted {
        line.push_str("  | LOST CONNECTION (read-only, 'q' to quit)");
    } else if let Some(path) = &frame.recording {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        line.push_str(&format!("  | REC {} {}", frame.recording_elapsed, name));
    } else {
        line.push_str("  | idle");
    }
    line
}

/// Presenter drawing on the terminal
#[derive(Debug, Default)]
pub struct ConsoleView {
    ranges: ChartRanges,
}

impl ConsoleView {
    /// Create a view with empty chart ranges
    pub fn new() -> Self {
        Self::default()
    }
}

impl Presenter for ConsoleView {
    fn render(&mut self, frame: &DisplayFrame) {
        if let Some(charts) = &frame.charts {
            self.ranges = ChartRanges::from_snapshot(charts);
        }
        let mut out = io::stdout().lock();
        // Broken stdout is not worth stopping acquisition for
        let line = status_line(frame, &self.ranges, Local::now());
        let _ = write!(out, "\r{}\x1b[K", line);
        let _ = out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bubblelog_core::state::{Quantity, Sample};
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2022, 10, 14, 10, 30, 5).unwrap()
    }

    fn frame() -> DisplayFrame {
        DisplayFrame {
            sample: Sample {
                time: 1.0,
                temperature: 20.1234,
                pressure: f64::NAN,
            },
            statuses: vec![
                ConnectionStatus::new("Ard", Quantity::Pressure, 3),
                ConnectionStatus::new("PT104", Quantity::Temperature, 3),
            ],
            recording: None,
            recording_elapsed: "00:00:00".into(),
            halted: false,
            charts: None,
        }
    }

    #[test]
    fn test_status_line_idle() {
        let line = status_line(&frame(), &ChartRanges::default(), now());
        assert!(line.starts_with("2022-10-14 10:30:05  T   20.123 °C"));
        assert!(line.contains("P      --- bar"));
        assert!(line.contains("Ard -- Hz #0 PT104 -- Hz #0"));
        assert!(line.ends_with("| idle"));
    }

    #[test]
    fn test_status_line_recording_and_halted() {
        let mut f = frame();
        f.recording = Some(PathBuf::from("logs/221014_103000.txt"));
        f.recording_elapsed = "00:01:05".into();
        assert!(status_line(&f, &ChartRanges::default(), now())
            .ends_with("REC 00:01:05 221014_103000.txt"));

        f.halted = true;
        f.statuses[0].alive = false;
        f.statuses[0].update_count = 42;
        let line = status_line(&f, &ChartRanges::default(), now());
        assert!(line.contains("Ard DEAD #42"));
        assert!(line.contains("LOST CONNECTION"));
    }

    #[test]
    fn test_status_line_counts_updates() {
        let mut f = frame();
        f.statuses[0].record_success(1.0);
        f.statuses[0].record_success(2.0);
        f.statuses[1].record_success(1.5);
        let line = status_line(&f, &ChartRanges::default(), now());
        assert!(line.contains("Ard 1.0 Hz #2"), "{line}");
        assert!(line.contains("PT104 -- Hz #1"), "{line}");
    }

    #[test]
    fn test_ranges_skip_unmeasured() {
        let charts = ChartSnapshot {
            temperature: vec![(0.0, f64::NAN), (1.0, 20.0), (2.0, 21.5)],
            pressure: vec![],
        };
        let ranges = ChartRanges::from_snapshot(&charts);
        assert_eq!(ranges.temperature, Some(Range { min: 20.0, max: 21.5 }));
        assert_eq!(ranges.pressure, None);
    }
}
