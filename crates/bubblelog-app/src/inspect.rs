//! `bubblelog inspect` - summary of a recorded log file

use anyhow::{Context, Result};
use bubblelog_core::datalog::{LogFile, COLUMNS};
use std::fmt::Write as _;
use std::path::Path;

/// Statistics over the finite values of one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    /// Finite values
    pub count: usize,
    /// Values that were NaN or infinite
    pub missing: usize,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Arithmetic mean
    pub mean: f64,
}

impl ColumnStats {
    /// Compute statistics; `None` when the column has no finite value
    pub fn of(values: &[f64]) -> Option<Self> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        Some(Self {
            count: finite.len(),
            missing: values.len() - finite.len(),
            min,
            max,
            mean,
        })
    }
}

/// Human-readable summary of a parsed log
pub fn summarize(log: &LogFile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", log.filename);
    let _ = writeln!(out, "  recorded {} {}", log.header_date, log.header_time);
    for line in &log.header_msg {
        let _ = writeln!(out, "  | {}", line);
    }
    let _ = writeln!(
        out,
        "  {} rows over {:.1} s",
        log.len(),
        log.duration().as_secs_f64()
    );

    for name in COLUMNS {
        let values = log.column(name).unwrap_or(&[]);
        match ColumnStats::of(values) {
            Some(s) => {
                let _ = writeln!(
                    out,
                    "  {:<5} min {:>10.3}  max {:>10.3}  mean {:>10.3}  ({} missing)",
                    name, s.min, s.max, s.mean, s.missing
                );
            }
            None => {
                let _ = writeln!(out, "  {:<5} no data", name);
            }
        }
    }
    out
}

/// Read `path` and print its summary
pub fn run(path: &Path) -> Result<()> {
    let log = LogFile::read(path).with_context(|| format!("reading {}", path.display()))?;
    print!("{}", summarize(&log));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_column_stats() {
        let stats = ColumnStats::of(&[1.0, f64::NAN, 3.0]).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.mean, 2.0);
        assert_eq!(ColumnStats::of(&[f64::NAN]), None);
    }

    #[test]
    fn test_summarize() {
        let log = LogFile {
            filename: "221014_103000.txt".into(),
            header_date: "14-10-2022".into(),
            header_time: "10:30:00".into(),
            header_msg: vec!["note A".into()],
            time: vec![0.0, 1.0],
            temp: vec![20.123, 20.130],
            pres: vec![f64::NAN, f64::NAN],
        };
        let text = summarize(&log);
        assert!(text.starts_with("221014_103000.txt\n  recorded 14-10-2022 10:30:00\n  | note A\n"));
        assert!(text.contains("2 rows over 1.0 s"));
        assert!(text.contains("pres  no data"));
    }
}
