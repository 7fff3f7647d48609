//! Log file reader
//!
//! Parses files written by [`FileLogger`](super::FileLogger) back into
//! header fields and numeric columns.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use super::format::{COLUMNS, DATA_MARKER, HEADER_MARKER};
use super::LogError;

/// Markers must appear within this many lines from the top of the file
pub const MAX_SCAN_LINES: usize = 100;

/// A parsed log file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogFile {
    /// Name the file was read from
    pub filename: String,
    /// First header line, `dd-MM-yyyy`
    pub header_date: String,
    /// Second header line, `HH:mm:ss`
    pub header_time: String,
    /// Operator comment lines
    pub header_msg: Vec<String>,
    /// Elapsed seconds since recording started
    pub time: Vec<f64>,
    /// Temperature column [°C]
    pub temp: Vec<f64>,
    /// Pressure column [bar]
    pub pres: Vec<f64>,
}

impl LogFile {
    /// Read and parse the log file at `path`
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, LogError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(name, BufReader::new(file))
    }

    /// Parse a log from any buffered reader
    pub fn parse<R: BufRead>(name: impl Into<String>, mut reader: R) -> Result<Self, LogError> {
        let mut header: Vec<String> = Vec::new();
        let mut in_header = false;
        let mut found_data = false;

        let mut line = String::new();
        for _ in 0..MAX_SCAN_LINES {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            let trimmed = line.trim();
            if trimmed.eq_ignore_ascii_case(DATA_MARKER) {
                found_data = true;
                break;
            }
            if trimmed.eq_ignore_ascii_case(HEADER_MARKER) {
                in_header = true;
                header.clear();
            } else if in_header {
                header.push(line.trim_end_matches(['\r', '\n']).to_string());
            }
        }

        if !found_data {
            return Err(LogError::MissingDataSection);
        }

        while header.last().is_some_and(|l| l.trim().is_empty()) {
            header.pop();
        }
        if header.len() < 2 {
            return Err(LogError::IncompleteHeader);
        }
        let header_msg = header.split_off(2);
        let header_time = header.pop().unwrap_or_default().trim().to_string();
        let header_date = header.pop().unwrap_or_default().trim().to_string();

        let mut table = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = table.records();
        let mut names: Option<csv::StringRecord> = None;
        // Units row and column-name row, in either order
        for _ in 0..2 {
            let Some(record) = records.next() else {
                break;
            };
            let record = record?;
            if record.iter().any(|f| COLUMNS.contains(&f)) {
                names = Some(record);
            }
        }
        let names = names.ok_or_else(|| LogError::MissingColumn(COLUMNS[0].to_string()))?;

        let index_of = |column: &str| {
            names
                .iter()
                .position(|f| f == column)
                .ok_or_else(|| LogError::MissingColumn(column.to_string()))
        };
        let (ti, tei, pi) = (index_of("time")?, index_of("temp")?, index_of("pres")?);

        let mut log = LogFile {
            filename: name.into(),
            header_date,
            header_time,
            header_msg,
            ..Default::default()
        };

        for (row, record) in records.enumerate() {
            let record = record?;
            if record.iter().all(|f| f.is_empty()) {
                continue;
            }
            let value = |index: usize, column: &str| -> Result<f64, LogError> {
                let raw = record.get(index).unwrap_or("");
                raw.parse::<f64>().map_err(|_| LogError::InvalidValue {
                    row,
                    column: column.to_string(),
                    value: raw.to_string(),
                })
            };
            log.time.push(value(ti, "time")?);
            log.temp.push(value(tei, "temp")?);
            log.pres.push(value(pi, "pres")?);
        }

        Ok(log)
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Check if the file holds no data rows
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Elapsed time of the last data row
    pub fn duration(&self) -> Duration {
        self.time
            .last()
            .filter(|t| t.is_finite() && **t >= 0.0)
            .map(|t| Duration::from_secs_f64(*t))
            .unwrap_or_default()
    }

    /// Column by name (`time`, `temp` or `pres`)
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        match name {
            "time" => Some(&self.time),
            "temp" => Some(&self.temp),
            "pres" => Some(&self.pres),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_parse_swapped_rows_and_crlf() {
        let text = "[header]\r\n01-02-2023\r\n08:00:00\r\n\r\n\r\n[DATA]\r\n\
                    time\ttemp\tpres\r\n[s]\t[°C]\t[bar]\r\n0.0\t19.5\t1.0\r\n";
        let log = LogFile::parse("x.txt", Cursor::new(text)).unwrap();

        assert_eq!(log.header_date, "01-02-2023");
        assert_eq!(log.header_time, "08:00:00");
        assert!(log.header_msg.is_empty());
        assert_eq!(log.time, vec![0.0]);
        assert_eq!(log.temp, vec![19.5]);
        assert_eq!(log.pres, vec![1.0]);
    }

    #[test]
    fn test_missing_data_section() {
        let text = "[HEADER]\n01-02-2023\n08:00:00\n";
        let err = LogFile::parse("x.txt", Cursor::new(text)).unwrap_err();
        assert!(matches!(err, LogError::MissingDataSection));
    }

    #[test]
    fn test_data_marker_beyond_scan_window() {
        let mut text = String::from("[HEADER]\n01-02-2023\n08:00:00\n");
        for _ in 0..MAX_SCAN_LINES {
            text.push_str("comment\n");
        }
        text.push_str("[DATA]\n");
        let err = LogFile::parse("x.txt", Cursor::new(text)).unwrap_err();
        assert!(matches!(err, LogError::MissingDataSection));
    }

    #[test]
    fn test_missing_column() {
        let text = "[HEADER]\nd\nt\n\n[DATA]\n[s]\t[°C]\ntime\ttemp\n0.0\t1.0\n";
        let err = LogFile::parse("x.txt", Cursor::new(text)).unwrap_err();
        assert!(matches!(err, LogError::MissingColumn(c) if c == "pres"));
    }

    #[test]
    fn test_invalid_value() {
        let text = "[HEADER]\nd\nt\n\n[DATA]\n[s]\t[°C]\t[bar]\ntime\ttemp\tpres\n0.0\tabc\t1.0\n";
        let err = LogFile::parse("x.txt", Cursor::new(text)).unwrap_err();
        assert!(matches!(err, LogError::InvalidValue { row: 0, .. }));
    }

    #[test]
    fn test_nan_values_survive() {
        let text = "[HEADER]\nd\nt\n\n[DATA]\n[s]\t[°C]\t[bar]\ntime\ttemp\tpres\n0.0\tNaN\t1.000\n";
        let log = LogFile::parse("x.txt", Cursor::new(text)).unwrap();
        assert!(log.temp[0].is_nan());
        assert_eq!(log.column("pres"), Some(&[1.0][..]));
        assert_eq!(log.column("flow"), None);
    }
}
