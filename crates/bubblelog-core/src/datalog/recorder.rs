//! File logger / recorder
//!
//! Gates whether readings are appended to an open log file. Only one file
//! is open at a time; it is flushed after every line so whatever was
//! written survives an abrupt end of the session.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::format::{session_filename, write_entry, write_header};
use super::{LogEntry, LogError, LogHeader};

/// Suffixed names tried when a session file name is already taken
const MAX_NAME_SUFFIX: u32 = 99;

/// Recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Not recording
    Idle,
    /// File open, accepting appends
    Recording,
}

struct OpenLog {
    path: PathBuf,
    writer: BufWriter<File>,
    started: Instant,
    lines: u64,
}

/// Writes readings to timestamped log files
pub struct FileLogger {
    /// Directory new files are created in
    directory: PathBuf,
    open: Option<OpenLog>,
}

impl FileLogger {
    /// Create an idle logger writing into `directory`
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            open: None,
        }
    }

    /// Current state
    pub fn state(&self) -> RecorderState {
        if self.open.is_some() {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    /// Check if recording is active
    pub fn is_recording(&self) -> bool {
        self.open.is_some()
    }

    /// Path of the open file, if recording
    pub fn path(&self) -> Option<&Path> {
        self.open.as_ref().map(|o| o.path.as_path())
    }

    /// Data lines written to the open file
    pub fn lines_written(&self) -> u64 {
        self.open.as_ref().map(|o| o.lines).unwrap_or(0)
    }

    /// Directory new files are created in
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Start recording to a new file named after the current local time
    ///
    /// A second session within the same second gets a `_2`, `_3`, ... suffix.
    pub fn start(&mut self, header: &LogHeader) -> Result<PathBuf, LogError> {
        let name = session_filename(Local::now());
        let stem = name.trim_end_matches(".txt");
        let mut path = self.directory.join(&name);
        let mut suffix = 1;

        loop {
            match self.start_at(&path, header) {
                Err(LogError::Io(e))
                    if e.kind() == ErrorKind::AlreadyExists && suffix < MAX_NAME_SUFFIX =>
                {
                    suffix += 1;
                    path = self.directory.join(format!("{}_{}.txt", stem, suffix));
                }
                result => return result,
            }
        }
    }

    /// Start recording to `path`, writing the header block
    ///
    /// Never overwrites: an existing file fails with `ErrorKind::AlreadyExists`.
    /// On failure the logger stays idle.
    pub fn start_at<P: AsRef<Path>>(
        &mut self,
        path: P,
        header: &LogHeader,
    ) -> Result<PathBuf, LogError> {
        if let Some(open) = &self.open {
            return Err(LogError::AlreadyRecording(open.path.clone()));
        }

        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file: File = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        let mut writer = BufWriter::new(file);
        write_header(&mut writer, header)?;
        writer.flush()?;

        tracing::info!("Recording to file: {}", path.display());
        self.open = Some(OpenLog {
            path: path.clone(),
            writer,
            started: Instant::now(),
            lines: 0,
        });
        Ok(path)
    }

    /// Append one data line; returns `Ok(false)` without touching anything when idle
    ///
    /// A write failure closes the file and returns to idle.
    pub fn append(&mut self, temperature: f64, pressure: f64) -> Result<bool, LogError> {
        let Some(open) = self.open.as_mut() else {
            return Ok(false);
        };

        let entry = LogEntry::new(open.started.elapsed(), temperature, pressure);
        let result = write_entry(&mut open.writer, &entry).and_then(|_| open.writer.flush());

        match result {
            Ok(()) => {
                open.lines += 1;
                Ok(true)
            }
            Err(e) => {
                tracing::error!("Writing to {} failed: {}", open.path.display(), e);
                self.open = None;
                Err(LogError::Io(e))
            }
        }
    }

    /// Stop recording; returns the closed file, or `None` when already idle
    pub fn stop(&mut self) -> Result<Option<PathBuf>, LogError> {
        let Some(mut open) = self.open.take() else {
            return Ok(None);
        };

        open.writer.flush()?;
        tracing::info!(
            "Stopped recording to {} ({} lines)",
            open.path.display(),
            open.lines
        );
        Ok(Some(open.path))
    }

    /// Time since recording started, zero when idle
    pub fn elapsed(&self) -> Duration {
        self.open
            .as_ref()
            .map(|o| o.started.elapsed())
            .unwrap_or_default()
    }

    /// Elapsed recording time as `HH:MM:SS`
    pub fn pretty_elapsed(&self) -> String {
        pretty_duration(self.elapsed())
    }
}

impl Drop for FileLogger {
    fn drop(&mut self) {
        if self.open.is_some() {
            if let Err(e) = self.stop() {
                tracing::error!("Closing log file on shutdown failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for FileLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLogger")
            .field("directory", &self.directory)
            .field("state", &self.state())
            .field("path", &self.path())
            .finish()
    }
}

/// Format a duration as `HH:MM:SS`
pub(crate) fn pretty_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
