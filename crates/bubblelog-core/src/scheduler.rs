//! Acquisition scheduler
//!
//! Runs three independent tickers: one poll task per source and a UI
//! refresh task. Each poll runs its blocking `acquire` on the blocking pool
//! and waits for it no longer than the poll timeout, so a stalled device
//! never holds up the other source or the display.
//!
//! When either source reaches its failure threshold, acquisition halts:
//! both poll tasks stop, the log file is closed and
//! [`AcquisitionEvent::ConnectionLost`] is sent. The UI task keeps rendering
//! the last known values until [`Scheduler::shutdown`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::{AcquisitionConfig, DaqSettings};
use crate::datalog::{FileLogger, LogError, LogHeader};
use crate::history::{HistoryBuffer, SharedHistory};
use crate::protocol::SourceError;
use crate::source::{ConnectionStatus, SampleSource};
use crate::state::{Quantity, Sample, SharedState};

/// Notifications from the acquisition tasks
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionEvent {
    /// A source reached its failure threshold; acquisition has halted
    ConnectionLost {
        /// Name of the source that died
        source: String,
    },
    /// A log file was opened
    RecordingStarted(PathBuf),
    /// A log file was closed
    RecordingStopped(PathBuf),
    /// Writing to the log file failed; recording has stopped
    RecordingFailed(String),
}

/// Chart histories at one instant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSnapshot {
    /// `(time, °C)` pairs, oldest first
    pub temperature: Vec<(f64, f64)>,
    /// `(time, bar)` pairs, oldest first
    pub pressure: Vec<(f64, f64)>,
}

/// Everything the presentation layer needs for one refresh
#[derive(Debug, Clone)]
pub struct DisplayFrame {
    /// Latest readings
    pub sample: Sample,
    /// Microcontroller and sensor status, in that order
    pub statuses: Vec<ConnectionStatus>,
    /// Open log file, if recording
    pub recording: Option<PathBuf>,
    /// Recording time as `HH:MM:SS`
    pub recording_elapsed: String,
    /// True once a connection was lost
    pub halted: bool,
    /// Chart histories; only attached on chart refresh frames
    pub charts: Option<ChartSnapshot>,
}

/// Reasons [`Scheduler::spawn`] refuses to start
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpawnError {
    /// The tasks were already started
    #[error("Acquisition is already running")]
    AlreadyRunning,

    /// A source was passed in the slot of the other quantity
    #[error("{name} measures {actual}, expected {expected}")]
    QuantityMismatch {
        /// Name of the misplaced source
        name: String,
        /// Quantity the slot polls for
        expected: Quantity,
        /// Quantity the source reports
        actual: Quantity,
    },
}

/// Consumer of display frames, driven by the UI ticker
pub trait Presenter: Send {
    /// Draw one frame; must not block for long
    fn render(&mut self, frame: &DisplayFrame);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Microcontroller,
    Sensor,
}

impl Channel {
    fn quantity(self) -> Quantity {
        match self {
            Channel::Microcontroller => Quantity::Pressure,
            Channel::Sensor => Quantity::Temperature,
        }
    }
}

struct Shared {
    state: SharedState,
    temperature_history: SharedHistory,
    pressure_history: SharedHistory,
    logger: Mutex<FileLogger>,
    mcu_status: watch::Sender<ConnectionStatus>,
    sensor_status: watch::Sender<ConnectionStatus>,
    halted: AtomicBool,
    events: mpsc::UnboundedSender<AcquisitionEvent>,
}

impl Shared {
    fn history(&self, channel: Channel) -> &SharedHistory {
        match channel {
            Channel::Microcontroller => &self.pressure_history,
            Channel::Sensor => &self.temperature_history,
        }
    }

    fn status(&self, channel: Channel) -> &watch::Sender<ConnectionStatus> {
        match channel {
            Channel::Microcontroller => &self.mcu_status,
            Channel::Sensor => &self.sensor_status,
        }
    }

    fn notify(&self, event: AcquisitionEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    async fn charts(&self) -> ChartSnapshot {
        ChartSnapshot {
            temperature: self.temperature_history.lock().await.snapshot(),
            pressure: self.pressure_history.lock().await.snapshot(),
        }
    }

    async fn frame(&self, with_charts: bool) -> DisplayFrame {
        let (recording, recording_elapsed) = {
            let logger = self.logger.lock().await;
            (logger.path().map(|p| p.to_path_buf()), logger.pretty_elapsed())
        };
        let charts = if with_charts {
            Some(self.charts().await)
        } else {
            None
        };

        DisplayFrame {
            sample: self.state.snapshot(),
            statuses: vec![
                self.mcu_status.borrow().clone(),
                self.sensor_status.borrow().clone(),
            ],
            recording,
            recording_elapsed,
            halted: self.halted.load(Ordering::SeqCst),
            charts,
        }
    }

    /// Stop acquisition after `source` died
    async fn halt(&self, source: &str, acquisition: &CancellationToken) {
        acquisition.cancel();
        tracing::error!("Lost connection to {}, acquisition halted", source);

        // Set under the logger lock so no recording can start after the stop
        let stopped = {
            let mut logger = self.logger.lock().await;
            self.halted.store(true, Ordering::SeqCst);
            logger.stop()
        };
        match stopped {
            Ok(Some(path)) => self.notify(AcquisitionEvent::RecordingStopped(path)),
            Ok(None) => {}
            Err(e) => self.notify(AcquisitionEvent::RecordingFailed(e.to_string())),
        }
        self.notify(AcquisitionEvent::ConnectionLost {
            source: source.to_string(),
        });
    }
}

/// Cheap, clonable control surface for a running acquisition
#[derive(Clone)]
pub struct AcquisitionHandle {
    shared: Arc<Shared>,
}

impl AcquisitionHandle {
    /// Open a new log file with `comments` in its header
    ///
    /// Fails with [`LogError::Halted`] once a connection was lost.
    pub async fn start_recording(&self, comments: Vec<String>) -> Result<PathBuf, LogError> {
        let mut logger = self.shared.logger.lock().await;
        if self.is_halted() {
            return Err(LogError::Halted);
        }
        let path = logger.start(&LogHeader::now(comments))?;
        drop(logger);
        self.shared
            .notify(AcquisitionEvent::RecordingStarted(path.clone()));
        Ok(path)
    }

    /// Close the log file; `None` when nothing was recording
    pub async fn stop_recording(&self) -> Result<Option<PathBuf>, LogError> {
        let closed = self.shared.logger.lock().await.stop()?;
        if let Some(path) = &closed {
            self.shared
                .notify(AcquisitionEvent::RecordingStopped(path.clone()));
        }
        Ok(closed)
    }

    /// Check if a log file is open
    pub async fn is_recording(&self) -> bool {
        self.shared.logger.lock().await.is_recording()
    }

    /// Empty both chart histories
    pub async fn clear_history(&self) {
        self.shared.temperature_history.lock().await.clear();
        self.shared.pressure_history.lock().await.clear();
    }

    /// Latest readings
    pub fn snapshot(&self) -> Sample {
        self.shared.state.snapshot()
    }

    /// Microcontroller and sensor status, in that order
    pub fn status(&self) -> Vec<ConnectionStatus> {
        vec![
            self.shared.mcu_status.borrow().clone(),
            self.shared.sensor_status.borrow().clone(),
        ]
    }

    /// True once a connection was lost
    pub fn is_halted(&self) -> bool {
        self.shared.halted.load(Ordering::SeqCst)
    }

    /// Current chart histories
    pub async fn charts(&self) -> ChartSnapshot {
        self.shared.charts().await
    }

    /// Build a display frame on demand
    pub async fn frame(&self, with_charts: bool) -> DisplayFrame {
        self.shared.frame(with_charts).await
    }

    /// Watch the shared readings
    pub fn subscribe(&self) -> watch::Receiver<Sample> {
        self.shared.state.subscribe()
    }
}

/// Owns the acquisition tasks and the state they share
pub struct Scheduler {
    daq: DaqSettings,
    shared: Arc<Shared>,
    root: CancellationToken,
    acquisition: CancellationToken,
    events: Option<mpsc::UnboundedReceiver<AcquisitionEvent>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Create an idle scheduler; nothing runs until [`Scheduler::spawn`]
    pub fn new(config: &AcquisitionConfig, logger: FileLogger) -> Self {
        let daq = config.daq.clone();
        let threshold = daq.failure_threshold;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let temperature_history =
            HistoryBuffer::with_window(daq.history_seconds, daq.sensor_interval_ms).shared();
        let pressure_history =
            HistoryBuffer::with_window(daq.history_seconds, daq.mcu_interval_ms).shared();

        let (mcu_status, _) = watch::channel(ConnectionStatus::new(
            config.microcontroller.name.clone(),
            Quantity::Pressure,
            threshold,
        ));
        let (sensor_status, _) = watch::channel(ConnectionStatus::new(
            config.sensor.name.clone(),
            Quantity::Temperature,
            threshold,
        ));

        let root = CancellationToken::new();
        let acquisition = root.child_token();

        Self {
            daq,
            shared: Arc::new(Shared {
                state: SharedState::new(),
                temperature_history,
                pressure_history,
                logger: Mutex::new(logger),
                mcu_status,
                sensor_status,
                halted: AtomicBool::new(false),
                events: events_tx,
            }),
            root,
            acquisition,
            events: Some(events_rx),
            tasks: Vec::new(),
        }
    }

    /// Control surface usable before and after spawning
    pub fn handle(&self) -> AcquisitionHandle {
        AcquisitionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Take the event receiver; only the first call returns it
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<AcquisitionEvent>> {
        self.events.take()
    }

    /// Check if the tasks were started
    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Start the poll tasks and the UI task
    ///
    /// Without a sensor only the microcontroller is polled and the
    /// temperature stays unmeasured. Nothing is started on error.
    pub fn spawn<P>(
        &mut self,
        microcontroller: Box<dyn SampleSource>,
        sensor: Option<Box<dyn SampleSource>>,
        presenter: P,
    ) -> Result<(), SpawnError>
    where
        P: Presenter + 'static,
    {
        if self.is_running() {
            return Err(SpawnError::AlreadyRunning);
        }

        let mut sources = vec![(Channel::Microcontroller, microcontroller)];
        sources.extend(sensor.map(|s| (Channel::Sensor, s)));
        for (channel, source) in &sources {
            if source.quantity() != channel.quantity() {
                return Err(SpawnError::QuantityMismatch {
                    name: source.name().to_string(),
                    expected: channel.quantity(),
                    actual: source.quantity(),
                });
            }
        }
        if sources.len() == 1 {
            tracing::warn!("No temperature sensor, polling the microcontroller only");
            self.shared.sensor_status.send_modify(|s| s.alive = false);
        }

        for (channel, source) in sources {
            let interval = match channel {
                Channel::Microcontroller => self.daq.mcu_interval(),
                Channel::Sensor => self.daq.sensor_interval(),
            };
            self.shared
                .status(channel)
                .send_modify(|s| s.name = source.name().to_string());
            let task = PollTask {
                channel,
                interval,
                timeout: self.daq.poll_timeout(interval),
                shared: Arc::clone(&self.shared),
                acquisition: self.acquisition.clone(),
            };
            self.tasks.push(tokio::spawn(task.run(source)));
        }

        let ui = UiTask {
            interval: self.daq.ui_interval(),
            chart_every: self.daq.chart_every(),
            shared: Arc::clone(&self.shared),
            root: self.root.clone(),
        };
        self.tasks.push(tokio::spawn(ui.run(presenter)));

        tracing::info!(
            "Acquisition started (mcu {} ms, sensor {} ms, ui {} ms)",
            self.daq.mcu_interval_ms,
            self.daq.sensor_interval_ms,
            self.daq.ui_interval_ms
        );
        Ok(())
    }

    /// Stop every task, close the sources and the log file
    pub async fn shutdown(mut self) {
        self.root.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!("Acquisition task ended abnormally: {}", e);
            }
        }
        match self.shared.logger.lock().await.stop() {
            Ok(Some(path)) => tracing::debug!("Closed {} on shutdown", path.display()),
            Ok(None) => {}
            Err(e) => tracing::error!("Closing log file failed: {}", e),
        }
        tracing::info!("Acquisition stopped");
    }
}

type Poll = JoinHandle<(Box<dyn SampleSource>, Result<f64, SourceError>)>;

struct PollTask {
    channel: Channel,
    interval: Duration,
    timeout: Duration,
    shared: Arc<Shared>,
    acquisition: CancellationToken,
}

impl PollTask {
    async fn run(self, source: Box<dyn SampleSource>) {
        let name = source.name().to_string();
        let mut status = self.shared.status(self.channel).borrow().clone();
        let mut idle: Option<Box<dyn SampleSource>> = Some(source);
        let mut in_flight: Option<Poll> = None;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.acquisition.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let outcome = self.poll(&mut idle, &mut in_flight).await;
            if self.acquisition.is_cancelled() {
                break;
            }

            match outcome {
                Ok(value) => self.on_success(&mut status, value).await,
                Err(e) => {
                    let died = status.record_failure();
                    tracing::warn!(
                        "{}: poll failed ({}/{}): {}",
                        name,
                        status.consecutive_failures,
                        status.threshold,
                        e
                    );
                    self.shared.status(self.channel).send_replace(status.clone());
                    if died {
                        self.shared.halt(&name, &self.acquisition).await;
                        break;
                    }
                }
            }
        }

        // Give a stuck poll one last chance to hand the source back
        if let Some(mut handle) = in_flight.take() {
            if let Ok(Ok((source, _))) = tokio::time::timeout(self.timeout, &mut handle).await {
                idle = Some(source);
            }
        }
        if let Some(mut source) = idle.take() {
            let _ = tokio::task::spawn_blocking(move || source.close()).await;
        }
        tracing::debug!("{} poll task finished", name);
    }

    /// Run or resume one poll, bounded by the poll timeout
    async fn poll(
        &self,
        idle: &mut Option<Box<dyn SampleSource>>,
        in_flight: &mut Option<Poll>,
    ) -> Result<f64, SourceError> {
        let mut handle = match in_flight.take() {
            Some(handle) => handle,
            None => {
                let Some(mut source) = idle.take() else {
                    return Err(SourceError::Task("source lost after a crashed poll".into()));
                };
                tokio::task::spawn_blocking(move || {
                    let result = source.acquire();
                    (source, result)
                })
            }
        };

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok((source, result))) => {
                *idle = Some(source);
                result
            }
            Ok(Err(e)) => Err(SourceError::Task(e.to_string())),
            Err(_) => {
                *in_flight = Some(handle);
                Err(SourceError::Timeout)
            }
        }
    }

    async fn on_success(&self, status: &mut ConnectionStatus, value: f64) {
        let shared = &self.shared;
        let now = shared.state.now();
        shared.state.publish(self.channel.quantity(), now, value);
        shared.history(self.channel).lock().await.append(now, value);
        status.record_success(now);
        shared.status(self.channel).send_replace(status.clone());
        tracing::debug!("{} = {} {}", status.name, value, self.channel.quantity().unit());

        if self.channel == Channel::Microcontroller {
            // Pairs the fresh pressure with whatever temperature is current
            let sample = shared.state.snapshot();
            let mut logger = shared.logger.lock().await;
            if let Err(e) = logger.append(sample.temperature, sample.pressure) {
                shared.notify(AcquisitionEvent::RecordingFailed(e.to_string()));
            }
        }
    }
}

struct UiTask {
    interval: Duration,
    chart_every: u64,
    shared: Arc<Shared>,
    root: CancellationToken,
}

impl UiTask {
    async fn run<P: Presenter>(self, mut presenter: P) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let chart_every = self.chart_every.max(1);
        let mut frame_no: u64 = 0;

        loop {
            tokio::select! {
                _ = self.root.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let frame = self.shared.frame(frame_no % chart_every == 0).await;
            presenter.render(&frame);
            frame_no = frame_no.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DemoSource;

    struct NullPresenter;

    impl Presenter for NullPresenter {
        fn render(&mut self, _frame: &DisplayFrame) {}
    }

    fn scheduler(dir: &std::path::Path) -> Scheduler {
        let mut config = AcquisitionConfig::default();
        config.daq.mcu_interval_ms = 20;
        config.daq.sensor_interval_ms = 20;
        config.daq.ui_interval_ms = 10;
        config.daq.poll_timeout_ms = 15;
        Scheduler::new(&config, FileLogger::new(dir))
    }

    #[tokio::test]
    async fn test_handle_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = scheduler(dir.path());
        let handle = scheduler.handle();
        let mut events = scheduler.take_events().unwrap();
        assert!(scheduler.take_events().is_none());

        assert!(!handle.is_halted());
        assert!(handle.snapshot().pressure.is_nan());
        assert_eq!(handle.status().len(), 2);

        let path = handle.start_recording(vec!["note".into()]).await.unwrap();
        assert!(handle.is_recording().await);
        assert_eq!(
            events.recv().await,
            Some(AcquisitionEvent::RecordingStarted(path.clone()))
        );

        assert_eq!(handle.stop_recording().await.unwrap(), Some(path.clone()));
        assert_eq!(handle.stop_recording().await.unwrap(), None);
        assert_eq!(
            events.recv().await,
            Some(AcquisitionEvent::RecordingStopped(path))
        );
        scheduler.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_spawn_publishes_readings() {
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = scheduler(dir.path());
        let handle = scheduler.handle();
        scheduler
            .spawn(
                Box::new(DemoSource::with_seed("mcu", Quantity::Pressure, 1)),
                Some(Box::new(DemoSource::with_seed("pt104", Quantity::Temperature, 2))),
                NullPresenter,
            )
            .unwrap();
        assert!(scheduler.is_running());
        assert_eq!(
            scheduler.spawn(
                Box::new(DemoSource::new("mcu", Quantity::Pressure)),
                None,
                NullPresenter,
            ),
            Err(SpawnError::AlreadyRunning)
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        let sample = handle.snapshot();
        assert!(sample.pressure.is_finite());
        assert!(sample.temperature.is_finite());

        let charts = handle.charts().await;
        assert!(!charts.pressure.is_empty());
        assert!(!charts.temperature.is_empty());

        handle.clear_history().await;
        let frame = handle.frame(true).await;
        assert!(frame.charts.is_some());
        assert_eq!(frame.statuses[0].name, "mcu");
        assert_eq!(frame.statuses[1].name, "pt104");
        assert!(frame.statuses.iter().all(|s| s.update_count > 0));

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_swapped_sources_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = scheduler(dir.path());
        let result = scheduler.spawn(
            Box::new(DemoSource::new("pt104", Quantity::Temperature)),
            Some(Box::new(DemoSource::new("mcu", Quantity::Pressure))),
            NullPresenter,
        );
        assert_eq!(
            result,
            Err(SpawnError::QuantityMismatch {
                name: "pt104".into(),
                expected: Quantity::Pressure,
                actual: Quantity::Temperature,
            })
        );
        assert!(!scheduler.is_running());
        assert_eq!(
            scheduler.handle().status()[0].name,
            AcquisitionConfig::default().microcontroller.name
        );
        scheduler.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_recording_never_survives_a_concurrent_halt() {
        for _ in 0..100 {
            let dir = tempfile::tempdir().unwrap();
            let scheduler = scheduler(dir.path());
            let handle = scheduler.handle();
            let shared = Arc::clone(&scheduler.shared);
            let acquisition = scheduler.acquisition.clone();

            let start = tokio::spawn({
                let handle = handle.clone();
                async move { handle.start_recording(vec![]).await }
            });
            let halt = tokio::spawn(async move { shared.halt("mcu", &acquisition).await });

            let started = start.await.unwrap();
            halt.await.unwrap();

            assert!(handle.is_halted());
            assert!(!handle.is_recording().await);
            match started {
                Ok(path) => assert!(path.exists()),
                Err(e) => assert!(matches!(e, LogError::Halted), "{e}"),
            }
            scheduler.shutdown().await;
        }
    }
}
