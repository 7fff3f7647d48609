//! Console front-end for the Diffusive Bubble Growth logger
//!
//! Polls the pressure microcontroller and the temperature module, shows the
//! live readings on one status line and records them on request.
//!
//! # Usage
//!
//! ```bash
//! bubblelog --record --comment "sample 3"
//! bubblelog --demo
//! bubblelog inspect 221014_103000.txt
//! ```

mod inspect;
mod operator;
mod view;

use anyhow::{Context, Result};
use bubblelog_core::prelude::*;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

use operator::{OperatorCommand, HELP};
use view::ConsoleView;

#[derive(Parser)]
#[command(name = "bubblelog", version)]
#[command(about = "Pressure and temperature logger", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire and display readings (default)
    Run(RunArgs),

    /// Print the header and column statistics of a log file
    Inspect {
        /// Log file written by `run`
        file: PathBuf,
    },
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    /// JSON configuration file; defaults are used when it does not exist
    #[arg(long, default_value = "config/bubblelog.json")]
    config: PathBuf,

    /// Use simulated instruments instead of hardware
    #[arg(long)]
    demo: bool,

    /// Start recording right away
    #[arg(long)]
    record: bool,

    /// Header comment line for the recording (repeatable)
    #[arg(long = "comment", value_name = "TEXT")]
    comments: Vec<String>,

    /// Only report errors, hide transient poll diagnostics
    #[arg(long, short)]
    quiet: bool,
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "error" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Inspect { file }) => {
            init_tracing(false);
            inspect::run(&file)
        }
        Some(Commands::Run(args)) => run(args).await,
        None => run(cli.run).await,
    }
}

/// Instruments handed to the scheduler
type Sources = (Box<dyn SampleSource>, Option<Box<dyn SampleSource>>);

/// Connect the instruments
///
/// `None` after printing why the microcontroller is unavailable. A missing
/// temperature sensor only leaves the temperature unmeasured.
async fn connect_sources(config: &AcquisitionConfig, demo: bool) -> Result<Option<Sources>> {
    if demo {
        tracing::info!("Demo mode, using simulated instruments");
        let mcu: Box<dyn SampleSource> =
            Box::new(DemoSource::new(&config.microcontroller.name, Quantity::Pressure));
        let sensor: Box<dyn SampleSource> =
            Box::new(DemoSource::new(&config.sensor.name, Quantity::Temperature));
        return Ok(Some((mcu, Some(sensor))));
    }

    let settings = config.microcontroller.clone();
    let mcu = tokio::task::spawn_blocking(move || PressureMonitor::connect(&settings))
        .await
        .context("microcontroller discovery task")?;
    let mcu = match mcu {
        Ok(mcu) => mcu,
        Err(e) => {
            eprintln!("ERROR: Could not connect to the microcontroller: {e}");
            return Ok(None);
        }
    };

    let settings = config.sensor.clone();
    let sensor = tokio::task::spawn_blocking(move || TemperatureProbe::connect(&settings))
        .await
        .context("sensor connection task")?;
    let sensor: Option<Box<dyn SampleSource>> = match sensor {
        Ok(sensor) => Some(Box::new(sensor)),
        Err(e) => {
            tracing::warn!(
                "Could not connect to the temperature sensor at {}, continuing without it: {}",
                config.sensor.address,
                e
            );
            None
        }
    };

    let mcu: Box<dyn SampleSource> = Box::new(mcu);
    Ok(Some((mcu, sensor)))
}

async fn run(args: RunArgs) -> Result<()> {
    init_tracing(args.quiet);

    let config = AcquisitionConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    config.validate().context("invalid configuration")?;

    let Some((mcu, sensor)) = connect_sources(&config, args.demo).await? else {
        // A missing microcontroller ends the session with exit code 0
        return Ok(());
    };

    let mut scheduler = Scheduler::new(&config, FileLogger::new(&config.log.directory));
    let handle = scheduler.handle();
    let mut events = scheduler
        .take_events()
        .context("acquisition events already taken")?;
    scheduler
        .spawn(mcu, sensor, ConsoleView::new())
        .context("starting acquisition")?;

    let mut pending_comments = args.comments.clone();
    if args.record {
        if let Err(e) = handle
            .start_recording(std::mem::take(&mut pending_comments))
            .await
        {
            eprintln!("\nERROR: Could not start recording: {e}");
        }
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(event) = events.recv() => report(&event),
            line = stdin.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        stdin_open = false;
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!("stdin: {}", e);
                        stdin_open = false;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<OperatorCommand>() {
                    Ok(OperatorCommand::Quit) => break,
                    Ok(command) => execute(command, &handle, &mut pending_comments).await,
                    Err(e) => eprintln!("\n{e}"),
                }
            }
        }
    }

    println!();
    scheduler.shutdown().await;
    Ok(())
}

async fn execute(
    command: OperatorCommand,
    handle: &AcquisitionHandle,
    pending_comments: &mut Vec<String>,
) {
    match command {
        OperatorCommand::ToggleRecording => {
            if handle.is_recording().await {
                if let Err(e) = handle.stop_recording().await {
                    eprintln!("\nERROR: Could not close the log file: {e}");
                }
            } else {
                let comments = std::mem::take(pending_comments);
                if let Err(e) = handle.start_recording(comments.clone()).await {
                    eprintln!("\nERROR: Could not start recording: {e}");
                    *pending_comments = comments;
                }
            }
        }
        OperatorCommand::Comment(text) => {
            pending_comments.extend(LogHeader::comment_lines(&text));
            eprintln!("\n{} comment line(s) pending", pending_comments.len());
        }
        OperatorCommand::ClearComments => pending_comments.clear(),
        OperatorCommand::ClearHistory => handle.clear_history().await,
        OperatorCommand::Help => eprintln!("\n{HELP}"),
        OperatorCommand::Quit => {}
    }
}

fn report(event: &AcquisitionEvent) {
    match event {
        AcquisitionEvent::ConnectionLost { source } => {
            eprintln!("\nLOST CONNECTION to {source}. Acquisition halted, press 'q' to quit.");
        }
        AcquisitionEvent::RecordingStarted(path) => {
            eprintln!("\nRecording to {}", path.display());
        }
        AcquisitionEvent::RecordingStopped(path) => {
            eprintln!("\nSaved {}", path.display());
        }
        AcquisitionEvent::RecordingFailed(reason) => {
            eprintln!("\nERROR: Recording stopped: {reason}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_defaults_to_run() {
        let cli = Cli::try_parse_from(["bubblelog", "--demo", "--comment", "a", "--comment", "b"])
            .unwrap();
        assert!(cli.command.is_none());
        assert!(cli.run.demo);
        assert_eq!(cli.run.comments, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cli.run.config, PathBuf::from("config/bubblelog.json"));
    }

    #[test]
    fn test_cli_inspect() {
        let cli = Cli::try_parse_from(["bubblelog", "inspect", "x.txt"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Inspect { file }) if file == PathBuf::from("x.txt")));
    }

    #[tokio::test]
    async fn test_toggle_recording_consumes_comments() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(&AcquisitionConfig::default(), FileLogger::new(dir.path()));
        let handle = scheduler.handle();
        let mut pending = vec!["note A".to_string()];

        execute(OperatorCommand::ToggleRecording, &handle, &mut pending).await;
        assert!(handle.is_recording().await);
        assert!(pending.is_empty());

        execute(OperatorCommand::ToggleRecording, &handle, &mut pending).await;
        assert!(!handle.is_recording().await);
        scheduler.shutdown().await;
    }
}
