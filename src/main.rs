// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarm-monitor

//! Alarm Monitor - keeps a dashboard display awake while alarms are live
//!
//! Polls the alarm feed on a fixed interval, filters the records with the
//! configured rules and switches the TV on while any alarm is active.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{reload, EnvFilter, FmtSubscriber};

use alarm_monitor::{config::resolve_path, device::DeviceKind, Config, Monitor, VERSION};

/// Alarm Monitor - dashboard display control for alarm feeds
#[derive(Parser, Debug)]
#[command(name = "alarm-monitor")]
#[command(author = "bad-antics")]
#[command(version = VERSION)]
#[command(about = "Keeps a dashboard TV on while alarms are active")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,

    /// Filter rules file (overrides the config)
    #[arg(long)]
    filter: Option<String>,

    /// Display controller: webos or cec
    #[arg(long, value_parser = parse_kind)]
    device: Option<DeviceKind>,
}

fn parse_kind(value: &str) -> Result<DeviceKind, String> {
    match value.to_lowercase().as_str() {
        "webos" => Ok(DeviceKind::Webos),
        "cec" => Ok(DeviceKind::Cec),
        other => Err(format!("unknown device kind '{}', expected webos or cec", other)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; the config's level applies once it is loaded
    let initial_level = if args.trace {
        "trace"
    } else if args.debug {
        "debug"
    } else {
        "info"
    };

    let (subscriber, set_level) = log_subscriber(initial_level, args.debug, true, std::io::stdout);
    tracing::subscriber::set_global_default(subscriber)?;

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    if !args.trace && !args.debug {
        if let Err(e) = set_level(&config.log_level) {
            warn!("Could not apply log level '{}': {}", config.log_level, e);
        }
    }

    info!("Alarm Monitor v{}", VERSION);
    info!("Configuration loaded from {:?}", config_path);

    // Override with command line args
    if let Some(kind) = args.device {
        config.device.kind = kind;
    }
    let filter_path = match &args.filter {
        Some(path) => resolve_path(path, &std::env::current_dir()?),
        None => config.filter_path(&config_path),
    };
    info!("Filter rules: {:?}", filter_path);
    info!("Display controller: {:?}", config.device.kind);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config, filter_path, args.once))
}

/// Formatting subscriber starting at `level`, plus a setter that swaps the level later.
fn log_subscriber<W>(
    level: &str,
    verbose: bool,
    ansi: bool,
    writer: W,
) -> (
    impl tracing::Subscriber + Send + Sync + 'static,
    impl Fn(&str) -> Result<(), reload::Error>,
)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let builder = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(writer)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(verbose)
        .with_line_number(verbose)
        .with_ansi(ansi)
        .with_filter_reloading();

    let handle = builder.reload_handle();
    let set_level = move |level: &str| handle.reload(EnvFilter::new(level));
    (builder.finish(), set_level)
}

async fn run(config: Config, filter_path: PathBuf, once: bool) -> Result<()> {
    let mut monitor = Monitor::from_config(&config, filter_path)?;

    if once {
        let report = monitor.run_once().await;
        info!(
            "Fetched {}, detected {}, active {}, display {:?}",
            report.fetched, report.detected, report.active, report.action
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, cleaning up..."),
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    info!("Monitoring alarms, press Ctrl+C to shutdown");
    monitor.run(shutdown_rx).await?;

    info!("Alarm Monitor shutdown complete");
    Ok(())
}
