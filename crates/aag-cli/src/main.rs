//! CLI entry point: `capture` runs acquisition alone and appends readings
//! to a file; `serve` runs acquisition alongside the HTTP service.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use aag_acquisition::{AcquisitionLoop, SensorSession, SessionConfig, SharedState};
use aag_config::AagConfig;

#[derive(Parser)]
#[command(name = "aag", about = "AAG CloudWatcher weather station driver and HTTP service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run acquisition only; append each reading as a JSON line to `--output`.
    Capture {
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        verbose: bool,
    },
    /// Run acquisition and the HTTP service.
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Capture { output, verbose } => {
            aag_obs::init(verbose);
            let config = AagConfig::load().context("loading configuration")?;
            let (session, shared, capture_delay) = build_session(&config)?;
            let mut acquisition =
                AcquisitionLoop::new(session, shared, capture_delay, config.solo_snapshot_path.clone().map(PathBuf::from))
                    .with_capture_output(output);

            let (_tx, rx) = shutdown_channel();
            acquisition.run(rx).await;
        }
        Command::Serve { host, port } => {
            aag_obs::init(false);
            let config = AagConfig::load().context("loading configuration")?;
            let (session, shared, capture_delay) = build_session(&config)?;
            let mut acquisition = AcquisitionLoop::new(
                session,
                Arc::clone(&shared),
                capture_delay,
                config.solo_snapshot_path.clone().map(PathBuf::from),
            );

            let (app, _app_state) = aag_server::build_app(Arc::clone(&shared));
            let addr: SocketAddr = format!("{host}:{port}").parse().context("invalid --host/--port")?;
            let listener = tokio::net::TcpListener::bind(addr).await.context("binding HTTP listener")?;
            tracing::info!(%addr, "HTTP server listening");

            let (_tx, rx) = shutdown_channel();
            let mut rx_for_server = rx.clone();

            tokio::select! {
                _ = acquisition.run(rx) => {
                    tracing::info!("acquisition loop stopped");
                }
                result = axum::serve(listener, app).with_graceful_shutdown(async move {
                    let _ = rx_for_server.changed().await;
                }) => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "HTTP server error");
                    }
                }
            }
        }
    }

    Ok(())
}

/// Spawns a task that sends `true` on Ctrl-C, for callers to `select!`
/// against alongside their own work.
fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    let tx_for_signal = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx_for_signal.send(true);
        }
    });
    (tx, rx)
}

fn build_session(config: &AagConfig) -> Result<(SensorSession, Arc<SharedState>, Duration)> {
    let timezone = chrono_tz::Tz::from_str(&config.location.timezone)
        .map_err(|_| anyhow::anyhow!("invalid location.timezone: {}", config.location.timezone))?;

    let session_config = SessionConfig {
        serial_port: config.serial_port.clone(),
        settle_delay: aag_protocol::DEFAULT_SETTLE_DELAY,
        have_heater: config.have_heater,
        heater_min_power: config.heater.min_power,
        sq_reference: config.sq_reference,
        elevation_m: config.location.elevation_m,
        timezone,
        num_readings: config.num_readings,
        thresholds: config.thresholds,
        ignore_unsafe: config.ignore_unsafe,
    };

    let capture_delay = Duration::from_secs(config.capture_delay_s);
    let session = SensorSession::new(session_config);
    let shared = Arc::new(SharedState::new(config.serial_port.clone(), config.capture_delay_s, config.num_readings));

    Ok((session, shared, capture_delay))
}
