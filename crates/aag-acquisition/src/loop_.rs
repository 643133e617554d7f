//! Acquisition Loop: the cooperative task that repeatedly drives a
//! `SensorSession`, publishes a shared snapshot, and optionally writes a
//! SOLO snapshot file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;

use aag_core::{ConnectionStatus, Reading, SensorIdentity};

use crate::session::SensorSession;
use crate::solo::reading_to_solo;
use crate::state::SharedState;

pub struct AcquisitionLoop {
    session: SensorSession,
    state: Arc<SharedState>,
    capture_delay: Duration,
    solo_snapshot_path: Option<PathBuf>,
    capture_output_path: Option<PathBuf>,
}

impl AcquisitionLoop {
    pub fn new(
        session: SensorSession,
        state: Arc<SharedState>,
        capture_delay: Duration,
        solo_snapshot_path: Option<PathBuf>,
    ) -> Self {
        Self { session, state, capture_delay, solo_snapshot_path, capture_output_path: None }
    }

    /// Appends each successful reading as a JSON line to `path`, for the
    /// `capture --output` CLI mode.
    pub fn with_capture_output(mut self, path: PathBuf) -> Self {
        self.capture_output_path = Some(path);
        self
    }

    /// Runs until `shutdown` reports `true`. Cancellation is cooperative:
    /// only checked at the inter-tick sleep, never mid-command. Closes the
    /// transport on every exit path.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.tick().await;
            self.state.mark_ready();

            tokio::select! {
                _ = tokio::time::sleep(self.capture_delay) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.session.close();
        tracing::info!("acquisition loop stopped, transport closed");
    }

    async fn tick(&mut self) {
        let prev_status = self.session.status();

        if prev_status != ConnectionStatus::Connected {
            if let Err(e) = self.session.connect().await {
                tracing::warn!(error = %e, "connect attempt failed");
            }
        } else {
            match self.session.get_reading().await {
                Ok(Some(reading)) => {
                    tracing::debug!("acquisition cycle succeeded");
                    if let Some(path) = self.solo_snapshot_path.clone() {
                        let identity = self.session.identity().cloned();
                        if let Err(e) = write_solo_snapshot(&path, &reading, identity.as_ref()).await {
                            tracing::warn!(error = %e, "failed to write solo snapshot");
                        }
                    }
                    if let Some(path) = self.capture_output_path.clone() {
                        if let Err(e) = append_reading(&path, &reading).await {
                            tracing::warn!(error = %e, "failed to append reading to capture output");
                        }
                    }
                }
                Ok(None) => {
                    tracing::warn!("reading discarded after a communication error");
                }
                Err(state_err) => {
                    tracing::error!(error = %state_err, "get_reading invoked in wrong state");
                }
            }
        }

        let new_status = self.session.status();
        if new_status != prev_status {
            tracing::info!(from = %prev_status, to = %new_status, message = self.session.last_error_message().unwrap_or(""), "connection status changed");
        }

        self.state.update_from_session(&self.session).await;
    }
}

/// Appends one JSON line per reading, following the append-only sink
/// idiom (create-if-missing, open in append mode, newline-delimited).
async fn append_reading(path: &Path, reading: &Reading) -> anyhow::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .context("opening capture output file")?;
    let mut line = serde_json::to_string(reading).context("serializing reading")?;
    line.push('\n');
    file.write_all(line.as_bytes()).await.context("appending reading")?;
    Ok(())
}

async fn write_solo_snapshot(path: &Path, reading: &Reading, identity: Option<&SensorIdentity>) -> anyhow::Result<()> {
    let solo = reading_to_solo(reading, identity);
    let json = serde_json::to_vec_pretty(&solo).context("serializing solo snapshot")?;

    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, &json).await.context("writing temp solo snapshot")?;
    tokio::fs::rename(&tmp_path, path).await.context("renaming solo snapshot into place")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aag_core::{IgnoreUnsafe, Thresholds};
    use crate::session::SessionConfig;
    use chrono_tz::Tz;

    fn session() -> SensorSession {
        SensorSession::new(SessionConfig {
            serial_port: "/dev/null".to_string(),
            settle_delay: Duration::from_millis(0),
            have_heater: false,
            heater_min_power: 0,
            sq_reference: 19.6,
            elevation_m: 0.0,
            timezone: Tz::UTC,
            num_readings: 5,
            thresholds: Thresholds::default(),
            ignore_unsafe: IgnoreUnsafe::default(),
        })
    }

    #[tokio::test]
    async fn append_reading_writes_newline_delimited_json() {
        use aag_core::{CloudCondition, RainCondition, SwitchState, WindCondition};
        use chrono::{FixedOffset, TimeZone};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.jsonl");

        let tz = FixedOffset::east_opt(0).unwrap();
        let reading = Reading {
            timestamp: tz.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap(),
            sky_temp: -10.0,
            ambient_temp: 15.0,
            rh_sensor_temp: Some(15.0),
            pressure_temp: Some(15.0),
            wind_speed: None,
            rain_frequency: 2600,
            humidity: Some(50.0),
            pressure: Some(90000.0),
            sea_level_pressure: Some(101000.0),
            dew_point: Some(5.0),
            light_period_raw: None,
            ambient_ntc_raw: 0,
            ldr_raw: 0,
            zener_raw: 0,
            rain_ntc_raw: 0,
            sky_quality_mpsas: None,
            pwm: None,
            switch_state: SwitchState::Open,
            cloud_condition: CloudCondition::Clear,
            wind_condition: WindCondition::Calm,
            rain_condition: RainCondition::Dry,
            cloud_safe: true,
            wind_safe: true,
            rain_safe: true,
            is_safe: true,
            internal_errors: Some([0, 0, 0, 0]),
        };

        append_reading(&path, &reading).await.unwrap();
        append_reading(&path, &reading).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["rain_frequency"], serde_json::json!(2600));
        }
    }

    #[tokio::test]
    async fn shutdown_before_first_tick_still_closes_transport_and_marks_no_ready() {
        let state = Arc::new(SharedState::new("/dev/null".to_string(), 1, 5));
        let mut acquisition = AcquisitionLoop::new(session(), Arc::clone(&state), Duration::from_millis(10), None);
        let (tx, rx) = watch::channel(true);
        drop(tx);
        acquisition.run(rx).await;
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn a_failed_connect_attempt_marks_ready_after_first_tick() {
        let state = Arc::new(SharedState::new("/dev/does/not/exist".to_string(), 1, 5));
        let mut acquisition = AcquisitionLoop::new(session(), Arc::clone(&state), Duration::from_millis(5), None);
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });
        acquisition.run(rx).await;
        assert!(state.is_ready());
        let snap = state.snapshot().await;
        assert_eq!(snap.status, ConnectionStatus::Error);
    }
}
