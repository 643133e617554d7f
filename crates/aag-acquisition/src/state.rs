//! Read-only snapshot shared between the Acquisition Loop and HTTP handlers.
//!
//! Written only by the loop; handlers only ever read a clone of the
//! snapshot. No handler touches the transport.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, FixedOffset};

use aag_core::{ConnectionStatus, Reading};

use crate::session::SensorSession;

#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    pub status: ConnectionStatus,
    pub sensor_name: Option<String>,
    pub serial_port: String,
    pub firmware_version: Option<f64>,
    pub serial_number: Option<String>,
    pub last_successful_read_at: Option<DateTime<FixedOffset>>,
    pub last_error_message: Option<String>,
    pub last_connection_attempt_at: Option<DateTime<FixedOffset>>,
    pub capture_delay_s: u64,
    pub readings_buffer_size: usize,
    pub readings: Vec<Reading>,
}

impl StateSnapshot {
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.last()
    }
}

/// Shared handle updated by the Acquisition Loop, read by HTTP handlers.
pub struct SharedState {
    inner: tokio::sync::RwLock<StateSnapshot>,
    ready: AtomicBool,
}

impl SharedState {
    pub fn new(serial_port: String, capture_delay_s: u64, readings_buffer_size: usize) -> Self {
        Self {
            inner: tokio::sync::RwLock::new(StateSnapshot {
                serial_port,
                capture_delay_s,
                readings_buffer_size,
                ..Default::default()
            }),
            ready: AtomicBool::new(false),
        }
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        self.inner.read().await.clone()
    }

    /// Refresh the published snapshot from the session's current state.
    pub async fn update_from_session(&self, session: &SensorSession) {
        let mut guard = self.inner.write().await;
        guard.status = session.status();
        guard.sensor_name = session.identity().map(|i| i.name.clone());
        guard.firmware_version = session.identity().map(|i| i.firmware_version);
        guard.serial_number = session.identity().map(|i| i.serial_number.clone());
        guard.last_successful_read_at = session.last_successful_read_at();
        guard.last_error_message = session.last_error_message().map(str::to_string);
        guard.last_connection_attempt_at = session.last_connection_attempt_at();
        guard.readings = session.ring().snapshot();
    }

    /// First connect attempt has completed (success or failure).
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}
