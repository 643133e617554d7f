//! Core data types for weather observations.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Health of the serial session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Initializing,
    Connected,
    Disconnected,
    Error,
    AttemptingReconnect,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus::Initializing
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionStatus::Initializing => "initializing",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
            ConnectionStatus::AttemptingReconnect => "attempting_reconnect",
        };
        f.write_str(s)
    }
}

/// Position of the rain/dew switch relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchState {
    Open,
    Closed,
    Unknown,
}

/// Cloud condition bucket derived from sky-minus-ambient temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudCondition {
    Clear,
    Cloudy,
    VeryCloudy,
    Unknown,
}

/// Wind condition bucket, strictly ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindCondition {
    Unknown,
    Calm,
    Windy,
    VeryWindy,
    Gusty,
    VeryGusty,
}

/// Rain condition bucket. Rain frequency *decreases* as wetness increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RainCondition {
    Dry,
    Wet,
    Rainy,
    Unknown,
}

/// Static identity and capability flags learned once at `connect` time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorIdentity {
    pub name: String,
    pub firmware_version: f64,
    pub serial_number: String,
    pub has_anemometer: bool,
    pub has_heater: bool,
    /// Firmware exposes the `8 ` light-period block on `GetValues`.
    pub has_light_sensor: bool,
}

/// Internal error counters reported by `GetInternalErrors` (`D!`).
pub type InternalErrors = [u32; 4];

/// One fully populated, safety-classified acquisition cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<FixedOffset>,

    pub sky_temp: f64,
    pub ambient_temp: f64,
    pub rh_sensor_temp: Option<f64>,
    pub pressure_temp: Option<f64>,

    pub wind_speed: Option<f64>,
    pub rain_frequency: i64,

    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub sea_level_pressure: Option<f64>,
    pub dew_point: Option<f64>,

    pub light_period_raw: Option<u32>,
    pub ambient_ntc_raw: u32,
    pub ldr_raw: u32,
    pub zener_raw: u32,
    pub rain_ntc_raw: u32,

    pub sky_quality_mpsas: Option<f64>,

    pub pwm: Option<f64>,

    pub switch_state: SwitchState,

    pub cloud_condition: CloudCondition,
    pub wind_condition: WindCondition,
    pub rain_condition: RainCondition,

    pub cloud_safe: bool,
    pub wind_safe: bool,
    pub rain_safe: bool,
    pub is_safe: bool,

    pub internal_errors: Option<InternalErrors>,
}
