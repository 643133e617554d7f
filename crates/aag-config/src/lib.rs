//! Configuration for the AAG CloudWatcher service.
//!
//! Three layers, lowest to highest precedence: built-in defaults, an
//! optional TOML file, and environment variables. Env vars win so a
//! container deployment can override a checked-in TOML file without a
//! rebuild.

use std::path::Path;

use serde::Deserialize;

use aag_core::{IgnoreUnsafe, Thresholds};

const DEFAULT_CONFIG_FILE_ENV: &str = "AAG_CONFIG_FILE";
const DEFAULT_CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "AAG_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("parsing config file {path}: {source}")]
    Toml { path: String, #[source] source: toml::de::Error },
    #[error("reading environment variables: {0}")]
    Env(#[from] envy::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaterConfig {
    pub min_power: u16,
    pub low_temp: f64,
    pub low_delta: f64,
    pub high_temp: f64,
    pub high_delta: f64,
    pub impulse_temp: f64,
    pub impulse_duration_s: u64,
    pub impulse_cycle_s: u64,
}

impl Default for HeaterConfig {
    fn default() -> Self {
        Self {
            min_power: 0,
            low_temp: 0.0,
            low_delta: 6.0,
            high_temp: 20.0,
            high_delta: 4.0,
            impulse_temp: 10.0,
            impulse_duration_s: 60,
            impulse_cycle_s: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationConfig {
    pub elevation_m: f64,
    pub timezone: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self { elevation_m: 100.0, timezone: "US/Hawaii".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AagConfig {
    pub serial_port: String,
    pub capture_delay_s: u64,
    pub safety_delay_s: u64,
    pub num_readings: usize,
    pub sq_reference: f64,
    pub have_heater: bool,
    pub verbose_logging: bool,
    pub solo_snapshot_path: Option<String>,
    pub ignore_unsafe: IgnoreUnsafe,
    pub thresholds: Thresholds,
    pub heater: HeaterConfig,
    pub location: LocationConfig,
}

impl Default for AagConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyUSB0".to_string(),
            capture_delay_s: 30,
            safety_delay_s: 15,
            num_readings: 10,
            sq_reference: 19.6,
            have_heater: false,
            verbose_logging: false,
            solo_snapshot_path: None,
            ignore_unsafe: IgnoreUnsafe::default(),
            thresholds: Thresholds::default(),
            heater: HeaterConfig::default(),
            location: LocationConfig::default(),
        }
    }
}

/// Mirrors `AagConfig`'s flat fields, all optional, for deserializing a
/// TOML overlay where any field may be absent.
#[derive(Debug, Default, Deserialize)]
struct TomlOverlay {
    serial_port: Option<String>,
    capture_delay_s: Option<u64>,
    safety_delay_s: Option<u64>,
    num_readings: Option<usize>,
    sq_reference: Option<f64>,
    have_heater: Option<bool>,
    verbose_logging: Option<bool>,
    solo_snapshot_path: Option<String>,
    ignore_unsafe: Option<Vec<String>>,
    thresholds: Option<TomlThresholds>,
    heater: Option<TomlHeater>,
    location: Option<TomlLocation>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlThresholds {
    cloudy: Option<f64>,
    very_cloudy: Option<f64>,
    windy: Option<f64>,
    very_windy: Option<f64>,
    gusty: Option<f64>,
    very_gusty: Option<f64>,
    wet: Option<i64>,
    rainy: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlHeater {
    min_power: Option<u16>,
    low_temp: Option<f64>,
    low_delta: Option<f64>,
    high_temp: Option<f64>,
    high_delta: Option<f64>,
    impulse_temp: Option<f64>,
    impulse_duration_s: Option<u64>,
    impulse_cycle_s: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlLocation {
    elevation_m: Option<f64>,
    timezone: Option<String>,
}

fn apply_toml_overlay(mut config: AagConfig, overlay: TomlOverlay) -> AagConfig {
    if let Some(v) = overlay.serial_port {
        config.serial_port = v;
    }
    if let Some(v) = overlay.capture_delay_s {
        config.capture_delay_s = v;
    }
    if let Some(v) = overlay.safety_delay_s {
        config.safety_delay_s = v;
    }
    if let Some(v) = overlay.num_readings {
        config.num_readings = v;
    }
    if let Some(v) = overlay.sq_reference {
        config.sq_reference = v;
    }
    if let Some(v) = overlay.have_heater {
        config.have_heater = v;
    }
    if let Some(v) = overlay.verbose_logging {
        config.verbose_logging = v;
    }
    if let Some(v) = overlay.solo_snapshot_path {
        config.solo_snapshot_path = Some(v);
    }
    if let Some(v) = overlay.ignore_unsafe {
        config.ignore_unsafe = parse_ignore_unsafe(&v.join(","));
    }
    if let Some(t) = overlay.thresholds {
        if let Some(v) = t.cloudy {
            config.thresholds.cloudy = v;
        }
        if let Some(v) = t.very_cloudy {
            config.thresholds.very_cloudy = v;
        }
        if let Some(v) = t.windy {
            config.thresholds.windy = v;
        }
        if let Some(v) = t.very_windy {
            config.thresholds.very_windy = v;
        }
        if let Some(v) = t.gusty {
            config.thresholds.gusty = v;
        }
        if let Some(v) = t.very_gusty {
            config.thresholds.very_gusty = v;
        }
        if let Some(v) = t.wet {
            config.thresholds.wet = v;
        }
        if let Some(v) = t.rainy {
            config.thresholds.rainy = v;
        }
    }
    if let Some(h) = overlay.heater {
        if let Some(v) = h.min_power {
            config.heater.min_power = v;
        }
        if let Some(v) = h.low_temp {
            config.heater.low_temp = v;
        }
        if let Some(v) = h.low_delta {
            config.heater.low_delta = v;
        }
        if let Some(v) = h.high_temp {
            config.heater.high_temp = v;
        }
        if let Some(v) = h.high_delta {
            config.heater.high_delta = v;
        }
        if let Some(v) = h.impulse_temp {
            config.heater.impulse_temp = v;
        }
        if let Some(v) = h.impulse_duration_s {
            config.heater.impulse_duration_s = v;
        }
        if let Some(v) = h.impulse_cycle_s {
            config.heater.impulse_cycle_s = v;
        }
    }
    if let Some(l) = overlay.location {
        if let Some(v) = l.elevation_m {
            config.location.elevation_m = v;
        }
        if let Some(v) = l.timezone {
            config.location.timezone = v;
        }
    }
    config
}

/// Top-level scalar fields only. `envy` deserializes flat `AAG_`-prefixed
/// env vars into this; nested `THRESHOLDS__`/`HEATER__`/`LOCATION__`
/// groups aren't representable here (envy doesn't resolve `__`-nested
/// keys into nested structs) and are applied separately below.
#[derive(Debug, Default, Deserialize)]
struct FlatEnvOverlay {
    #[serde(rename = "serial_port")]
    serial_port: Option<String>,
    #[serde(rename = "capture_delay")]
    capture_delay_s: Option<u64>,
    #[serde(rename = "safety_delay")]
    safety_delay_s: Option<u64>,
    #[serde(rename = "num_readings")]
    num_readings: Option<usize>,
    #[serde(rename = "sq_reference")]
    sq_reference: Option<f64>,
    #[serde(rename = "have_heater")]
    have_heater: Option<bool>,
    #[serde(rename = "verbose_logging")]
    verbose_logging: Option<bool>,
    #[serde(rename = "solo_data_file_path")]
    solo_snapshot_path: Option<String>,
    #[serde(rename = "ignore_unsafe")]
    ignore_unsafe: Option<String>,
}

fn apply_flat_env_overlay(mut config: AagConfig, overlay: FlatEnvOverlay) -> AagConfig {
    if let Some(v) = overlay.serial_port {
        config.serial_port = v;
    }
    if let Some(v) = overlay.capture_delay_s {
        config.capture_delay_s = v;
    }
    if let Some(v) = overlay.safety_delay_s {
        config.safety_delay_s = v;
    }
    if let Some(v) = overlay.num_readings {
        config.num_readings = v;
    }
    if let Some(v) = overlay.sq_reference {
        config.sq_reference = v;
    }
    if let Some(v) = overlay.have_heater {
        config.have_heater = v;
    }
    if let Some(v) = overlay.verbose_logging {
        config.verbose_logging = v;
    }
    if let Some(v) = overlay.solo_snapshot_path {
        config.solo_snapshot_path = Some(v);
    }
    if let Some(v) = overlay.ignore_unsafe {
        config.ignore_unsafe = parse_ignore_unsafe(&v);
    }
    config
}

fn parse_ignore_unsafe(raw: &str) -> IgnoreUnsafe {
    let mut ignore = IgnoreUnsafe::default();
    for token in raw.split(',') {
        match token.trim().to_ascii_lowercase().as_str() {
            "cloud" => ignore.cloud = true,
            "wind" => ignore.wind = true,
            "rain" => ignore.rain = true,
            "" => {}
            _ => {}
        }
    }
    ignore
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u16(key: &str) -> Option<u16> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Applies `AAG_THRESHOLDS__*`, `AAG_HEATER__*`, and `AAG_LOCATION__*`
/// directly from the process environment, since `envy` has no concept of
/// the `__` nesting delimiter.
fn apply_nested_env_overlay(mut config: AagConfig) -> AagConfig {
    if let Some(v) = env_f64("AAG_THRESHOLDS__CLOUDY") {
        config.thresholds.cloudy = v;
    }
    if let Some(v) = env_f64("AAG_THRESHOLDS__VERY_CLOUDY") {
        config.thresholds.very_cloudy = v;
    }
    if let Some(v) = env_f64("AAG_THRESHOLDS__WINDY") {
        config.thresholds.windy = v;
    }
    if let Some(v) = env_f64("AAG_THRESHOLDS__VERY_WINDY") {
        config.thresholds.very_windy = v;
    }
    if let Some(v) = env_f64("AAG_THRESHOLDS__GUSTY") {
        config.thresholds.gusty = v;
    }
    if let Some(v) = env_f64("AAG_THRESHOLDS__VERY_GUSTY") {
        config.thresholds.very_gusty = v;
    }
    if let Some(v) = env_i64("AAG_THRESHOLDS__WET") {
        config.thresholds.wet = v;
    }
    if let Some(v) = env_i64("AAG_THRESHOLDS__RAINY") {
        config.thresholds.rainy = v;
    }

    if let Some(v) = env_u16("AAG_HEATER__MIN_POWER") {
        config.heater.min_power = v;
    }
    if let Some(v) = env_f64("AAG_HEATER__LOW_TEMP") {
        config.heater.low_temp = v;
    }
    if let Some(v) = env_f64("AAG_HEATER__LOW_DELTA") {
        config.heater.low_delta = v;
    }
    if let Some(v) = env_f64("AAG_HEATER__HIGH_TEMP") {
        config.heater.high_temp = v;
    }
    if let Some(v) = env_f64("AAG_HEATER__HIGH_DELTA") {
        config.heater.high_delta = v;
    }
    if let Some(v) = env_f64("AAG_HEATER__IMPULSE_TEMP") {
        config.heater.impulse_temp = v;
    }
    if let Some(v) = env_u64("AAG_HEATER__IMPULSE_DURATION_S") {
        config.heater.impulse_duration_s = v;
    }
    if let Some(v) = env_u64("AAG_HEATER__IMPULSE_CYCLE_S") {
        config.heater.impulse_cycle_s = v;
    }

    if let Some(v) = env_f64("AAG_LOCATION__ELEVATION_M") {
        config.location.elevation_m = v;
    }
    if let Some(v) = env_string("AAG_LOCATION__TIMEZONE") {
        config.location.timezone = v;
    }

    config
}

impl AagConfig {
    /// Loads defaults, overlays an optional TOML file (path from
    /// `AAG_CONFIG_FILE`, default `config.toml`, missing file is not an
    /// error), then overlays environment variables, which win.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = AagConfig::default();

        let config_path = std::env::var(DEFAULT_CONFIG_FILE_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        config = Self::apply_toml_file(config, Path::new(&config_path))?;

        config = Self::apply_env(config)?;

        Ok(config)
    }

    fn apply_toml_file(config: AagConfig, path: &Path) -> Result<AagConfig, ConfigError> {
        if !path.exists() {
            return Ok(config);
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        let overlay: TomlOverlay = toml::from_str(&contents)
            .map_err(|source| ConfigError::Toml { path: path.display().to_string(), source })?;
        Ok(apply_toml_overlay(config, overlay))
    }

    fn apply_env(config: AagConfig) -> Result<AagConfig, ConfigError> {
        let overlay: FlatEnvOverlay = envy::prefixed(ENV_PREFIX).from_env()?;
        let config = apply_flat_env_overlay(config, overlay);
        Ok(apply_nested_env_overlay(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_original_driver_settings() {
        let config = AagConfig::default();
        assert_eq!(config.serial_port, "/dev/ttyUSB0");
        assert_eq!(config.capture_delay_s, 30);
        assert_eq!(config.num_readings, 10);
        assert_eq!(config.heater.high_temp, 20.0);
        assert_eq!(config.location.elevation_m, 100.0);
        assert_eq!(config.location.timezone, "US/Hawaii");
    }

    #[test]
    fn toml_overlay_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            serial_port = "/dev/ttyS1"
            capture_delay_s = 45

            [thresholds]
            cloudy = -30.0

            [heater]
            min_power = 10

            [location]
            timezone = "UTC"
            "#
        )
        .unwrap();

        let config = AagConfig::apply_toml_file(AagConfig::default(), file.path()).unwrap();
        assert_eq!(config.serial_port, "/dev/ttyS1");
        assert_eq!(config.capture_delay_s, 45);
        assert_eq!(config.thresholds.cloudy, -30.0);
        assert_eq!(config.heater.min_power, 10);
        assert_eq!(config.location.timezone, "UTC");
        // untouched fields keep their defaults
        assert_eq!(config.num_readings, 10);
    }

    #[test]
    fn missing_toml_file_is_not_an_error() {
        let config = AagConfig::apply_toml_file(AagConfig::default(), Path::new("/does/not/exist.toml")).unwrap();
        assert_eq!(config, AagConfig::default());
    }

    #[test]
    fn parse_ignore_unsafe_accepts_comma_separated_domains() {
        let ignore = parse_ignore_unsafe("cloud, rain");
        assert!(ignore.cloud);
        assert!(!ignore.wind);
        assert!(ignore.rain);
    }

    #[test]
    fn nested_env_overlay_reads_double_underscore_keys() {
        std::env::set_var("AAG_THRESHOLDS__CLOUDY", "-40");
        std::env::set_var("AAG_LOCATION__TIMEZONE", "US/Hawaii");
        let config = apply_nested_env_overlay(AagConfig::default());
        assert_eq!(config.thresholds.cloudy, -40.0);
        assert_eq!(config.location.timezone, "US/Hawaii");
        std::env::remove_var("AAG_THRESHOLDS__CLOUDY");
        std::env::remove_var("AAG_LOCATION__TIMEZONE");
    }
}
