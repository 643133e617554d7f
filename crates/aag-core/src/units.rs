//! Raw sensor count to physical unit conversions, and the derived
//! quantities computed from them (dew point, sea-level pressure, sky
//! quality). All pure, no I/O.

/// Firmware version at/above which the wind-speed formula adds the +3 km/h
/// offset. Below this, only the multiplier applies. See DESIGN.md for the
/// rationale (this mirrors the firmware-gating precedent the original
/// driver applies to its serial-number query).
pub const WIND_FORMULA_FIRMWARE_THRESHOLD: f64 = 5.6;

pub fn sky_temp_c(raw: i32) -> f64 {
    raw as f64 / 100.0
}

pub fn ambient_temp_c_ir(raw: i32) -> f64 {
    raw as f64 / 100.0
}

pub fn rh_sensor_temp_c(raw: u32) -> f64 {
    raw as f64 * 172.72 / 65536.0 - 46.85
}

pub fn humidity_pct(raw: u32) -> f64 {
    raw as f64 * 125.0 / 65536.0 - 6.0
}

pub fn pressure_pa(raw: u32) -> f64 {
    raw as f64 / 16.0
}

pub fn pressure_temp_c(raw: u32) -> f64 {
    raw as f64 / 100.0
}

pub fn pwm_pct(raw: u32) -> f64 {
    raw as f64 * 100.0 / 1023.0
}

/// Wind speed in km/h, gated on firmware generation.
///
/// A raw reading of zero is always reported as zero, regardless of
/// generation (the device reports zero for "no wind", not an offset).
pub fn wind_speed_kph(raw: f64, firmware_version: f64) -> f64 {
    if raw == 0.0 {
        return 0.0;
    }
    if firmware_version >= WIND_FORMULA_FIRMWARE_THRESHOLD {
        raw * 0.84 + 3.0
    } else {
        raw * 0.84
    }
}

const MAGNUS_A: f64 = 17.625;
const MAGNUS_B: f64 = 243.04;

/// Dew point via the Magnus formula. Returns `None` if the relative
/// humidity is outside `(0, 100]`.
pub fn dew_point_c(temp_c: f64, relative_humidity_pct: f64) -> Option<f64> {
    if !(relative_humidity_pct > 0.0 && relative_humidity_pct <= 100.0) {
        return None;
    }
    let gamma = (MAGNUS_A * temp_c) / (MAGNUS_B + temp_c) + (relative_humidity_pct / 100.0).ln();
    Some(MAGNUS_B * gamma / (MAGNUS_A - gamma))
}

/// Reduce station-level absolute pressure to sea level given station
/// temperature and elevation. Falls back to the absolute pressure,
/// unchanged, if the base of the exponent is non-positive (numerically
/// undefined at that elevation/temperature combination) — the caller is
/// expected to log this case.
pub fn sea_level_pressure_pa(station_pressure_pa: f64, station_temp_c: f64, elevation_m: f64) -> f64 {
    let base = 1.0 - 0.0065 * elevation_m / (station_temp_c + 0.0065 * elevation_m + 273.15);
    if base <= 0.0 {
        return station_pressure_pa;
    }
    station_pressure_pa * base.powf(-5.275)
}

/// Sky brightness in magnitudes per square arcsecond. `None` if the raw
/// light period is non-positive (sensor absent or not yet warmed up).
pub fn sky_quality_mpsas(light_period_raw: u32, ambient_temp_c: f64, sq_reference: f64) -> Option<f64> {
    if light_period_raw == 0 {
        return None;
    }
    let p = light_period_raw as f64;
    let m = sq_reference - 2.5 * (250_000.0 / p).log10();
    Some((m - 0.042) + 0.00212 * ambient_temp_c)
}
