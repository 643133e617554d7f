//! Third-party-compatible "SOLO" JSON snapshot schema.

use chrono::Utc;
use serde::{Serialize, Serializer};

use aag_core::{Reading, SensorIdentity, SwitchState};

#[derive(Debug, Clone, Copy)]
enum SwitchField {
    Open,
    Close,
    Unknown,
}

impl Serialize for SwitchField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SwitchField::Open => serializer.serialize_str("open"),
            SwitchField::Close => serializer.serialize_str("close"),
            SwitchField::Unknown => serializer.serialize_i64(0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SoloSnapshot {
    #[serde(rename = "dataGMTTime")]
    pub data_gmt_time: String,
    pub cwinfo: String,
    pub clouds: f64,
    pub temp: f64,
    pub wind: f64,
    pub gust: f64,
    pub rain: i64,
    pub lightmpsas: f64,
    switch: SwitchField,
    pub safe: u8,
    pub hum: i64,
    pub dewp: f64,
    pub rawir: f64,
    pub abspress: f64,
    pub relpress: f64,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Missing fields default to zero, per the SOLO schema contract.
pub fn reading_to_solo(reading: &Reading, identity: Option<&SensorIdentity>) -> SoloSnapshot {
    let serial_number = identity.map(|i| i.serial_number.clone()).unwrap_or_default();
    let firmware_version = identity.map(|i| i.firmware_version).unwrap_or(0.0);
    let wind = reading.wind_speed.unwrap_or(0.0);

    let switch = match reading.switch_state {
        SwitchState::Open => SwitchField::Open,
        SwitchState::Closed => SwitchField::Close,
        SwitchState::Unknown => SwitchField::Unknown,
    };

    SoloSnapshot {
        data_gmt_time: reading.timestamp.with_timezone(&Utc).format("%Y/%m/%d %H:%M:%S").to_string(),
        cwinfo: format!("Serial: {serial_number}, FW: {firmware_version}"),
        clouds: round2(reading.sky_temp - reading.ambient_temp),
        temp: round2(reading.ambient_temp),
        wind: round2(wind),
        gust: round2(wind),
        rain: reading.rain_frequency,
        lightmpsas: round2(reading.sky_quality_mpsas.unwrap_or(0.0)),
        switch,
        safe: u8::from(reading.is_safe),
        hum: reading.humidity.unwrap_or(0.0).round() as i64,
        dewp: round2(reading.dew_point.unwrap_or(0.0)),
        rawir: round2(reading.sky_temp),
        abspress: round2(reading.pressure.unwrap_or(0.0) / 100.0),
        relpress: round2(reading.sea_level_pressure.unwrap_or(0.0) / 100.0),
    }
}
