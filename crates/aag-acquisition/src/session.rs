//! Sensor session: owns the transport and command layer, performs
//! `connect` and a single-read-of-everything `get_reading`.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use aag_core::{
    ambient_temp_c_ir, dew_point_c, humidity_pct, pressure_pa, pressure_temp_c, pwm_pct,
    rh_sensor_temp_c, sea_level_pressure_pa, sky_quality_mpsas, sky_temp_c, wind_speed_kph,
    classify, ConnectionStatus, IgnoreUnsafe, Reading, ReadingRing, SafetyInputs, SensorIdentity,
    Thresholds, WIND_FORMULA_FIRMWARE_THRESHOLD,
};
use aag_protocol::{command, CommError, Transport, TransportError};

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("identity query failed: {0}")]
    Identity(CommError),
    #[error("PWM set rejected: {0}")]
    PwmRejected(CommError),
}

#[derive(Debug, Error)]
#[error("operation requires status {expected}, session is {actual}")]
pub struct StateError {
    pub expected: ConnectionStatus,
    pub actual: ConnectionStatus,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub serial_port: String,
    pub settle_delay: std::time::Duration,
    pub have_heater: bool,
    pub heater_min_power: u16,
    pub sq_reference: f64,
    pub elevation_m: f64,
    pub timezone: Tz,
    pub num_readings: usize,
    pub thresholds: Thresholds,
    pub ignore_unsafe: IgnoreUnsafe,
}

fn now_in_tz(tz: &Tz) -> DateTime<FixedOffset> {
    let now: DateTime<Tz> = Utc::now().with_timezone(tz);
    now.with_timezone(&now.offset().fix())
}

/// Holds identity, connection status, and the bounded reading history.
pub struct SensorSession {
    transport: Transport,
    config: SessionConfig,
    identity: Option<SensorIdentity>,
    status: ConnectionStatus,
    last_error_message: Option<String>,
    last_successful_read_at: Option<DateTime<FixedOffset>>,
    last_connection_attempt_at: Option<DateTime<FixedOffset>>,
    ring: ReadingRing,
}

impl SensorSession {
    pub fn new(config: SessionConfig) -> Self {
        let ring = ReadingRing::new(config.num_readings);
        let transport = Transport::new(&config.serial_port).with_settle_delay(config.settle_delay);
        Self {
            transport,
            config,
            identity: None,
            status: ConnectionStatus::Initializing,
            last_error_message: None,
            last_successful_read_at: None,
            last_connection_attempt_at: None,
            ring,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn identity(&self) -> Option<&SensorIdentity> {
        self.identity.as_ref()
    }

    pub fn last_error_message(&self) -> Option<&str> {
        self.last_error_message.as_deref()
    }

    pub fn last_successful_read_at(&self) -> Option<DateTime<FixedOffset>> {
        self.last_successful_read_at
    }

    pub fn last_connection_attempt_at(&self) -> Option<DateTime<FixedOffset>> {
        self.last_connection_attempt_at
    }

    pub fn ring(&self) -> &ReadingRing {
        &self.ring
    }

    /// Open the transport, query identity, and (if configured) set the
    /// heater to its minimum power. Atomic: either every step succeeds and
    /// status becomes `Connected`, or status becomes `Error` and the
    /// transport is closed.
    pub async fn connect(&mut self) -> Result<(), SensorError> {
        self.last_connection_attempt_at = Some(now_in_tz(&self.config.timezone));

        match self.connect_inner().await {
            Ok(identity) => {
                self.identity = Some(identity);
                self.status = ConnectionStatus::Connected;
                self.last_error_message = None;
                Ok(())
            }
            Err(e) => {
                self.status = ConnectionStatus::Error;
                self.last_error_message = Some(e.to_string());
                self.transport.close();
                Err(e)
            }
        }
    }

    async fn connect_inner(&mut self) -> Result<SensorIdentity, SensorError> {
        self.transport.open().await?;

        let name = command::get_internal_name(&mut self.transport).await.map_err(SensorError::Identity)?;
        let firmware_version = command::get_firmware(&mut self.transport).await.map_err(SensorError::Identity)?;
        let serial_number = command::get_serial_number(&mut self.transport).await.map_err(SensorError::Identity)?;
        let has_anemometer = command::can_get_windspeed(&mut self.transport).await.map_err(SensorError::Identity)?;

        // No separate wire query exists for light-sensor capability; the
        // firmware generation that added it is the same one that changed
        // the wind-speed formula, so the two share a threshold.
        let has_light_sensor = firmware_version >= WIND_FORMULA_FIRMWARE_THRESHOLD;

        if self.config.have_heater {
            command::set_pwm(&mut self.transport, self.config.heater_min_power)
                .await
                .map_err(SensorError::PwmRejected)?;
        }

        Ok(SensorIdentity {
            name,
            firmware_version,
            serial_number,
            has_anemometer,
            has_heater: self.config.have_heater,
            has_light_sensor,
        })
    }

    /// Must only be called while `Connected`. Performs every sub-read in
    /// order; any single communication failure discards the whole reading
    /// (the ring is left unchanged) and transitions status to `Error`.
    pub async fn get_reading(&mut self) -> Result<Option<Reading>, StateError> {
        if self.status != ConnectionStatus::Connected {
            return Err(StateError { expected: ConnectionStatus::Connected, actual: self.status });
        }
        let identity = self.identity.clone().expect("Connected implies identity is set");

        match self.read_everything(&identity).await {
            Ok(reading) => {
                self.last_successful_read_at = Some(reading.timestamp);
                self.ring.push(reading.clone());
                Ok(Some(reading))
            }
            Err(e) => {
                self.status = ConnectionStatus::Error;
                self.last_error_message = Some(e.to_string());
                Ok(None)
            }
        }
    }

    async fn read_everything(&mut self, identity: &SensorIdentity) -> Result<Reading, CommError> {
        let t = &mut self.transport;

        let values = command::get_values(t, identity.has_light_sensor).await?;
        let sky_temp_raw = command::get_sky_temp(t).await?;
        let wind_speed_raw = if identity.has_anemometer {
            Some(command::get_windspeed(t).await?)
        } else {
            None
        };
        let rain_frequency = command::get_rain_frequency(t).await?;
        let humidity_raw = command::get_humidity(t).await?;
        let pressure_raw = command::get_pressure(t).await?;
        let rh_sensor_temp_raw = command::get_rh_sensor_temp(t).await?;
        let pressure_temp_raw = command::get_pressure_temp(t).await?;
        let ambient_ir_raw = command::get_sensor_temp(t).await?;
        let switch_state = command::get_switch_status(t).await?;
        let pwm_raw = if identity.has_heater {
            Some(command::get_pwm(t).await?)
        } else {
            None
        };
        let internal_errors = Some(command::get_internal_errors(t).await?);

        let sky_temp = sky_temp_c(sky_temp_raw);
        let rh_sensor_temp = rh_sensor_temp_c(rh_sensor_temp_raw);
        let ambient_ir = ambient_temp_c_ir(ambient_ir_raw);
        // rh_sensor_temp is preferred when the probe is present; IR is the fallback.
        let ambient_temp = if rh_sensor_temp_raw != 0 { rh_sensor_temp } else { ambient_ir };

        let wind_speed = wind_speed_raw.map(|raw| wind_speed_kph(raw, identity.firmware_version));
        let humidity = Some(humidity_pct(humidity_raw));
        let pressure = Some(pressure_pa(pressure_raw));
        let pressure_temp = Some(pressure_temp_c(pressure_temp_raw));
        let dew_point = humidity.and_then(|h| dew_point_c(ambient_temp, h));
        let sea_level_pressure = pressure.map(|p| sea_level_pressure_pa(p, ambient_temp, self.config.elevation_m));
        let sky_quality_mpsas = values
            .light_period_raw
            .and_then(|p| sky_quality_mpsas(p, ambient_temp, self.config.sq_reference));
        let pwm = pwm_raw.map(pwm_pct);

        let safety = classify(
            SafetyInputs {
                sky_temp: Some(sky_temp),
                ambient_temp: Some(ambient_temp),
                wind_speed,
                rain_frequency: Some(rain_frequency),
            },
            &self.config.thresholds,
            self.config.ignore_unsafe,
        );

        Ok(Reading {
            timestamp: now_in_tz(&self.config.timezone),
            sky_temp,
            ambient_temp,
            rh_sensor_temp: Some(rh_sensor_temp),
            pressure_temp,
            wind_speed,
            rain_frequency,
            humidity,
            pressure,
            sea_level_pressure,
            dew_point,
            light_period_raw: values.light_period_raw,
            ambient_ntc_raw: values.ambient_ntc_raw,
            ldr_raw: values.ldr_raw,
            zener_raw: values.zener_raw,
            rain_ntc_raw: values.rain_ntc_raw,
            sky_quality_mpsas,
            pwm,
            switch_state,
            cloud_condition: safety.cloud_condition,
            wind_condition: safety.wind_condition,
            rain_condition: safety.rain_condition,
            cloud_safe: safety.cloud_safe,
            wind_safe: safety.wind_safe,
            rain_safe: safety.rain_safe,
            is_safe: safety.is_safe,
            internal_errors,
        })
    }

    /// Close the transport. Idempotent.
    pub fn close(&mut self) {
        self.transport.close();
        self.status = ConnectionStatus::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig {
            serial_port: "/dev/null".to_string(),
            settle_delay: std::time::Duration::from_millis(0),
            have_heater: false,
            heater_min_power: 0,
            sq_reference: 19.6,
            elevation_m: 0.0,
            timezone: Tz::UTC,
            num_readings: 5,
            thresholds: Thresholds::default(),
            ignore_unsafe: IgnoreUnsafe::default(),
        }
    }

    #[test]
    fn get_reading_rejects_when_not_connected() {
        let session = SensorSession::new(config());
        assert_eq!(session.status(), ConnectionStatus::Initializing);
    }

    #[tokio::test]
    async fn get_reading_errors_with_state_error_when_disconnected() {
        let mut session = SensorSession::new(config());
        let err = session.get_reading().await.unwrap_err();
        assert_eq!(err.expected, ConnectionStatus::Connected);
        assert_eq!(err.actual, ConnectionStatus::Initializing);
    }
}
