//! Typed command/response mapping over the frame codec and transport.
//!
//! Each function here issues exactly one command and parses its response.
//! Block-shape validation is split into pure functions (`parse_*`) so they
//! can be tested without a serial line.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

use crate::frame::{decode_blocks, ResponseBlock};
use crate::transport::{Transport, TransportError};

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(400);
const ERRORS_TIMEOUT: Duration = Duration::from_millis(800);
const PWM_SET_TIMEOUT: Duration = Duration::from_millis(800);
const WINDSPEED_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum CommError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("command timed out")]
    Timeout,
    #[error("unexpected response: {0}")]
    BadResponse(String),
}

/// Raw counts from the multi-block `GetValues` (`C!`) command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValuesRaw {
    pub zener_raw: u32,
    pub ambient_ntc_raw: u32,
    pub ldr_raw: u32,
    pub rain_ntc_raw: u32,
    pub light_period_raw: Option<u32>,
}

async fn send_and_read(transport: &mut Transport, wire: &str, timeout: Duration) -> Result<Vec<ResponseBlock>, CommError> {
    transport.write_command(wire.as_bytes()).await?;
    let raw = match transport.read_until_handshake(timeout).await {
        Ok(buf) => buf,
        Err(TransportError::Timeout(_)) => return Err(CommError::Timeout),
        Err(e) => return Err(CommError::Transport(e)),
    };
    decode_blocks(&raw).map_err(|e| CommError::BadResponse(e.to_string()))
}

fn expect_blocks(blocks: &[ResponseBlock], n: usize) -> Result<(), CommError> {
    if blocks.len() != n {
        return Err(CommError::BadResponse(format!("expected {n} block(s), got {}", blocks.len())));
    }
    Ok(())
}

fn expect_code<'a>(block: &'a ResponseBlock, expected: &str) -> Result<&'a ResponseBlock, CommError> {
    if block.code != expected {
        return Err(CommError::BadResponse(format!("expected code {expected:?}, got {:?}", block.code)));
    }
    Ok(block)
}

fn parse_i64(payload: &str) -> Result<i64, CommError> {
    payload.trim().parse().map_err(|_| CommError::BadResponse(format!("not an integer: {payload:?}")))
}

fn parse_i32(payload: &str) -> Result<i32, CommError> {
    payload.trim().parse().map_err(|_| CommError::BadResponse(format!("not an integer: {payload:?}")))
}

fn parse_u32(payload: &str) -> Result<u32, CommError> {
    payload.trim().parse().map_err(|_| CommError::BadResponse(format!("not an unsigned integer: {payload:?}")))
}

fn parse_f64(payload: &str) -> Result<f64, CommError> {
    payload.trim().parse().map_err(|_| CommError::BadResponse(format!("not a number: {payload:?}")))
}

/// Parse the block set of a `GetValues` response. Pure; testable without I/O.
pub fn parse_values_blocks(blocks: &[ResponseBlock], has_light_sensor: bool) -> Result<ValuesRaw, CommError> {
    let expected_n = if has_light_sensor { 5 } else { 4 };
    expect_blocks(blocks, expected_n)?;

    let by_code: HashMap<&str, &str> = blocks.iter().map(|b| (b.code.as_str(), b.payload.as_str())).collect();

    let get = |code: &str| -> Result<&str, CommError> {
        by_code.get(code).copied().ok_or_else(|| CommError::BadResponse(format!("missing block {code:?}")))
    };

    let zener_raw = parse_u32(get("6 ")?)?;
    let ambient_ntc_raw = parse_u32(get("3 ")?)?;
    let ldr_raw = parse_u32(get("4 ")?)?;
    let rain_ntc_raw = parse_u32(get("5 ")?)?;
    let light_period_raw = if has_light_sensor {
        Some(parse_u32(get("8 ")?)?)
    } else {
        None
    };

    Ok(ValuesRaw { zener_raw, ambient_ntc_raw, ldr_raw, rain_ntc_raw, light_period_raw })
}

/// Parse the four `GetInternalErrors` blocks (`E1`..`E4`). Pure.
pub fn parse_internal_errors_blocks(blocks: &[ResponseBlock]) -> Result<[u32; 4], CommError> {
    expect_blocks(blocks, 4)?;
    let by_code: HashMap<&str, &str> = blocks.iter().map(|b| (b.code.as_str(), b.payload.as_str())).collect();
    let mut out = [0u32; 4];
    for (i, code) in ["E1", "E2", "E3", "E4"].iter().enumerate() {
        let payload = by_code.get(code).ok_or_else(|| CommError::BadResponse(format!("missing block {code:?}")))?;
        out[i] = parse_u32(payload)?;
    }
    Ok(out)
}

pub async fn get_internal_name(transport: &mut Transport) -> Result<String, CommError> {
    let blocks = send_and_read(transport, "A!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 1)?;
    let block = expect_code(&blocks[0], "N ")?;
    Ok(block.payload.clone())
}

pub async fn get_firmware(transport: &mut Transport) -> Result<f64, CommError> {
    let blocks = send_and_read(transport, "B!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 1)?;
    let block = expect_code(&blocks[0], "V ")?;
    parse_f64(&block.payload)
}

pub async fn get_values(transport: &mut Transport, has_light_sensor: bool) -> Result<ValuesRaw, CommError> {
    let timeout = DEFAULT_TIMEOUT;
    let blocks = send_and_read(transport, "C!", timeout).await?;
    parse_values_blocks(&blocks, has_light_sensor)
}

pub async fn get_internal_errors(transport: &mut Transport) -> Result<[u32; 4], CommError> {
    let blocks = send_and_read(transport, "D!", ERRORS_TIMEOUT).await?;
    parse_internal_errors_blocks(&blocks)
}

pub async fn get_rain_frequency(transport: &mut Transport) -> Result<i64, CommError> {
    let blocks = send_and_read(transport, "E!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 1)?;
    let block = expect_code(&blocks[0], "R ")?;
    parse_i64(&block.payload)
}

pub async fn get_switch_status(transport: &mut Transport) -> Result<aag_core::SwitchState, CommError> {
    let blocks = send_and_read(transport, "F!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 1)?;
    match blocks[0].code.as_str() {
        "X " => Ok(aag_core::SwitchState::Open),
        "Y " => Ok(aag_core::SwitchState::Closed),
        other => Err(CommError::BadResponse(format!("unexpected switch status code {other:?}"))),
    }
}

pub async fn set_switch_open(transport: &mut Transport) -> Result<(), CommError> {
    let blocks = send_and_read(transport, "G!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 0)
}

pub async fn set_switch_closed(transport: &mut Transport) -> Result<(), CommError> {
    let blocks = send_and_read(transport, "H!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 0)
}

pub async fn get_serial_number(transport: &mut Transport) -> Result<String, CommError> {
    let blocks = send_and_read(transport, "K!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 1)?;
    let block = &blocks[0];
    if block.code.trim() != "K" {
        return Err(CommError::BadResponse(format!("expected code \"K\", got {:?}", block.code)));
    }
    Ok(block.payload.trim_end_matches('\0').to_string())
}

/// `value` is clamped to the wire's 4-digit range by the caller; out of
/// range values are a logic error, not a comm error.
pub async fn set_pwm(transport: &mut Transport, value: u16) -> Result<u32, CommError> {
    debug_assert!(value <= 1023);
    let wire = format!("P{value:04}!");
    let blocks = send_and_read(transport, &wire, PWM_SET_TIMEOUT).await?;
    expect_blocks(&blocks, 1)?;
    let block = expect_code(&blocks[0], "Q ")?;
    parse_u32(&block.payload)
}

pub async fn get_pwm(transport: &mut Transport) -> Result<u32, CommError> {
    let blocks = send_and_read(transport, "Q!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 1)?;
    let block = expect_code(&blocks[0], "Q ")?;
    parse_u32(&block.payload)
}

pub async fn get_sky_temp(transport: &mut Transport) -> Result<i32, CommError> {
    let blocks = send_and_read(transport, "S!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 1)?;
    let block = expect_code(&blocks[0], "1 ")?;
    parse_i32(&block.payload)
}

pub async fn get_sensor_temp(transport: &mut Transport) -> Result<i32, CommError> {
    let blocks = send_and_read(transport, "T!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 1)?;
    let block = expect_code(&blocks[0], "2 ")?;
    parse_i32(&block.payload)
}

pub async fn can_get_windspeed(transport: &mut Transport) -> Result<bool, CommError> {
    let blocks = send_and_read(transport, "v!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 1)?;
    Ok(blocks[0].payload.contains('Y'))
}

pub async fn get_windspeed(transport: &mut Transport) -> Result<f64, CommError> {
    let blocks = send_and_read(transport, "V!", WINDSPEED_TIMEOUT).await?;
    expect_blocks(&blocks, 1)?;
    let block = expect_code(&blocks[0], "w ")?;
    parse_f64(&block.payload)
}

pub async fn get_humidity(transport: &mut Transport) -> Result<u32, CommError> {
    let blocks = send_and_read(transport, "h!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 1)?;
    parse_u32(&blocks[0].payload)
}

pub async fn get_pressure(transport: &mut Transport) -> Result<u32, CommError> {
    let blocks = send_and_read(transport, "p!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 1)?;
    parse_u32(&blocks[0].payload)
}

pub async fn get_rh_sensor_temp(transport: &mut Transport) -> Result<u32, CommError> {
    let blocks = send_and_read(transport, "t!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 1)?;
    parse_u32(&blocks[0].payload)
}

pub async fn get_pressure_temp(transport: &mut Transport) -> Result<u32, CommError> {
    let blocks = send_and_read(transport, "q!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 1)?;
    parse_u32(&blocks[0].payload)
}

pub async fn reset_rs232(transport: &mut Transport) -> Result<(), CommError> {
    let blocks = send_and_read(transport, "z!", DEFAULT_TIMEOUT).await?;
    expect_blocks(&blocks, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(code: &str, payload: &str) -> ResponseBlock {
        ResponseBlock::new(code, payload)
    }

    #[test]
    fn parses_values_without_light_sensor() {
        let blocks = vec![
            block("6 ", "100"),
            block("3 ", "200"),
            block("4 ", "300"),
            block("5 ", "400"),
        ];
        let v = parse_values_blocks(&blocks, false).unwrap();
        assert_eq!(v, ValuesRaw { zener_raw: 100, ambient_ntc_raw: 200, ldr_raw: 300, rain_ntc_raw: 400, light_period_raw: None });
    }

    #[test]
    fn parses_values_with_light_sensor() {
        let blocks = vec![
            block("6 ", "100"),
            block("3 ", "200"),
            block("4 ", "300"),
            block("5 ", "400"),
            block("8 ", "500"),
        ];
        let v = parse_values_blocks(&blocks, true).unwrap();
        assert_eq!(v.light_period_raw, Some(500));
    }

    #[test]
    fn rejects_block_count_outside_both_shapes() {
        let blocks = vec![block("6 ", "100"), block("3 ", "200")];
        assert!(parse_values_blocks(&blocks, false).is_err());
        assert!(parse_values_blocks(&blocks, true).is_err());
    }

    #[test]
    fn light_sensor_gating_requires_the_8_block_when_expected() {
        let blocks = vec![
            block("6 ", "100"),
            block("3 ", "200"),
            block("4 ", "300"),
            block("5 ", "400"),
        ];
        assert!(parse_values_blocks(&blocks, true).is_err());
    }

    #[test]
    fn parses_internal_errors() {
        let blocks = vec![block("E1", "1"), block("E2", "2"), block("E3", "3"), block("E4", "4")];
        assert_eq!(parse_internal_errors_blocks(&blocks).unwrap(), [1, 2, 3, 4]);
    }

    #[test]
    fn set_pwm_wire_format_is_4_digit_padded() {
        assert_eq!(format!("P{:04}!", 512), "P0512!");
        assert_eq!(format!("P{:04}!", 0), "P0000!");
    }

    /// `set_pwm(50)` writes `P0512!`; the device's echoed `Q ` block
    /// carrying `512` decodes back to ~50.0%.
    #[test]
    fn set_pwm_50_percent_round_trips_through_the_wire_format() {
        let value = (50.0 / 100.0 * 1023.0).round() as u16;
        assert_eq!(value, 512);
        let wire = format!("P{value:04}!");
        assert_eq!(wire, "P0512!");

        let echoed = block("Q ", "512");
        let parsed = parse_u32(&echoed.payload).unwrap();
        assert_eq!(parsed, 512);
        assert!((aag_core::pwm_pct(parsed) - 50.0).abs() < 0.1);
    }
}
