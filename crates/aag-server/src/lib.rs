//! HTTP surface for the AAG CloudWatcher service: the core `/weather*`
//! data endpoints plus ambient health/readiness/metrics endpoints.
//!
//! Handlers are read-only: they clone a `StateSnapshot` from the shared
//! `aag_acquisition::SharedState` and never touch the serial transport.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use opentelemetry::metrics::{Counter, MeterProvider};
use opentelemetry_prometheus::exporter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Serialize;

use aag_acquisition::{reading_to_solo, SharedState};

pub struct AppState {
    shared: Arc<SharedState>,
    registry: Registry,
    #[allow(dead_code)]
    provider: SdkMeterProvider,
    requests_total: Counter<u64>,
}

pub fn build_app(shared: Arc<SharedState>) -> (Router, Arc<AppState>) {
    let registry = Registry::new();
    let reader = exporter()
        .with_registry(registry.clone())
        .build()
        .expect("prometheus exporter");
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    let meter = provider.meter("aag-server");

    let requests_total = meter
        .u64_counter("aag_http_requests_total")
        .with_description("Total HTTP requests served")
        .init();

    let state = Arc::new(AppState { shared, registry, provider, requests_total });

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/weather", get(weather))
        .route("/weather/latest", get(weather_latest))
        .route("/weather/solo", get(weather_solo))
        .route("/weather/state", get(weather_state))
        .with_state(Arc::clone(&state));

    (router, state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> StatusCode {
    state.requests_total.add(1, &[]);
    StatusCode::OK
}

async fn readyz(State(state): State<Arc<AppState>>) -> StatusCode {
    state.requests_total.add(1, &[]);
    if state.shared.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(
    State(state): State<Arc<AppState>>,
) -> ([(header::HeaderName, axum::http::HeaderValue); 1], String) {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!(error = %e, "failed to encode metrics");
    }
    let body = String::from_utf8(buf).unwrap_or_default();
    let hdr = (
        header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    ([hdr], body)
}

async fn weather(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.requests_total.add(1, &[]);
    let snapshot = state.shared.snapshot().await;
    Json(snapshot.readings).into_response()
}

async fn weather_latest(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.requests_total.add(1, &[]);
    let snapshot = state.shared.snapshot().await;
    match snapshot.latest() {
        Some(reading) => Json(reading.clone()).into_response(),
        None => no_data_status(&snapshot).into_response(),
    }
}

async fn weather_solo(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.requests_total.add(1, &[]);
    let snapshot = state.shared.snapshot().await;
    match snapshot.latest() {
        Some(reading) => {
            let identity = snapshot.sensor_name.as_ref().map(|_| aag_core::SensorIdentity {
                name: snapshot.sensor_name.clone().unwrap_or_default(),
                firmware_version: snapshot.firmware_version.unwrap_or(0.0),
                serial_number: snapshot.serial_number.clone().unwrap_or_default(),
                has_anemometer: reading.wind_speed.is_some(),
                has_heater: reading.pwm.is_some(),
                has_light_sensor: reading.light_period_raw.is_some(),
            });
            Json(reading_to_solo(reading, identity.as_ref())).into_response()
        }
        None => no_data_status(&snapshot).into_response(),
    }
}

/// 503 when there is no live connection and nothing cached; 404 when
/// connected but the ring is simply still empty.
fn no_data_status(snapshot: &aag_acquisition::StateSnapshot) -> StatusCode {
    if snapshot.status != aag_core::ConnectionStatus::Connected {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Debug, Serialize)]
struct WeatherState {
    service_status: String,
    sensor_name: Option<String>,
    serial_port: String,
    firmware_version: Option<f64>,
    serial_number: Option<String>,
    last_successful_reading_at: Option<String>,
    last_error_message: Option<String>,
    last_connection_attempt_at: Option<String>,
    current_server_time: String,
    capture_delay_seconds: u64,
    readings_buffer_size: usize,
    readings_in_buffer: usize,
}

async fn weather_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.requests_total.add(1, &[]);
    let snapshot = state.shared.snapshot().await;
    let body = WeatherState {
        service_status: snapshot.status.to_string(),
        sensor_name: snapshot.sensor_name,
        serial_port: snapshot.serial_port,
        firmware_version: snapshot.firmware_version,
        serial_number: snapshot.serial_number,
        last_successful_reading_at: snapshot.last_successful_read_at.map(|t| t.to_rfc3339()),
        last_error_message: snapshot.last_error_message,
        last_connection_attempt_at: snapshot.last_connection_attempt_at.map(|t| t.to_rfc3339()),
        current_server_time: Utc::now().to_rfc3339(),
        capture_delay_seconds: snapshot.capture_delay_s,
        readings_buffer_size: snapshot.readings_buffer_size,
        readings_in_buffer: snapshot.readings.len(),
    };
    (StatusCode::OK, Json(body))
}
