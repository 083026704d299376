//! Telemetry reports and the publisher that emits them.
//!
//! Two flavours share one JSON shape on `devices/{id}/data`:
//!
//! - **periodic**: every `telemetry_interval_ms`, carries `temperature`
//!   and `humidity` from the drift model, status `online`;
//! - **status**: event-triggered (boot, command outcomes), same liveness
//!   fields, no environment readings.
//!
//! Reports are built, serialised, published once and forgotten. A failed
//! publish is logged; the next period tries again with fresh data.

use chrono::{DateTime, FixedOffset};
use log::{info, warn};
use serde::Serialize;

use crate::config::{EnvironmentConfig, TimeConfig};
use crate::error::PublishError;

use super::ports::MessageBus;

/// Wall clock earlier than this (2020-01-01) means SNTP has not synced.
const EPOCH_2020: i64 = 1_577_836_800;

/// Rendered in place of a timestamp before the clock is synced.
pub const UNKNOWN_TIMESTAMP: &str = "unknown";

// ───────────────────────────────────────────────────────────────
// Report
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Online,
    Rebooting,
    Updating,
    UpdateFailed,
    #[serde(rename = "update_success")]
    UpdateSucceeded,
    NoUpdateNeeded,
    #[serde(rename = "servo_updated")]
    ActuatorUpdated,
    /// A recognised command arrived without its required field.
    CommandRejected,
}

impl Status {
    /// Terminal statuses of a firmware update.
    pub fn is_update_outcome(self) -> bool {
        matches!(
            self,
            Self::UpdateFailed | Self::UpdateSucceeded | Self::NoUpdateNeeded
        )
    }
}

/// One published report. Keys are the wire keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryReport {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    pub status: Status,
    /// Milliseconds since boot.
    pub uptime: u64,
    pub free_heap: u32,
    /// dBm, 0 when unknown.
    pub wifi_rssi: i8,
    pub node_id: String,
    pub servo_angle: u8,
}

/// Liveness data sampled from the ports at publish time.
#[derive(Debug, Clone, Copy)]
pub struct DeviceSnapshot<'a> {
    pub node_id: &'a str,
    pub uptime_ms: u64,
    pub free_heap: u32,
    pub wifi_rssi: Option<i8>,
    pub unix_time: Option<i64>,
    pub actuator_position: u8,
}

/// `%Y-%m-%d %H:%M:%S` in the configured fixed offset, or `"unknown"`.
pub fn format_timestamp(unix_time: Option<i64>, utc_offset_secs: i32) -> String {
    let local = unix_time
        .filter(|&t| t >= EPOCH_2020)
        .and_then(|t| DateTime::from_timestamp(t, 0))
        .zip(FixedOffset::east_opt(utc_offset_secs))
        .map(|(utc, tz)| utc.with_timezone(&tz));
    match local {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => UNKNOWN_TIMESTAMP.to_owned(),
    }
}

fn round_one_decimal(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Like `f64::clamp`, but never panics on NaN or inverted bounds.
fn bound(v: f64, min: f64, max: f64) -> f64 {
    v.max(min).min(max)
}

// ───────────────────────────────────────────────────────────────
// Environment drift model
// ───────────────────────────────────────────────────────────────

/// Simulated temperature/humidity sensor.
///
/// Each [`step`](Self::step) adds a symmetric random delta of at most
/// `±step` and clamps into the configured physical range.
pub struct EnvironmentModel {
    config: EnvironmentConfig,
    rng: fastrand::Rng,
    temperature_c: f64,
    humidity_pct: f64,
}

impl EnvironmentModel {
    pub fn new(config: EnvironmentConfig, rng: fastrand::Rng) -> Self {
        let temperature_c = bound(
            config.temperature_initial_c,
            config.temperature_min_c,
            config.temperature_max_c,
        );
        let humidity_pct = bound(
            config.humidity_initial_pct,
            config.humidity_min_pct,
            config.humidity_max_pct,
        );
        Self {
            config,
            rng,
            temperature_c,
            humidity_pct,
        }
    }

    /// Deterministic model for tests and simulation.
    pub fn with_seed(config: EnvironmentConfig, seed: u64) -> Self {
        Self::new(config, fastrand::Rng::with_seed(seed))
    }

    pub fn step(&mut self) -> (f64, f64) {
        let c = &self.config;
        let dt = (self.rng.f64() * 2.0 - 1.0) * c.temperature_step_c;
        let dh = (self.rng.f64() * 2.0 - 1.0) * c.humidity_step_pct;
        self.temperature_c = bound(self.temperature_c + dt, c.temperature_min_c, c.temperature_max_c);
        self.humidity_pct = bound(self.humidity_pct + dh, c.humidity_min_pct, c.humidity_max_pct);
        self.reading()
    }

    /// Current values rounded to one decimal, still inside bounds.
    pub fn reading(&self) -> (f64, f64) {
        let c = &self.config;
        (
            bound(round_one_decimal(self.temperature_c), c.temperature_min_c, c.temperature_max_c),
            bound(round_one_decimal(self.humidity_pct), c.humidity_min_pct, c.humidity_max_pct),
        )
    }
}

// ───────────────────────────────────────────────────────────────
// Publisher
// ───────────────────────────────────────────────────────────────

pub struct TelemetryPublisher {
    topic: String,
    time: TimeConfig,
    environment: EnvironmentModel,
}

impl TelemetryPublisher {
    pub fn new(topic: String, time: TimeConfig, environment: EnvironmentModel) -> Self {
        Self {
            topic,
            time,
            environment,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Event report: liveness fields plus `status`, no readings.
    pub fn build_status(&self, status: Status, snapshot: &DeviceSnapshot<'_>) -> TelemetryReport {
        TelemetryReport {
            timestamp: format_timestamp(snapshot.unix_time, self.time.utc_offset_secs),
            temperature: None,
            humidity: None,
            status,
            uptime: snapshot.uptime_ms,
            free_heap: snapshot.free_heap,
            wifi_rssi: snapshot.wifi_rssi.unwrap_or(0),
            node_id: snapshot.node_id.to_owned(),
            servo_angle: snapshot.actuator_position,
        }
    }

    /// Advance the drift model and build a periodic report.
    pub fn build_periodic(&mut self, snapshot: &DeviceSnapshot<'_>) -> TelemetryReport {
        let (temperature, humidity) = self.environment.step();
        TelemetryReport {
            temperature: Some(temperature),
            humidity: Some(humidity),
            ..self.build_status(Status::Online, snapshot)
        }
    }

    pub fn publish_status(
        &self,
        status: Status,
        snapshot: &DeviceSnapshot<'_>,
        bus: &mut impl MessageBus,
    ) -> Result<(), PublishError> {
        let report = self.build_status(status, snapshot);
        self.publish(&report, bus)
    }

    pub fn publish_periodic(
        &mut self,
        snapshot: &DeviceSnapshot<'_>,
        bus: &mut impl MessageBus,
    ) -> Result<(), PublishError> {
        let report = self.build_periodic(snapshot);
        self.publish(&report, bus)
    }

    fn publish(
        &self,
        report: &TelemetryReport,
        bus: &mut impl MessageBus,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(report).map_err(|e| {
            warn!("Report encoding failed: {e}");
            PublishError::Encode
        })?;
        if bus.publish(&self.topic, &payload) {
            info!(
                "Published {:?} report, servo angle {}",
                report.status, report.servo_angle
            );
            Ok(())
        } else {
            warn!(
                "Failed to publish {:?} report, servo angle {}",
                report.status, report.servo_angle
            );
            Err(PublishError::Transport)
        }
    }
}
