//! Agent configuration parameters
//!
//! All tunable parameters for the FieldLink agent. Defaults reproduce the
//! field-proven firmware timings; credentials default from the build
//! environment. Values can be overridden via NVS.

use serde::{Deserialize, Serialize};

/// Core agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub link: LinkConfig,
    pub broker: BrokerConfig,
    pub time: TimeConfig,
    pub timing: TimingConfig,
    pub environment: EnvironmentConfig,

    /// Actuator position applied at boot (degrees, 0-180).
    pub initial_actuator_position: u8,
}

/// Network link credentials and polling budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub ssid: String,
    pub password: String,
    /// Polls of `is_connected()` per connect attempt.
    pub connect_attempts: u8,
    /// Delay between polls (milliseconds).
    pub poll_interval_ms: u32,
}

/// Message-bus endpoint and session credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Client id is `{prefix}{device id}`.
    pub client_id_prefix: String,
}

/// Wall-clock rendering for report timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeConfig {
    pub ntp_server: String,
    /// Fixed offset from UTC applied to timestamps (seconds).
    pub utc_offset_secs: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Minimum spacing between session connect attempts (milliseconds).
    pub session_reconnect_interval_ms: u32,
    /// Periodic telemetry interval (milliseconds).
    pub telemetry_interval_ms: u32,
    /// Interval for logging the current actuator position (milliseconds).
    pub actuator_report_interval_ms: u32,
    /// Idle sleep at the end of every tick (milliseconds).
    pub loop_idle_ms: u32,
    /// Delay between publishing "rebooting" and restarting (milliseconds).
    pub reboot_grace_ms: u32,
}

/// Simulated environment sensor drift model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub temperature_initial_c: f64,
    /// Largest per-period temperature change (either direction).
    pub temperature_step_c: f64,
    pub temperature_min_c: f64,
    pub temperature_max_c: f64,
    pub humidity_initial_pct: f64,
    pub humidity_step_pct: f64,
    pub humidity_min_pct: f64,
    pub humidity_max_pct: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig {
                ssid: option_env!("FIELDLINK_WIFI_SSID").unwrap_or("YOUR_WIFI_SSID").into(),
                password: option_env!("FIELDLINK_WIFI_PASSWORD")
                    .unwrap_or("YOUR_WIFI_PASSWORD")
                    .into(),
                connect_attempts: 20,
                poll_interval_ms: 500, // ~10 s per attempt
            },
            broker: BrokerConfig {
                host: option_env!("FIELDLINK_BROKER_HOST").unwrap_or("192.168.1.100").into(),
                port: 1883,
                username: option_env!("FIELDLINK_BROKER_USER").unwrap_or("fieldlink").into(),
                password: option_env!("FIELDLINK_BROKER_PASSWORD").unwrap_or("").into(),
                client_id_prefix: "ESP32-".into(),
            },
            time: TimeConfig {
                ntp_server: "pool.ntp.org".into(),
                utc_offset_secs: 19_800, // UTC+05:30
            },
            timing: TimingConfig {
                session_reconnect_interval_ms: 5_000,
                telemetry_interval_ms: 30_000,
                actuator_report_interval_ms: 5_000,
                loop_idle_ms: 100,
                reboot_grace_ms: 2_000,
            },
            environment: EnvironmentConfig {
                temperature_initial_c: 20.0,
                temperature_step_c: 0.5,
                temperature_min_c: 15.0,
                temperature_max_c: 35.0,
                humidity_initial_pct: 50.0,
                humidity_step_pct: 2.0,
                humidity_min_pct: 30.0,
                humidity_max_pct: 80.0,
            },
            initial_actuator_position: 90,
        }
    }
}

/// Range-check a configuration before it is persisted.
pub fn validate_config(cfg: &AgentConfig) -> Result<(), &'static str> {
    if cfg.link.ssid.is_empty() || cfg.link.ssid.len() > 32 {
        return Err("link.ssid must be 1-32 bytes");
    }
    if cfg.link.connect_attempts == 0 {
        return Err("link.connect_attempts must be at least 1");
    }
    if !(50..=5_000).contains(&cfg.link.poll_interval_ms) {
        return Err("link.poll_interval_ms must be 50-5000");
    }
    if cfg.broker.host.is_empty() {
        return Err("broker.host must not be empty");
    }
    if cfg.broker.port == 0 {
        return Err("broker.port must not be 0");
    }
    if !(500..=600_000).contains(&cfg.timing.session_reconnect_interval_ms) {
        return Err("timing.session_reconnect_interval_ms must be 500-600000");
    }
    if !(1_000..=3_600_000).contains(&cfg.timing.telemetry_interval_ms) {
        return Err("timing.telemetry_interval_ms must be 1000-3600000");
    }
    if cfg.timing.loop_idle_ms > 1_000 {
        return Err("timing.loop_idle_ms must be at most 1000");
    }
    if !(-43_200..=50_400).contains(&cfg.time.utc_offset_secs) {
        return Err("time.utc_offset_secs must be within UTC-12..UTC+14");
    }
    if cfg.initial_actuator_position > 180 {
        return Err("initial_actuator_position must be 0-180");
    }
    let env = &cfg.environment;
    let values = [
        env.temperature_initial_c,
        env.temperature_step_c,
        env.temperature_min_c,
        env.temperature_max_c,
        env.humidity_initial_pct,
        env.humidity_step_pct,
        env.humidity_min_pct,
        env.humidity_max_pct,
    ];
    if values.iter().any(|v| !v.is_finite()) {
        return Err("environment values must be finite");
    }
    if env.temperature_min_c >= env.temperature_max_c {
        return Err("environment temperature bounds are inverted");
    }
    if env.humidity_min_pct >= env.humidity_max_pct {
        return Err("environment humidity bounds are inverted");
    }
    if env.temperature_step_c < 0.0 || env.humidity_step_pct < 0.0 {
        return Err("environment steps must not be negative");
    }
    Ok(())
}
