//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Agent (domain)
//! ```
//!
//! Driven adapters (WiFi, MQTT, servo, OTA, NVS, clocks) implement these
//! traits. The [`Agent`](super::service::Agent) consumes them via generics,
//! so the domain core never touches the ESP-IDF directly and every
//! component runs unchanged against the mocks in `tests/`.

use core::net::Ipv4Addr;

use crate::config::AgentConfig;
use crate::error::UpdateError;

// ───────────────────────────────────────────────────────────────
// Network link (WiFi station)
// ───────────────────────────────────────────────────────────────

/// Credentials for joining the network.
#[derive(Debug, Clone, Copy)]
pub struct LinkCredentials<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

pub trait LinkPort {
    /// Start associating with the network. Returns `false` if the request
    /// could not even be issued; success is observed via [`is_connected`].
    ///
    /// [`is_connected`]: LinkPort::is_connected
    fn begin(&mut self, credentials: &LinkCredentials<'_>) -> bool;

    fn is_connected(&self) -> bool;

    fn local_address(&self) -> Option<Ipv4Addr>;

    /// Received signal strength in dBm.
    fn signal_quality(&self) -> Option<i8>;
}

// ───────────────────────────────────────────────────────────────
// Message bus session (MQTT)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct BrokerEndpoint<'a> {
    pub host: &'a str,
    pub port: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionCredentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Delivery guarantee requested for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryLevel {
    /// Fire and forget.
    AtMostOnce,
    /// Delivered at least once, queued by the broker while offline.
    AtLeastOnceQueued,
}

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub trait MessageBus {
    /// Open a session. Blocks for at most one connect handshake.
    fn connect(
        &mut self,
        endpoint: &BrokerEndpoint<'_>,
        client_id: &str,
        credentials: &SessionCredentials<'_>,
    ) -> bool;

    fn subscribe(&mut self, topic: &str, level: DeliveryLevel) -> bool;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool;

    /// Service the session without blocking and hand back every message
    /// buffered since the previous call.
    fn poll(&mut self) -> Vec<InboundMessage>;

    fn is_connected(&self) -> bool;

    /// Drop the session (used when the link underneath goes away).
    fn disconnect(&mut self);

    /// Transport-specific state code for diagnostics.
    fn state_code(&self) -> i32 {
        0
    }
}

// ───────────────────────────────────────────────────────────────
// Actuator (servo)
// ───────────────────────────────────────────────────────────────

pub trait ActuatorPort {
    /// Drive the actuator to `angle` degrees. Callers clamp to 0-180.
    fn set_position(&mut self, angle: u8);
}

// ───────────────────────────────────────────────────────────────
// Firmware updater
// ───────────────────────────────────────────────────────────────

/// Result of one firmware transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// New image written and selected for next boot.
    Succeeded,
    Failed(UpdateError),
    /// Server reports the running image is current.
    NoUpdateAvailable,
}

pub trait FirmwareUpdater {
    /// Download and flash the image at `url`. Blocks until the transfer
    /// ends one way or another.
    fn update(&mut self, url: &str) -> UpdateOutcome;

    /// Boot into the image staged by a successful [`update`](FirmwareUpdater::update).
    fn activate(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// System services
// ───────────────────────────────────────────────────────────────

pub trait SystemPort {
    /// Restart the device. Does not return on real hardware.
    fn restart(&mut self);

    /// Free heap in bytes.
    fn free_heap(&self) -> u32;
}

/// Monotonic time, blocking delay, and (optionally) synced wall time.
pub trait ClockPort {
    /// Milliseconds since boot.
    fn uptime_ms(&self) -> u64;

    fn delay_ms(&mut self, ms: u32);

    /// Seconds since the Unix epoch, `None` until the clock is synced.
    fn unix_time(&self) -> Option<i64>;
}

// ───────────────────────────────────────────────────────────────
// Port bundle
// ───────────────────────────────────────────────────────────────

/// Every runtime adapter the agent drives, owned in one place so that
/// components can borrow disjoint ports within a single tick.
pub struct DevicePorts<L, B, A, U, S, C> {
    pub link: L,
    pub bus: B,
    pub actuator: A,
    pub updater: U,
    pub system: S,
    pub clock: C,
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists agent configuration.
///
/// Implementations MUST validate before persisting
/// ([`validate_config`](crate::config::validate_config)); invalid values
/// are rejected, never clamped.
pub trait ConfigPort {
    /// Load configuration. [`ConfigError::NotFound`] on first boot.
    fn load(&self) -> Result<AgentConfig, ConfigError>;

    fn save(&mut self, config: &AgentConfig) -> Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
