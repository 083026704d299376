//! Mock port adapters for integration tests.
//!
//! Every mock records what the agent asked of it so tests can assert on
//! the full interaction history without a radio, a broker, or a servo.

use std::collections::VecDeque;
use std::net::Ipv4Addr;

use fieldlink::app::context::AgentContext;
use fieldlink::app::identity::DeviceIdentity;
use fieldlink::app::ports::{
    ActuatorPort, BrokerEndpoint, ClockPort, ConfigError, ConfigPort, DeliveryLevel, DevicePorts,
    FirmwareUpdater, InboundMessage, LinkCredentials, LinkPort, MessageBus, SessionCredentials,
    SystemPort, UpdateOutcome,
};
use fieldlink::app::telemetry::{EnvironmentModel, TelemetryPublisher};
use fieldlink::config::AgentConfig;
use serde_json::Value;

pub const DEVICE_ID: &str = "AABBCCDDEEFF";
pub const TELEMETRY_TOPIC: &str = "devices/AABBCCDDEEFF/data";
pub const COMMAND_TOPIC: &str = "devices/AABBCCDDEEFF/commands";
pub const FALLBACK_TOPIC: &str = "devices/AABBCCDDEEFF/commands/last";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ── Link ──────────────────────────────────────────────────────

pub struct MockLink {
    pub reachable: bool,
    pub up: bool,
    pub begins: u32,
}

impl MockLink {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable,
            up: false,
            begins: 0,
        }
    }
}

impl LinkPort for MockLink {
    fn begin(&mut self, _: &LinkCredentials<'_>) -> bool {
        self.begins += 1;
        self.up = self.reachable;
        true
    }

    fn is_connected(&self) -> bool {
        self.up
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.up.then_some(Ipv4Addr::new(192, 168, 1, 42))
    }

    fn signal_quality(&self) -> Option<i8> {
        self.up.then_some(-55)
    }
}

// ── Bus ───────────────────────────────────────────────────────

pub struct MockBus {
    pub accept: bool,
    pub connected: bool,
    /// Broker refuses every SUBSCRIBE while the session stays open.
    pub reject_subscribe: bool,
    pub connects: u32,
    pub disconnects: u32,
    pub client_ids: Vec<String>,
    pub subscriptions: Vec<(String, DeliveryLevel)>,
    pub published: Vec<(String, Vec<u8>)>,
    pub inbound: VecDeque<InboundMessage>,
}

#[allow(dead_code)]
impl MockBus {
    pub fn new(accept: bool) -> Self {
        Self {
            accept,
            connected: false,
            reject_subscribe: false,
            connects: 0,
            disconnects: 0,
            client_ids: Vec::new(),
            subscriptions: Vec::new(),
            published: Vec::new(),
            inbound: VecDeque::new(),
        }
    }

    /// An already-open session (for dispatcher-level tests).
    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Self::new(true)
        }
    }

    pub fn queue(&mut self, topic: &str, payload: &str) {
        self.inbound.push_back(InboundMessage {
            topic: topic.to_owned(),
            payload: payload.as_bytes().to_vec(),
        });
    }

    pub fn reports(&self) -> Vec<Value> {
        self.published
            .iter()
            .map(|(_, p)| serde_json::from_slice(p).expect("report is JSON"))
            .collect()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.reports()
            .iter()
            .map(|r| r["status"].as_str().unwrap_or_default().to_owned())
            .collect()
    }
}

impl MessageBus for MockBus {
    fn connect(&mut self, _: &BrokerEndpoint<'_>, client_id: &str, _: &SessionCredentials<'_>) -> bool {
        self.connects += 1;
        self.client_ids.push(client_id.to_owned());
        self.connected = self.accept;
        self.accept
    }

    fn subscribe(&mut self, topic: &str, level: DeliveryLevel) -> bool {
        self.subscriptions.push((topic.to_owned(), level));
        self.connected && !self.reject_subscribe
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        if self.connected {
            self.published.push((topic.to_owned(), payload.to_vec()));
        }
        self.connected
    }

    fn poll(&mut self) -> Vec<InboundMessage> {
        self.inbound.drain(..).collect()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        self.connected = false;
    }
}

// ── Actuator ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockActuator {
    pub positions: Vec<u8>,
}

impl ActuatorPort for MockActuator {
    fn set_position(&mut self, angle: u8) {
        self.positions.push(angle);
    }
}

// ── Updater ───────────────────────────────────────────────────

pub struct MockUpdater {
    pub outcome: UpdateOutcome,
    /// Unwind out of `update()` instead of returning.
    pub panic_on_update: bool,
    pub urls: Vec<String>,
    pub activations: u32,
}

impl MockUpdater {
    pub fn new(outcome: UpdateOutcome) -> Self {
        Self {
            outcome,
            panic_on_update: false,
            urls: Vec::new(),
            activations: 0,
        }
    }
}

impl FirmwareUpdater for MockUpdater {
    fn update(&mut self, url: &str) -> UpdateOutcome {
        self.urls.push(url.to_owned());
        if self.panic_on_update {
            panic!("transfer aborted mid-stream");
        }
        self.outcome.clone()
    }

    fn activate(&mut self) {
        self.activations += 1;
    }
}

// ── System ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockSystem {
    pub restarts: u32,
}

impl SystemPort for MockSystem {
    fn restart(&mut self) {
        self.restarts += 1;
    }

    fn free_heap(&self) -> u32 {
        123_456
    }
}

// ── Clock ─────────────────────────────────────────────────────

/// Manual clock: time moves only through `delay_ms` and `advance`.
#[derive(Default)]
pub struct MockClock {
    pub now_ms: u64,
    pub slept_ms: u64,
    pub unix_time: Option<i64>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }
}

impl ClockPort for MockClock {
    fn uptime_ms(&self) -> u64 {
        self.now_ms
    }

    fn delay_ms(&mut self, ms: u32) {
        self.now_ms += u64::from(ms);
        self.slept_ms += u64::from(ms);
    }

    fn unix_time(&self) -> Option<i64> {
        self.unix_time
    }
}

// ── Config store ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockConfigStore {
    pub stored: Option<AgentConfig>,
    pub corrupted: bool,
    pub saves: u32,
}

impl ConfigPort for MockConfigStore {
    fn load(&self) -> Result<AgentConfig, ConfigError> {
        if self.corrupted {
            return Err(ConfigError::Corrupted);
        }
        self.stored.clone().ok_or(ConfigError::NotFound)
    }

    fn save(&mut self, config: &AgentConfig) -> Result<(), ConfigError> {
        self.saves += 1;
        self.corrupted = false;
        self.stored = Some(config.clone());
        Ok(())
    }
}

// ── Fixtures ──────────────────────────────────────────────────

pub type MockPorts = DevicePorts<MockLink, MockBus, MockActuator, MockUpdater, MockSystem, MockClock>;

pub fn mock_ports(link_reachable: bool, bus: MockBus) -> MockPorts {
    DevicePorts {
        link: MockLink::new(link_reachable),
        bus,
        actuator: MockActuator::default(),
        updater: MockUpdater::new(UpdateOutcome::Succeeded),
        system: MockSystem::default(),
        clock: MockClock::default(),
    }
}

pub fn identity() -> DeviceIdentity {
    DeviceIdentity::resolve(DEVICE_ID).expect("valid test identity")
}

/// Context with the link up, as it is whenever commands arrive.
pub fn connected_context() -> AgentContext {
    let mut ctx = AgentContext::new(identity(), 90);
    ctx.link = fieldlink::app::link::ConnectivityState::Connected;
    ctx.session = fieldlink::app::link::ConnectivityState::Connected;
    ctx
}

pub fn publisher() -> TelemetryPublisher {
    let cfg = AgentConfig::default();
    TelemetryPublisher::new(
        TELEMETRY_TOPIC.to_owned(),
        cfg.time,
        EnvironmentModel::with_seed(cfg.environment, 1),
    )
}
