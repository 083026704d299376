//! Message-bus session manager.
//!
//! Rides on top of the link. While the link is down the session is forced
//! Disconnected. While it is up but the session is not, connect attempts
//! are gated by a reconnect timer so a flapping broker never sees a
//! connection storm. A successful connect subscribes the live and
//! retained-fallback command topics; the caller publishes "online".

use log::{debug, info, warn};

use crate::config::BrokerConfig;
use crate::error::SessionError;
use crate::scheduler::IntervalTimer;

use super::identity::{DeviceIdentity, Topics};
use super::link::ConnectivityState;
use super::ports::{BrokerEndpoint, DeliveryLevel, InboundMessage, MessageBus, SessionCredentials};

/// What one call to [`SessionManager::maintain`] produced.
#[derive(Debug, Default)]
pub struct SessionTick {
    /// The session came up during this call.
    pub established: bool,
    /// Messages buffered by the bus since the previous tick.
    pub inbound: Vec<InboundMessage>,
    /// Why no session exists after this call, if one was wanted.
    pub error: Option<SessionError>,
}

pub struct SessionManager {
    broker: BrokerConfig,
    client_id: String,
    subscriptions: [String; 2],
    state: ConnectivityState,
    reconnect: IntervalTimer,
}

impl SessionManager {
    /// First connect is attempted on the first tick with the link up.
    pub fn new(
        broker: BrokerConfig,
        identity: &DeviceIdentity,
        topics: &Topics,
        reconnect_interval_ms: u32,
    ) -> Self {
        let client_id = format!("{}{}", broker.client_id_prefix, identity.as_str());
        Self {
            broker,
            client_id,
            subscriptions: [topics.commands.clone(), topics.commands_last.clone()],
            state: ConnectivityState::Disconnected,
            reconnect: IntervalTimer::immediate(reconnect_interval_ms),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Earliest uptime at which the next connect may be attempted.
    pub fn next_attempt_ms(&self) -> u64 {
        self.reconnect.next_due_ms()
    }

    /// Run once per tick.
    pub fn maintain(
        &mut self,
        link: ConnectivityState,
        bus: &mut impl MessageBus,
        now_ms: u64,
    ) -> SessionTick {
        if !link.is_connected() {
            if self.state != ConnectivityState::Disconnected || bus.is_connected() {
                warn!("Link down, dropping MQTT session");
                bus.disconnect();
            }
            self.state = ConnectivityState::Disconnected;
            return SessionTick {
                error: Some(SessionError::LinkDown),
                ..SessionTick::default()
            };
        }

        if self.state.is_connected() && !bus.is_connected() {
            warn!("MQTT session lost (state {})", bus.state_code());
            self.state = ConnectivityState::Disconnected;
        }

        if self.state.is_connected() {
            return SessionTick {
                inbound: bus.poll(),
                ..SessionTick::default()
            };
        }

        if !self.reconnect.poll(now_ms) {
            return SessionTick {
                error: Some(SessionError::ConnectFailed),
                ..SessionTick::default()
            };
        }

        match self.connect(bus) {
            Ok(()) => SessionTick {
                established: true,
                inbound: bus.poll(),
                error: None,
            },
            Err(e) => SessionTick {
                error: Some(e),
                ..SessionTick::default()
            },
        }
    }

    fn connect(&mut self, bus: &mut impl MessageBus) -> Result<(), SessionError> {
        self.state = ConnectivityState::Connecting;
        info!(
            "Attempting MQTT connection to {}:{} as {}",
            self.broker.host, self.broker.port, self.client_id
        );
        let endpoint = BrokerEndpoint {
            host: &self.broker.host,
            port: self.broker.port,
        };
        let credentials = SessionCredentials {
            username: &self.broker.username,
            password: &self.broker.password,
        };
        if !bus.connect(&endpoint, &self.client_id, &credentials) {
            warn!(
                "MQTT connect failed, state {}; retry in {} ms (at {} ms)",
                bus.state_code(),
                self.reconnect.period_ms(),
                self.next_attempt_ms()
            );
            self.state = ConnectivityState::Disconnected;
            return Err(SessionError::ConnectFailed);
        }

        self.state = ConnectivityState::Connected;
        info!("MQTT connected");
        for topic in &self.subscriptions {
            if bus.subscribe(topic, DeliveryLevel::AtLeastOnceQueued) {
                debug!("Subscribed to {topic}");
            } else {
                warn!("Subscribe to {topic} failed; retried on next reconnect");
            }
        }
        Ok(())
    }
}
