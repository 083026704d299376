//! MQTT adapter.
//!
//! Implements [`MessageBus`] on top of the ESP-IDF MQTT client. The
//! client delivers events on its own task; this adapter turns them into
//! a bounded inbox that [`MessageBus::poll`] drains once per tick, so the
//! dispatcher always runs on the agent's loop.
//!
//! ```text
//!   esp-mqtt task ──Received──▶ Mutex<VecDeque> ──poll()──▶ SessionManager
//!                 ──Connected/Disconnected──▶ AtomicBool
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::app::ports::{BrokerEndpoint, DeliveryLevel, InboundMessage, MessageBus, SessionCredentials};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, QoS};

/// Messages beyond this are dropped oldest-first.
const INBOX_CAPACITY: usize = 16;

/// Upper bound on one connect handshake.
#[cfg(target_os = "espidf")]
const CONNECT_TIMEOUT_MS: u32 = 5_000;
#[cfg(target_os = "espidf")]
const CONNECT_POLL_MS: u32 = 50;

/// State shared with the client's event callback.
#[derive(Default)]
struct Shared {
    connected: AtomicBool,
    inbox: Mutex<VecDeque<InboundMessage>>,
}

impl Shared {
    fn push(&self, message: InboundMessage) {
        let Ok(mut inbox) = self.inbox.lock() else {
            warn!("MQTT: inbox poisoned, dropping message on {}", message.topic);
            return;
        };
        if inbox.len() >= INBOX_CAPACITY {
            if let Some(dropped) = inbox.pop_front() {
                warn!("MQTT: inbox full, dropped message on {}", dropped.topic);
            }
        }
        inbox.push_back(message);
    }

    fn drain(&self) -> Vec<InboundMessage> {
        match self.inbox.lock() {
            Ok(mut inbox) => inbox.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub struct MqttAdapter {
    shared: Arc<Shared>,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

/// In-memory broker for host tests.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
struct SimBroker {
    unreachable: bool,
    connects: u32,
    subscriptions: Vec<(String, DeliveryLevel)>,
    published: Vec<(String, Vec<u8>)>,
}

impl Default for MqttAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttAdapter {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            sim: SimBroker::default(),
        }
    }
}

// ── ESP-IDF ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn qos(level: DeliveryLevel) -> QoS {
    match level {
        DeliveryLevel::AtMostOnce => QoS::AtMostOnce,
        DeliveryLevel::AtLeastOnceQueued => QoS::AtLeastOnce,
    }
}

#[cfg(target_os = "espidf")]
impl MqttAdapter {
    fn platform_connect(
        &mut self,
        endpoint: &BrokerEndpoint<'_>,
        client_id: &str,
        credentials: &SessionCredentials<'_>,
    ) -> bool {
        use esp_idf_svc::hal::delay::FreeRtos;
        use esp_idf_svc::mqtt::client::{Details, EventPayload, MqttClientConfiguration};

        // A stale client would keep reconnecting on its own.
        self.client = None;
        self.shared.connected.store(false, Ordering::Release);

        let url = format!("mqtt://{}:{}", endpoint.host, endpoint.port);
        let config = MqttClientConfiguration {
            client_id: Some(client_id),
            username: (!credentials.username.is_empty()).then_some(credentials.username),
            password: (!credentials.password.is_empty()).then_some(credentials.password),
            keep_alive_interval: Some(core::time::Duration::from_secs(15)),
            ..Default::default()
        };

        let shared = Arc::clone(&self.shared);
        let client = EspMqttClient::new_cb(&url, &config, move |event| match event.payload() {
            EventPayload::Connected(_) => shared.connected.store(true, Ordering::Release),
            EventPayload::Disconnected => shared.connected.store(false, Ordering::Release),
            EventPayload::Received {
                topic: Some(topic),
                data,
                details: Details::Complete,
                ..
            } => shared.push(InboundMessage {
                topic: topic.to_owned(),
                payload: data.to_vec(),
            }),
            EventPayload::Received { .. } => warn!("MQTT: fragmented message dropped"),
            EventPayload::Error(e) => warn!("MQTT: {:?}", e),
            _ => {}
        });
        let client = match client {
            Ok(c) => c,
            Err(e) => {
                warn!("MQTT: client init for {} failed: {:?}", url, e);
                return false;
            }
        };
        self.client = Some(client);

        let mut waited = 0;
        while waited < CONNECT_TIMEOUT_MS {
            if self.shared.connected.load(Ordering::Acquire) {
                return true;
            }
            FreeRtos::delay_ms(CONNECT_POLL_MS);
            waited += CONNECT_POLL_MS;
        }
        self.client = None;
        false
    }

    fn platform_subscribe(&mut self, topic: &str, level: DeliveryLevel) -> bool {
        let Some(client) = self.client.as_mut() else {
            return false;
        };
        match client.subscribe(topic, qos(level)) {
            Ok(_) => true,
            Err(e) => {
                warn!("MQTT: subscribe {} failed: {:?}", topic, e);
                false
            }
        }
    }

    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        if !self.shared.connected.load(Ordering::Acquire) {
            return false;
        }
        let Some(client) = self.client.as_mut() else {
            return false;
        };
        match client.publish(topic, QoS::AtMostOnce, false, payload) {
            Ok(_) => true,
            Err(e) => {
                warn!("MQTT: publish {} failed: {:?}", topic, e);
                false
            }
        }
    }

    fn platform_disconnect(&mut self) {
        self.client = None;
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    fn platform_connect(
        &mut self,
        endpoint: &BrokerEndpoint<'_>,
        _client_id: &str,
        _credentials: &SessionCredentials<'_>,
    ) -> bool {
        self.sim.connects += 1;
        self.sim.subscriptions.clear();
        let up = !self.sim.unreachable;
        self.shared.connected.store(up, Ordering::Release);
        debug!("MQTT(sim): connect to {}:{} -> {}", endpoint.host, endpoint.port, up);
        up
    }

    fn platform_subscribe(&mut self, topic: &str, level: DeliveryLevel) -> bool {
        if !self.shared.connected.load(Ordering::Acquire) {
            return false;
        }
        self.sim.subscriptions.push((topic.to_owned(), level));
        true
    }

    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        if !self.shared.connected.load(Ordering::Acquire) {
            return false;
        }
        self.sim.published.push((topic.to_owned(), payload.to_vec()));
        true
    }

    fn platform_disconnect(&mut self) {}

    /// Simulation: broker-side delivery. Dropped unless subscribed.
    pub fn sim_deliver(&mut self, topic: &str, payload: &[u8]) -> bool {
        let subscribed = self.shared.connected.load(Ordering::Acquire)
            && self.sim.subscriptions.iter().any(|(t, _)| t == topic);
        if subscribed {
            self.shared.push(InboundMessage {
                topic: topic.to_owned(),
                payload: payload.to_vec(),
            });
        }
        subscribed
    }

    /// Simulation: broker goes away (or comes back).
    pub fn sim_set_unreachable(&mut self, unreachable: bool) {
        self.sim.unreachable = unreachable;
        if unreachable {
            self.shared.connected.store(false, Ordering::Release);
        }
    }

    pub fn sim_connects(&self) -> u32 {
        self.sim.connects
    }

    pub fn sim_subscriptions(&self) -> &[(String, DeliveryLevel)] {
        &self.sim.subscriptions
    }

    pub fn sim_published(&self) -> &[(String, Vec<u8>)] {
        &self.sim.published
    }
}

// ───────────────────────────────────────────────────────────────
// MessageBus
// ───────────────────────────────────────────────────────────────

impl MessageBus for MqttAdapter {
    fn connect(
        &mut self,
        endpoint: &BrokerEndpoint<'_>,
        client_id: &str,
        credentials: &SessionCredentials<'_>,
    ) -> bool {
        let ok = self.platform_connect(endpoint, client_id, credentials);
        if ok {
            info!("MQTT: session open as {}", client_id);
        }
        ok
    }

    fn subscribe(&mut self, topic: &str, level: DeliveryLevel) -> bool {
        self.platform_subscribe(topic, level)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        self.platform_publish(topic, payload)
    }

    fn poll(&mut self) -> Vec<InboundMessage> {
        self.shared.drain()
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.shared.connected.store(false, Ordering::Release);
        let stale = self.shared.drain().len();
        if stale > 0 {
            debug!("MQTT: discarded {} undelivered messages", stale);
        }
    }

    fn state_code(&self) -> i32 {
        // -1 disconnected, 0 connected
        if self.is_connected() { 0 } else { -1 }
    }
}
