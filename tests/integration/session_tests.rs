//! Integration tests for the message-bus session on top of the link.

use fieldlink::app::link::ConnectivityState;
use fieldlink::app::ports::DeliveryLevel;
use fieldlink::app::session::SessionManager;
use fieldlink::app::identity::Topics;
use fieldlink::config::AgentConfig;
use fieldlink::error::SessionError;

use crate::mock_ports::{COMMAND_TOPIC, FALLBACK_TOPIC, MockBus, identity, init_logging};

const UP: ConnectivityState = ConnectivityState::Connected;
const DOWN: ConnectivityState = ConnectivityState::Disconnected;

fn session() -> SessionManager {
    let cfg = AgentConfig::default();
    let id = identity();
    SessionManager::new(cfg.broker, &id, &Topics::for_device(&id), 5_000)
}

#[test]
fn connect_subscribes_both_command_topics_with_queued_delivery() {
    init_logging();
    let mut s = session();
    let mut bus = MockBus::new(true);

    let tick = s.maintain(UP, &mut bus, 0);

    assert!(tick.established);
    assert_eq!(tick.error, None);
    assert_eq!(s.state(), ConnectivityState::Connected);
    assert_eq!(bus.client_ids, vec!["ESP32-AABBCCDDEEFF"]);
    assert_eq!(
        bus.subscriptions,
        vec![
            (COMMAND_TOPIC.to_owned(), DeliveryLevel::AtLeastOnceQueued),
            (FALLBACK_TOPIC.to_owned(), DeliveryLevel::AtLeastOnceQueued),
        ]
    );
}

#[test]
fn refused_subscription_keeps_session_and_retries_on_reconnect() {
    init_logging();
    let mut s = session();
    let mut bus = MockBus {
        reject_subscribe: true,
        ..MockBus::new(true)
    };

    let tick = s.maintain(UP, &mut bus, 0);
    assert!(tick.established);
    assert_eq!(tick.error, None);
    assert_eq!(s.state(), ConnectivityState::Connected);
    assert_eq!(bus.subscriptions.len(), 2);

    // Broker drops us; it accepts subscriptions on the next session.
    bus.connected = false;
    bus.reject_subscribe = false;
    let tick = s.maintain(UP, &mut bus, 5_000);

    assert!(tick.established);
    assert_eq!(bus.connects, 2);
    let topics: Vec<&str> = bus.subscriptions.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(
        topics,
        vec![COMMAND_TOPIC, FALLBACK_TOPIC, COMMAND_TOPIC, FALLBACK_TOPIC]
    );
}

#[test]
fn failed_connect_waits_full_interval_before_retry() {
    let mut s = session();
    let mut bus = MockBus::new(false);

    let tick = s.maintain(UP, &mut bus, 0);
    assert!(!tick.established);
    assert_eq!(tick.error, Some(SessionError::ConnectFailed));
    assert_eq!(bus.connects, 1);
    assert_eq!(s.next_attempt_ms(), 5_000);

    for now in [100, 1_000, 4_999] {
        s.maintain(UP, &mut bus, now);
        assert_eq!(bus.connects, 1, "no attempt expected at {now} ms");
        assert_eq!(s.state(), ConnectivityState::Disconnected);
    }

    s.maintain(UP, &mut bus, 5_000);
    assert_eq!(bus.connects, 2);
}

#[test]
fn link_loss_forces_session_down() {
    let mut s = session();
    let mut bus = MockBus::new(true);
    assert!(s.maintain(UP, &mut bus, 0).established);

    let tick = s.maintain(DOWN, &mut bus, 1_000);

    assert_eq!(tick.error, Some(SessionError::LinkDown));
    assert_eq!(s.state(), ConnectivityState::Disconnected);
    assert_eq!(bus.disconnects, 1);
    assert!(!bus.connected);

    // Still link-down: nothing more to tear down.
    s.maintain(DOWN, &mut bus, 2_000);
    assert_eq!(bus.disconnects, 1);
    assert_eq!(bus.connects, 1);
}

#[test]
fn session_returns_after_link_recovers_on_timer() {
    let mut s = session();
    let mut bus = MockBus::new(true);
    s.maintain(UP, &mut bus, 0);
    s.maintain(DOWN, &mut bus, 1_000);

    assert!(!s.maintain(UP, &mut bus, 2_000).established);
    assert_eq!(bus.connects, 1);

    assert!(s.maintain(UP, &mut bus, 5_000).established);
    assert_eq!(bus.connects, 2);
}

#[test]
fn broker_drop_is_noticed_and_retried() {
    let mut s = session();
    let mut bus = MockBus::new(true);
    s.maintain(UP, &mut bus, 0);

    bus.connected = false;
    let tick = s.maintain(UP, &mut bus, 6_000);

    // Timer was due, so the drop is repaired in the same call.
    assert!(tick.established);
    assert_eq!(bus.connects, 2);
}

#[test]
fn buffered_messages_are_drained_each_tick() {
    let mut s = session();
    let mut bus = MockBus::new(true);
    bus.queue(FALLBACK_TOPIC, r#"{"action":"STATUS_REQUEST"}"#);

    let tick = s.maintain(UP, &mut bus, 0);
    assert_eq!(tick.inbound.len(), 1);
    assert_eq!(tick.inbound[0].topic, FALLBACK_TOPIC);

    bus.queue(COMMAND_TOPIC, r#"{"action":"REBOOT"}"#);
    bus.queue(COMMAND_TOPIC, r#"{"action":"STATUS_REQUEST"}"#);
    let tick = s.maintain(UP, &mut bus, 100);
    assert!(!tick.established);
    assert_eq!(tick.inbound.len(), 2);
    assert!(bus.inbound.is_empty());
}
