//! The agent wired to the host simulation adapters instead of mocks.
//!
//! Same composition as `main.rs` on the device, minus the radio: the
//! simulated WiFi link, MQTT broker, OTA server and system services, a
//! servo on a null PWM channel, and the manual test clock.

use core::convert::Infallible;

use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use fieldlink::adapters::http_ota::{HttpOtaUpdater, SimResponse};
use fieldlink::adapters::mqtt::MqttAdapter;
use fieldlink::adapters::system::EspSystem;
use fieldlink::adapters::wifi::WifiAdapter;
use fieldlink::app::link::ConnectivityState;
use fieldlink::app::ports::DevicePorts;
use fieldlink::app::service::Agent;
use fieldlink::config::AgentConfig;
use fieldlink::drivers::servo::ServoDriver;
use serde_json::Value;

use crate::mock_ports::{COMMAND_TOPIC, FALLBACK_TOPIC, MockClock, identity, init_logging};

/// LEDC stand-in that accepts every duty value.
struct NullPwm;

impl ErrorType for NullPwm {
    type Error = Infallible;
}

impl SetDutyCycle for NullPwm {
    fn max_duty_cycle(&self) -> u16 {
        20_000
    }

    fn set_duty_cycle(&mut self, _duty: u16) -> Result<(), Infallible> {
        Ok(())
    }
}

type SimAgent = Agent<
    WifiAdapter,
    MqttAdapter,
    ServoDriver<NullPwm>,
    HttpOtaUpdater,
    EspSystem,
    MockClock,
>;

fn sim_agent() -> SimAgent {
    init_logging();
    let ports = DevicePorts {
        link: WifiAdapter::new(),
        bus: MqttAdapter::new(),
        actuator: ServoDriver::new(NullPwm),
        updater: HttpOtaUpdater::new(),
        system: EspSystem::new(),
        clock: MockClock::default(),
    };
    let mut agent = Agent::new(
        AgentConfig::default(),
        identity(),
        ports,
        fastrand::Rng::with_seed(11),
    );
    agent.start();
    agent
}

fn statuses(agent: &SimAgent) -> Vec<String> {
    agent
        .ports()
        .bus
        .sim_published()
        .iter()
        .map(|(_, p)| {
            let v: Value = serde_json::from_slice(p).unwrap();
            v["status"].as_str().unwrap().to_owned()
        })
        .collect()
}

#[test]
fn boots_and_serves_commands_over_sim_broker() {
    let mut agent = sim_agent();
    assert_eq!(agent.ports().actuator.angle(), Some(90));

    agent.tick();
    assert_eq!(agent.session_state(), ConnectivityState::Connected);
    assert_eq!(agent.ports().link.sim_begin_count(), 1);
    assert_eq!(agent.ports().bus.sim_subscriptions().len(), 2);
    assert_eq!(statuses(&agent), vec!["online"]);

    let bus = &mut agent.ports_mut().bus;
    assert!(bus.sim_deliver(COMMAND_TOPIC, br#"{"action":"SERVO_ANGLE","angle":200}"#));
    agent.tick();

    assert_eq!(agent.ports().actuator.angle(), Some(180));
    assert_eq!(agent.context().actuator_position, 180);
    assert_eq!(statuses(&agent), vec!["online", "servo_updated"]);
}

#[test]
fn firmware_update_from_retained_command_stages_and_activates() {
    let mut agent = sim_agent();
    agent.tick();

    let url = "http://fw.local/fieldlink-2.1.bin";
    agent
        .ports_mut()
        .updater
        .sim_serve(url, SimResponse::image(vec![0xE9; 10_000]));
    let payload = format!(r#"{{"action":"FIRMWARE_UPDATE","url":"{url}"}}"#);
    assert!(agent.ports_mut().bus.sim_deliver(FALLBACK_TOPIC, payload.as_bytes()));
    agent.tick();

    assert_eq!(statuses(&agent), vec!["online", "updating", "update_success"]);
    assert_eq!(agent.ports().updater.sim_activations(), 1);
}

#[test]
fn unreachable_update_server_reports_failure() {
    let mut agent = sim_agent();
    agent.tick();

    agent.ports_mut().bus.sim_deliver(
        COMMAND_TOPIC,
        br#"{"action":"FIRMWARE_UPDATE","url":"http://nowhere/fw.bin"}"#,
    );
    agent.tick();

    assert_eq!(statuses(&agent), vec!["online", "updating", "update_failed"]);
    assert_eq!(agent.ports().updater.sim_activations(), 0);
}

#[test]
fn reboot_command_restarts_after_grace() {
    let mut agent = sim_agent();
    agent.tick();

    agent
        .ports_mut()
        .bus
        .sim_deliver(COMMAND_TOPIC, br#"{"action":"REBOOT"}"#);
    agent.tick();

    assert_eq!(statuses(&agent), vec!["online", "rebooting"]);
    assert_eq!(agent.ports().system.sim_restarts(), 1);
    assert_eq!(agent.ports().clock.slept_ms, 2_000);
}

#[test]
fn broker_outage_recovers_on_reconnect_timer() {
    let mut agent = sim_agent();
    agent.tick();

    agent.ports_mut().bus.sim_set_unreachable(true);
    agent.ports_mut().clock.advance(1_000);
    agent.tick();
    assert_eq!(agent.session_state(), ConnectivityState::Disconnected);

    agent.ports_mut().bus.sim_set_unreachable(false);
    agent.ports_mut().clock.advance(1_000);
    agent.tick();
    // Last attempt was at 0 ms; next one is due at 5 s.
    assert_eq!(agent.ports().bus.sim_connects(), 1);

    agent.ports_mut().clock.advance(3_000);
    agent.tick();
    assert_eq!(agent.session_state(), ConnectivityState::Connected);
    assert_eq!(agent.ports().bus.sim_connects(), 2);
    assert_eq!(agent.ports().bus.sim_subscriptions().len(), 2);
}

#[test]
fn wifi_drop_is_repaired_on_next_tick() {
    let mut agent = sim_agent();
    agent.tick();

    agent.ports_mut().link.sim_drop(false);
    agent.tick();

    assert_eq!(agent.link_state(), ConnectivityState::Connected);
    assert_eq!(agent.ports().link.sim_begin_count(), 2);
    // Nothing slept: the sim associates as soon as it is asked.
    assert_eq!(agent.ports().clock.slept_ms, 0);
}
