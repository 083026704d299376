//! Agent context: the single owner of per-device mutable state.
//!
//! Identity and topics are fixed at boot. Connectivity flags are
//! refreshed every tick. The actuator position changes only through a
//! `SERVO_ANGLE` command.

use super::identity::{DeviceIdentity, Topics};
use super::link::ConnectivityState;
use super::ports::{ClockPort, LinkPort, SystemPort};
use super::telemetry::DeviceSnapshot;

#[derive(Debug, Clone)]
pub struct AgentContext {
    pub identity: DeviceIdentity,
    pub topics: Topics,
    pub link: ConnectivityState,
    pub session: ConnectivityState,
    /// Degrees, always within 0-180.
    pub actuator_position: u8,
}

impl AgentContext {
    pub fn new(identity: DeviceIdentity, actuator_position: u8) -> Self {
        let topics = Topics::for_device(&identity);
        Self {
            identity,
            topics,
            link: ConnectivityState::Disconnected,
            session: ConnectivityState::Disconnected,
            actuator_position: actuator_position.min(180),
        }
    }

    /// Sample the liveness fields for a report.
    pub fn snapshot(
        &self,
        link: &impl LinkPort,
        system: &impl SystemPort,
        clock: &impl ClockPort,
    ) -> DeviceSnapshot<'_> {
        DeviceSnapshot {
            node_id: self.identity.as_str(),
            uptime_ms: clock.uptime_ms(),
            free_heap: system.free_heap(),
            wifi_rssi: if self.link.is_connected() {
                link.signal_quality()
            } else {
                None
            },
            unix_time: clock.unix_time(),
            actuator_position: self.actuator_position,
        }
    }
}
