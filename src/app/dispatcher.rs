//! Command dispatcher.
//!
//! Routes one inbound message to exactly one handler:
//!
//! | action            | effect                                   | status              |
//! |-------------------|------------------------------------------|---------------------|
//! | `REBOOT`          | report, grace delay, restart             | `rebooting`         |
//! | `STATUS_REQUEST`  | report                                   | `online`            |
//! | `FIRMWARE_UPDATE` | supervised update                        | update outcome      |
//! | `SERVO_ANGLE`     | clamp, drive actuator, store, report     | `servo_updated`     |
//! | anything else     | log                                      | -                   |
//!
//! The live and retained-fallback command topics are handled the same
//! way; the fallback is only a delivery path for commands missed while
//! offline. Undecodable payloads are logged and dropped.

use log::{debug, info, warn};

use crate::error::Result;

use super::commands::{Command, clamp_angle};
use super::context::AgentContext;
use super::ports::{
    ActuatorPort, ClockPort, DevicePorts, FirmwareUpdater, InboundMessage, LinkPort, MessageBus,
    SystemPort,
};
use super::telemetry::{Status, TelemetryPublisher};
use super::update::{UpdateSupervisor, outcome_status};

pub struct CommandDispatcher {
    reboot_grace_ms: u32,
    supervisor: UpdateSupervisor,
}

impl CommandDispatcher {
    pub fn new(reboot_grace_ms: u32) -> Self {
        Self {
            reboot_grace_ms,
            supervisor: UpdateSupervisor::new(),
        }
    }

    pub fn handle_message<L, B, A, U, S, C>(
        &self,
        message: &InboundMessage,
        ctx: &mut AgentContext,
        telemetry: &TelemetryPublisher,
        ports: &mut DevicePorts<L, B, A, U, S, C>,
    ) -> Result<Option<Status>>
    where
        L: LinkPort,
        B: MessageBus,
        A: ActuatorPort,
        U: FirmwareUpdater,
        S: SystemPort,
        C: ClockPort,
    {
        self.handle(&message.payload, &message.topic, ctx, telemetry, ports)
    }

    /// Decode and execute one command. Returns the status reported, if any.
    ///
    /// A recognised action with a missing field is reported as
    /// `command_rejected` and returned as an error; nothing else changes.
    pub fn handle<L, B, A, U, S, C>(
        &self,
        payload: &[u8],
        topic: &str,
        ctx: &mut AgentContext,
        telemetry: &TelemetryPublisher,
        ports: &mut DevicePorts<L, B, A, U, S, C>,
    ) -> Result<Option<Status>>
    where
        L: LinkPort,
        B: MessageBus,
        A: ActuatorPort,
        U: FirmwareUpdater,
        S: SystemPort,
        C: ClockPort,
    {
        info!(
            "Message arrived [{}]: {}",
            topic,
            String::from_utf8_lossy(payload)
        );
        if !ctx.topics.is_command_topic(topic) {
            debug!("Ignoring message on non-command topic {topic}");
            return Ok(None);
        }
        if ctx.topics.is_retained_fallback(topic) {
            info!("Processing retained command from {topic}");
        }

        let command = Command::decode(payload).inspect_err(|e| {
            warn!("Dropping command: {e}");
        })?;
        if let Err(e) = command.validate() {
            warn!("Rejecting command: {e}");
            report(ctx, telemetry, ports, Status::CommandRejected);
            return Err(e.into());
        }

        match command {
            Command::Reboot => {
                report(ctx, telemetry, ports, Status::Rebooting);
                info!("Rebooting in {} ms", self.reboot_grace_ms);
                ports.clock.delay_ms(self.reboot_grace_ms);
                ports.system.restart();
                Ok(Some(Status::Rebooting))
            }
            Command::StatusRequest => {
                report(ctx, telemetry, ports, Status::Online);
                Ok(Some(Status::Online))
            }
            Command::FirmwareUpdate { url: Some(url) } => {
                let DevicePorts {
                    link,
                    bus,
                    updater,
                    system,
                    clock,
                    ..
                } = ports;
                let ctx = &*ctx;
                let outcome = self.supervisor.perform_update(&url, updater, |status| {
                    let snapshot = ctx.snapshot(&*link, &*system, &*clock);
                    let _ = telemetry.publish_status(status, &snapshot, &mut *bus);
                });
                Ok(Some(outcome_status(&outcome)))
            }
            Command::SetActuatorPosition { angle: Some(angle) } => {
                let position = clamp_angle(angle);
                ports.actuator.set_position(position);
                ctx.actuator_position = position;
                info!("Servo angle set to {position}");
                report(ctx, telemetry, ports, Status::ActuatorUpdated);
                Ok(Some(Status::ActuatorUpdated))
            }
            Command::FirmwareUpdate { url: None } | Command::SetActuatorPosition { angle: None } => {
                // validate() already rejected these
                Ok(None)
            }
            Command::Unknown(action) => {
                warn!("Unknown action: {action}");
                Ok(None)
            }
        }
    }
}

/// Publish a status report; failures are logged by the publisher.
fn report<L, B, A, U, S, C>(
    ctx: &AgentContext,
    telemetry: &TelemetryPublisher,
    ports: &mut DevicePorts<L, B, A, U, S, C>,
    status: Status,
) where
    L: LinkPort,
    B: MessageBus,
    S: SystemPort,
    C: ClockPort,
{
    let snapshot = ctx.snapshot(&ports.link, &ports.system, &ports.clock);
    let _ = telemetry.publish_status(status, &snapshot, &mut ports.bus);
}
