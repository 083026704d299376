//! Agent service, the hexagonal core.
//!
//! [`Agent`] owns the context, the components, and every port adapter.
//! One [`tick`](Agent::tick) is one pass of the cooperative loop:
//!
//! ```text
//!   LinkManager ──▶ SessionManager ──▶ CommandDispatcher ──▶ TelemetryPublisher
//!   (may block     (connect gated     (every buffered      (periodic report,
//!    ~10 s)         by 5 s timer)      message)             position log)
//! ```
//!
//! No error escapes a tick. Each stage logs what went wrong and the next
//! tick re-evaluates from the current state.

use log::{info, warn};

use crate::config::{AgentConfig, validate_config};
use crate::scheduler::IntervalTimer;

use super::context::AgentContext;
use super::dispatcher::CommandDispatcher;
use super::identity::DeviceIdentity;
use super::link::{ConnectivityState, LinkManager};
use super::ports::{
    ActuatorPort, ClockPort, ConfigError, ConfigPort, DevicePorts, FirmwareUpdater, LinkPort,
    MessageBus, SystemPort,
};
use super::session::SessionManager;
use super::telemetry::{EnvironmentModel, Status, TelemetryPublisher};

// ───────────────────────────────────────────────────────────────
// Agent
// ───────────────────────────────────────────────────────────────

pub struct Agent<L, B, A, U, S, C> {
    ctx: AgentContext,
    ports: DevicePorts<L, B, A, U, S, C>,
    link: LinkManager,
    session: SessionManager,
    dispatcher: CommandDispatcher,
    telemetry: TelemetryPublisher,
    telemetry_timer: IntervalTimer,
    position_log_timer: IntervalTimer,
    loop_idle_ms: u32,
    tick_count: u64,
}

impl<L, B, A, U, S, C> Agent<L, B, A, U, S, C>
where
    L: LinkPort,
    B: MessageBus,
    A: ActuatorPort,
    U: FirmwareUpdater,
    S: SystemPort,
    C: ClockPort,
{
    /// Wire the components. Does not touch hardware; call [`start`](Self::start) next.
    pub fn new(
        config: AgentConfig,
        identity: DeviceIdentity,
        ports: DevicePorts<L, B, A, U, S, C>,
        rng: fastrand::Rng,
    ) -> Self {
        let ctx = AgentContext::new(identity, config.initial_actuator_position);
        let now = ports.clock.uptime_ms();
        let timing = &config.timing;

        let session = SessionManager::new(
            config.broker.clone(),
            &ctx.identity,
            &ctx.topics,
            timing.session_reconnect_interval_ms,
        );
        let telemetry = TelemetryPublisher::new(
            ctx.topics.telemetry.clone(),
            config.time.clone(),
            EnvironmentModel::new(config.environment.clone(), rng),
        );

        Self {
            telemetry_timer: IntervalTimer::new(timing.telemetry_interval_ms, now),
            position_log_timer: IntervalTimer::new(timing.actuator_report_interval_ms, now),
            loop_idle_ms: timing.loop_idle_ms,
            dispatcher: CommandDispatcher::new(timing.reboot_grace_ms),
            link: LinkManager::new(config.link),
            session,
            telemetry,
            ctx,
            ports,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Apply the boot-time actuator position.
    pub fn start(&mut self) {
        self.ports.actuator.set_position(self.ctx.actuator_position);
        info!(
            "Agent started as {} (servo at {}°)",
            self.ctx.identity, self.ctx.actuator_position
        );
        info!(
            "Topics: publish {}, subscribe {} and {}",
            self.ctx.topics.telemetry, self.ctx.topics.commands, self.ctx.topics.commands_last
        );
    }

    /// Tick forever with the configured idle sleep between passes.
    pub fn run(&mut self) -> ! {
        loop {
            self.tick();
            self.ports.clock.delay_ms(self.loop_idle_ms);
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    pub fn tick(&mut self) {
        self.tick_count += 1;

        // 1. Link
        let _ = self
            .link
            .ensure_connected(&mut self.ports.link, &mut self.ports.clock);
        self.ctx.link = self.link.state();

        // 2. Session (forced down with the link)
        let now = self.ports.clock.uptime_ms();
        let session = self.session.maintain(self.ctx.link, &mut self.ports.bus, now);
        self.ctx.session = self.session.state();
        if session.established {
            self.report(Status::Online);
        }

        // 3. Inbound commands
        for message in &session.inbound {
            if let Err(e) =
                self.dispatcher
                    .handle_message(message, &mut self.ctx, &self.telemetry, &mut self.ports)
            {
                warn!("Command on {} not executed: {e}", message.topic);
            }
        }

        // 4. Periodic telemetry
        let now = self.ports.clock.uptime_ms();
        if self.telemetry_timer.poll(now) {
            let snapshot = self
                .ctx
                .snapshot(&self.ports.link, &self.ports.system, &self.ports.clock);
            if let Err(e) = self.telemetry.publish_periodic(&snapshot, &mut self.ports.bus) {
                warn!("Periodic telemetry dropped: {e}");
            }
        }

        // 5. Position log
        if self.position_log_timer.poll(now) {
            info!("Current servo angle: {}", self.ctx.actuator_position);
        }
    }

    fn report(&mut self, status: Status) {
        let snapshot = self
            .ctx
            .snapshot(&self.ports.link, &self.ports.system, &self.ports.clock);
        let _ = self
            .telemetry
            .publish_status(status, &snapshot, &mut self.ports.bus);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    pub fn ports(&self) -> &DevicePorts<L, B, A, U, S, C> {
        &self.ports
    }

    /// Mutable port access, for injecting faults in simulation.
    pub fn ports_mut(&mut self) -> &mut DevicePorts<L, B, A, U, S, C> {
        &mut self.ports
    }

    pub fn link_state(&self) -> ConnectivityState {
        self.ctx.link
    }

    pub fn session_state(&self) -> ConnectivityState {
        self.ctx.session
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration bootstrap
// ───────────────────────────────────────────────────────────────

/// Load the persisted configuration, falling back to defaults.
///
/// On first boot (or after corruption) the defaults are written back so
/// the next boot reads a valid blob.
pub fn load_config(store: &mut impl ConfigPort) -> AgentConfig {
    match store.load() {
        Ok(config) => match validate_config(&config) {
            Ok(()) => {
                info!("Loaded configuration from storage");
                config
            }
            Err(msg) => {
                warn!("Stored configuration invalid ({msg}), using defaults");
                AgentConfig::default()
            }
        },
        Err(e) => {
            let config = AgentConfig::default();
            if matches!(e, ConfigError::NotFound | ConfigError::Corrupted) {
                info!("No usable stored configuration ({e}), persisting defaults");
                if let Err(e) = store.save(&config) {
                    warn!("Persisting default configuration failed: {e}");
                }
            } else {
                warn!("Configuration load failed ({e}), using defaults");
            }
            config
        }
    }
}
