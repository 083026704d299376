//! FieldLink firmware entry point
//!
//! Boot sequence, then hand the adapters to the agent's tick loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiAdapter   MqttAdapter   ServoDriver   HttpOtaUpdater      │
//! │  (Link)        (MessageBus)  (Actuator)    (FirmwareUpdater)   │
//! │  EspSystem     Esp32Clock    NvsAdapter                        │
//! │  (System)      (Clock)       (Config)                          │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │                  Agent (pure logic)                    │    │
//! │  │  Link · Session · Dispatcher · Telemetry · Update      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::ledc::config::TimerConfig;
use esp_idf_svc::hal::ledc::{LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;

use fieldlink::adapters::device_id;
use fieldlink::adapters::http_ota::{HttpOtaUpdater, check_rollback};
use fieldlink::adapters::mqtt::MqttAdapter;
use fieldlink::adapters::nvs::NvsAdapter;
use fieldlink::adapters::system::EspSystem;
use fieldlink::adapters::time::{Esp32Clock, start_sntp};
use fieldlink::adapters::wifi::WifiAdapter;
use fieldlink::app::ports::DevicePorts;
use fieldlink::app::service::{Agent, load_config};
use fieldlink::config::AgentConfig;
use fieldlink::drivers::servo::{SERVO_FREQUENCY_HZ, ServoDriver};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  FieldLink agent v{}              ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1b. OTA rollback check ────────────────────────────────
    check_rollback();

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let config = match NvsAdapter::new(nvs_partition.clone()) {
        Ok(mut nvs) => load_config(&mut nvs),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            AgentConfig::default()
        }
    };

    // ── 3. Identity (fatal if unavailable) ────────────────────
    let wifi = EspWifi::new(peripherals.modem, sys_loop, Some(nvs_partition))?;
    let identity = device_id::resolve_identity().inspect_err(|e| {
        error!("Cannot form device topics ({}), halting", e);
    })?;
    info!("Device ID: {}", identity);

    // ── 4. Wall clock ─────────────────────────────────────────
    // Kept alive for the lifetime of main.
    let _sntp = start_sntp(&config.time.ntp_server)
        .inspect_err(|e| warn!("SNTP start failed ({:?}), timestamps stay 'unknown'", e))
        .ok();

    // ── 5. Servo on LEDC (signal on GPIO16) ───────────────────
    let timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::default()
            .frequency(SERVO_FREQUENCY_HZ.Hz())
            .resolution(Resolution::Bits14),
    )?;
    let channel = LedcDriver::new(peripherals.ledc.channel0, timer, peripherals.pins.gpio16)?;

    // ── 6. Agent ──────────────────────────────────────────────
    let ports = DevicePorts {
        link: WifiAdapter::new(wifi),
        bus: MqttAdapter::new(),
        actuator: ServoDriver::new(channel),
        updater: HttpOtaUpdater::new(),
        system: EspSystem::new(),
        clock: Esp32Clock::new(),
    };
    // SAFETY: hardware RNG read; RF is up so the output is true random.
    let seed = unsafe {
        u64::from(esp_idf_svc::sys::esp_random()) << 32 | u64::from(esp_idf_svc::sys::esp_random())
    };

    let mut agent = Agent::new(config, identity, ports, fastrand::Rng::with_seed(seed));
    agent.start();
    agent.run()
}
