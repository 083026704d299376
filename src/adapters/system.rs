//! System services adapter: restart and heap statistics.
//!
//! Implements [`SystemPort`].

use log::info;

use crate::app::ports::SystemPort;

#[derive(Default)]
pub struct EspSystem {
    #[cfg(not(target_os = "espidf"))]
    restarts: u32,
}

impl EspSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulation: how many times a restart was requested.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_restarts(&self) -> u32 {
        self.restarts
    }
}

#[cfg(target_os = "espidf")]
impl SystemPort for EspSystem {
    fn restart(&mut self) {
        info!("System: restarting");
        // SAFETY: plain FFI call, never returns.
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    fn free_heap(&self) -> u32 {
        // SAFETY: read-only heap statistic.
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
    }
}

#[cfg(not(target_os = "espidf"))]
impl SystemPort for EspSystem {
    fn restart(&mut self) {
        info!("System: restart requested (simulation)");
        self.restarts += 1;
    }

    fn free_heap(&self) -> u32 {
        // Typical free heap on an ESP32 after WiFi + MQTT start.
        180_000
    }
}
