//! ESP32 time adapter.
//!
//! Implements [`ClockPort`]: monotonic uptime, blocking delay, and the
//! SNTP-synced wall clock.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` for uptime,
//!   FreeRTOS delay, `gettimeofday()` for wall time.
//! - **`not(target_os = "espidf")`**: `std::time` for host-side tests
//!   and simulation.

use crate::app::ports::ClockPort;

/// Wall clock earlier than this (2020-01-01) is treated as unsynced.
const EPOCH_2020: i64 = 1_577_836_800;

/// Time adapter for the ESP32 platform.
pub struct Esp32Clock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32Clock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

#[cfg(target_os = "espidf")]
impl ClockPort for Esp32Clock {
    fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    fn delay_ms(&mut self, ms: u32) {
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(ms);
    }

    fn unix_time(&self) -> Option<i64> {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        let secs = tv.tv_sec as i64;
        (secs >= EPOCH_2020).then_some(secs)
    }
}

#[cfg(not(target_os = "espidf"))]
impl ClockPort for Esp32Clock {
    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }

    fn unix_time(&self) -> Option<i64> {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_secs() as i64;
        (secs >= EPOCH_2020).then_some(secs)
    }
}

/// Start SNTP against `server`. The handle must stay alive for syncing
/// to continue.
#[cfg(target_os = "espidf")]
pub fn start_sntp(
    server: &str,
) -> Result<esp_idf_svc::sntp::EspSntp<'static>, esp_idf_svc::sys::EspError> {
    use esp_idf_svc::sntp::{EspSntp, SntpConf};

    let mut conf = SntpConf::default();
    conf.servers[0] = server;
    let sntp = EspSntp::new(&conf)?;
    log::info!("SNTP started against {}", server);
    Ok(sntp)
}
