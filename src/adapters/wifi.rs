//! WiFi station-mode adapter.
//!
//! Implements [`LinkPort`], the hexagonal boundary for network
//! connectivity. [`LinkPort::begin`] only issues the association request;
//! the [`LinkManager`](crate::app::link::LinkManager) polls
//! [`LinkPort::is_connected`] for the outcome.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.

use core::fmt;
use core::net::Ipv4Addr;
use log::{info, warn};

use crate::app::ports::{LinkCredentials, LinkPort};

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::EspWifi;

// ───────────────────────────────────────────────────────────────
// Credential validation
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    InvalidSsid,
    InvalidPassword,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
        }
    }
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_credentials(credentials: &LinkCredentials<'_>) -> Result<(), CredentialError> {
    let ssid = credentials.ssid;
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(CredentialError::InvalidSsid);
    }
    let password = credentials.password;
    if !password.is_empty() && !(8..=64).contains(&password.len()) {
        return Err(CredentialError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimLink,
}

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
struct SimLink {
    associated: bool,
    /// Refuse every association while set.
    out_of_range: bool,
    begin_count: u32,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    pub fn new(wifi: EspWifi<'static>) -> Self {
        Self { wifi }
    }

    fn platform_begin(&mut self, credentials: &LinkCredentials<'_>) -> bool {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        let (Ok(ssid), Ok(password)) = (credentials.ssid.try_into(), credentials.password.try_into())
        else {
            return false;
        };
        let auth_method = if credentials.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid,
            password,
            auth_method,
            ..Default::default()
        });
        if let Err(e) = self.wifi.set_configuration(&config) {
            warn!("WiFi: set_configuration failed: {:?}", e);
            return false;
        }
        if !self.wifi.is_started().unwrap_or(false) {
            if let Err(e) = self.wifi.start() {
                warn!("WiFi: start failed: {:?}", e);
                return false;
            }
        }
        match self.wifi.connect() {
            Ok(()) => true,
            Err(e) => {
                warn!("WiFi: connect request failed: {:?}", e);
                false
            }
        }
    }

    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.sta_netif().is_up().unwrap_or(false)
    }

    fn platform_address(&self) -> Option<Ipv4Addr> {
        self.wifi
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
            .filter(|ip| !ip.is_unspecified())
    }

    fn platform_rssi(&self) -> Option<i8> {
        use esp_idf_svc::sys::{ESP_OK, esp_wifi_sta_get_ap_info, wifi_ap_record_t};

        let mut ap_info: wifi_ap_record_t = Default::default();
        // SAFETY: ap_info is a valid, writable record for the driver to fill.
        let ret = unsafe { esp_wifi_sta_get_ap_info(&mut ap_info) };
        (ret == ESP_OK).then_some(ap_info.rssi)
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            sim: SimLink::default(),
        }
    }

    /// Simulation: drop the association (AP gone, out of range).
    pub fn sim_drop(&mut self, out_of_range: bool) {
        self.sim.associated = false;
        self.sim.out_of_range = out_of_range;
    }

    pub fn sim_begin_count(&self) -> u32 {
        self.sim.begin_count
    }

    fn platform_begin(&mut self, _credentials: &LinkCredentials<'_>) -> bool {
        self.sim.begin_count += 1;
        self.sim.associated = !self.sim.out_of_range;
        true
    }

    fn platform_is_connected(&self) -> bool {
        self.sim.associated
    }

    fn platform_address(&self) -> Option<Ipv4Addr> {
        self.sim.associated.then_some(Ipv4Addr::new(192, 168, 1, 50))
    }

    fn platform_rssi(&self) -> Option<i8> {
        if !self.sim.associated {
            return None;
        }
        // -66..-55 dBm, varying per association
        let oscillation = (self.sim.begin_count % 12) as i8 - 6;
        Some((-60_i8).saturating_add(oscillation))
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// LinkPort
// ───────────────────────────────────────────────────────────────

impl LinkPort for WifiAdapter {
    fn begin(&mut self, credentials: &LinkCredentials<'_>) -> bool {
        if let Err(e) = validate_credentials(credentials) {
            warn!("WiFi: {}", e);
            return false;
        }
        let issued = self.platform_begin(credentials);
        if issued {
            info!("WiFi: association requested for '{}'", credentials.ssid);
        }
        issued
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.platform_address()
    }

    fn signal_quality(&self) -> Option<i8> {
        self.platform_rssi()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
