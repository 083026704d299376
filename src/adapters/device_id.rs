//! Device identity derived from the ESP32 WiFi station MAC address.
//!
//! The station MAC is factory-burned, so the resulting id is stable
//! across reboots and reflashes. It names the MQTT topics and the client id.

use log::error;

use crate::app::identity::DeviceIdentity;
use crate::error::IdentityError;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the WiFi station MAC. `None` if the driver refuses.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> Option<MacAddress> {
    use esp_idf_svc::sys::{ESP_OK, esp_mac_type_t_ESP_MAC_WIFI_STA, esp_read_mac};

    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: `mac` is 6 bytes, the size esp_read_mac writes for a STA MAC.
    let ret = unsafe { esp_read_mac(mac.as_mut_ptr(), esp_mac_type_t_ESP_MAC_WIFI_STA) };
    (ret == ESP_OK).then_some(mac)
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> Option<MacAddress> {
    Some([0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE])
}

/// Resolve this device's identity. Failure is fatal to the caller.
pub fn resolve_identity() -> Result<DeviceIdentity, IdentityError> {
    let mac = read_mac().ok_or(IdentityError::Unavailable)?;
    DeviceIdentity::from_mac(&mac).inspect_err(|e| {
        error!("Device identity: {e} (MAC {mac:02X?})");
    })
}
