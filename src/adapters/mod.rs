//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements        | Connects to                      |
//! |-------------|-------------------|----------------------------------|
//! | `device_id` | (identity source) | WiFi station MAC                 |
//! | `http_ota`  | FirmwareUpdater   | HTTP client + OTA partitions     |
//! | `mqtt`      | MessageBus        | ESP-IDF MQTT client              |
//! | `nvs`       | ConfigPort        | NVS / in-memory store            |
//! | `system`    | SystemPort        | esp_restart, heap statistics     |
//! | `time`      | ClockPort         | ESP32 system timer, SNTP         |
//! | `wifi`      | LinkPort          | ESP-IDF WiFi STA                 |
//!
//! The servo [`ActuatorPort`](crate::app::ports::ActuatorPort) lives in
//! [`drivers::servo`](crate::drivers::servo).

pub mod device_id;
pub mod http_ota;
pub mod mqtt;
pub mod nvs;
pub mod system;
pub mod time;
pub mod wifi;
