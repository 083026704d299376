//! Network link manager.
//!
//! ```text
//!  Disconnected ──ensure_connected()──▶ Connecting ──is_connected()──▶ Connected
//!       ▲                                   │                            │
//!       └──────── polls exhausted ──────────┘◀──── link lost (refresh) ──┘
//! ```
//!
//! There is no backoff here. The tick loop calls [`LinkManager::ensure_connected`]
//! every tick, so a failed attempt is retried at tick cadence. The bounded
//! poll (20 × 500 ms by default) is the one place the loop is allowed to
//! block while reconnecting.

use log::{info, warn};

use crate::config::LinkConfig;
use crate::error::LinkError;

use super::ports::{ClockPort, LinkCredentials, LinkPort};

/// Connectivity of one layer (link or session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectivityState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

pub struct LinkManager {
    config: LinkConfig,
    state: ConnectivityState,
}

impl LinkManager {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            state: ConnectivityState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Re-read the adapter's view; demotes to Disconnected on a silent drop.
    pub fn refresh(&mut self, link: &impl LinkPort) -> ConnectivityState {
        if self.state == ConnectivityState::Connected && !link.is_connected() {
            warn!("Link lost");
            self.state = ConnectivityState::Disconnected;
        }
        self.state
    }

    /// No-op when connected; otherwise one bounded connect attempt.
    pub fn ensure_connected(
        &mut self,
        link: &mut impl LinkPort,
        clock: &mut impl ClockPort,
    ) -> Result<(), LinkError> {
        if self.refresh(link).is_connected() {
            return Ok(());
        }
        if link.is_connected() {
            self.mark_connected(link);
            return Ok(());
        }

        self.state = ConnectivityState::Connecting;
        info!("Connecting to WiFi SSID '{}'", self.config.ssid);
        let credentials = LinkCredentials {
            ssid: &self.config.ssid,
            password: &self.config.password,
        };
        if !link.begin(&credentials) {
            warn!("WiFi connect request rejected by driver");
        }

        for _ in 0..self.config.connect_attempts {
            if link.is_connected() {
                self.mark_connected(link);
                return Ok(());
            }
            clock.delay_ms(self.config.poll_interval_ms);
        }
        if link.is_connected() {
            self.mark_connected(link);
            return Ok(());
        }

        self.state = ConnectivityState::Disconnected;
        let err = LinkError::Unavailable {
            attempts: self.config.connect_attempts,
        };
        warn!("WiFi: {err}");
        Err(err)
    }

    fn mark_connected(&mut self, link: &impl LinkPort) {
        self.state = ConnectivityState::Connected;
        match link.local_address() {
            Some(ip) => info!(
                "WiFi connected, IP {} RSSI {} dBm",
                ip,
                link.signal_quality().unwrap_or(0)
            ),
            None => info!("WiFi connected"),
        }
    }
}
