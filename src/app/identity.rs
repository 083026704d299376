//! Device identity and the topic names derived from it.
//!
//! The identity is the station MAC rendered as 12 uppercase hex digits
//! with every separator removed (`AA:BB:CC:DD:EE:FF` → `AABBCCDDEEFF`).
//! It is resolved once at boot and never changes afterwards.

use core::fmt::Write;

use crate::error::IdentityError;

/// `AABBCCDDEEFF`, exactly 12 chars.
pub type DeviceIdString = heapless::String<12>;

/// Normalised, immutable device identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    id: DeviceIdString,
}

impl DeviceIdentity {
    /// Normalise a MAC-like string: strip `:`, `-`, `.` and spaces,
    /// require exactly 12 hex digits, uppercase them. All-zero and empty inputs mean the
    /// hardware had nothing to give.
    pub fn resolve(raw: &str) -> Result<Self, IdentityError> {
        let mut id = DeviceIdString::new();
        for c in raw.chars().filter(|c| !matches!(c, ':' | '-' | '.' | ' ')) {
            if !c.is_ascii_hexdigit() {
                return Err(IdentityError::Malformed);
            }
            id.push(c.to_ascii_uppercase())
                .map_err(|()| IdentityError::Malformed)?;
        }
        if id.is_empty() || id.bytes().all(|b| b == b'0') {
            return Err(IdentityError::Unavailable);
        }
        if id.len() != 12 {
            return Err(IdentityError::Malformed);
        }
        Ok(Self { id })
    }

    /// Build directly from the 6 raw MAC bytes.
    pub fn from_mac(mac: &[u8; 6]) -> Result<Self, IdentityError> {
        if mac.iter().all(|&b| b == 0) {
            return Err(IdentityError::Unavailable);
        }
        let mut id = DeviceIdString::new();
        for b in mac {
            write!(id, "{b:02X}").map_err(|_| IdentityError::Malformed)?;
        }
        Ok(Self { id })
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl core::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.id)
    }
}

/// The three wire topics owned by one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// `devices/{id}/data`
    pub telemetry: String,
    /// `devices/{id}/commands`
    pub commands: String,
    /// `devices/{id}/commands/last`, broker-retained copy of the last command.
    pub commands_last: String,
}

impl Topics {
    pub fn for_device(identity: &DeviceIdentity) -> Self {
        let commands = format!("devices/{}/commands", identity.as_str());
        Self {
            telemetry: format!("devices/{}/data", identity.as_str()),
            commands_last: format!("{commands}/last"),
            commands,
        }
    }

    pub fn is_command_topic(&self, topic: &str) -> bool {
        topic == self.commands || topic == self.commands_last
    }

    pub fn is_retained_fallback(&self, topic: &str) -> bool {
        topic == self.commands_last
    }
}
