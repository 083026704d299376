//! Inbound command envelopes.
//!
//! The wire form is a JSON object with a string `action` plus
//! action-specific fields:
//!
//! | action            | field   | type    |
//! |-------------------|---------|---------|
//! | `REBOOT`          | -       |         |
//! | `STATUS_REQUEST`  | -       |         |
//! | `FIRMWARE_UPDATE` | `url`   | string  |
//! | `SERVO_ANGLE`     | `angle` | integer |
//!
//! Decoding only checks the envelope. A recognised action whose field is
//! absent or of the wrong type still decodes (with `None`) so the
//! dispatcher can reject it with a status report instead of dropping it.

use serde_json::{Map, Value};

use crate::error::{CommandError, DecodeError};

pub const ACTION_REBOOT: &str = "REBOOT";
pub const ACTION_STATUS_REQUEST: &str = "STATUS_REQUEST";
pub const ACTION_FIRMWARE_UPDATE: &str = "FIRMWARE_UPDATE";
pub const ACTION_SERVO_ANGLE: &str = "SERVO_ANGLE";

/// A decoded command, one variant per known action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Reboot,
    StatusRequest,
    FirmwareUpdate { url: Option<String> },
    SetActuatorPosition { angle: Option<i64> },
    /// Any other action string, kept for logging.
    Unknown(String),
}

impl Command {
    /// Parse raw message bytes into a command.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(payload).map_err(|_| DecodeError::InvalidJson)?;
        let Value::Object(fields) = value else {
            return Err(DecodeError::NotAnObject);
        };
        let action = fields
            .get("action")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingAction)?;

        Ok(match action {
            ACTION_REBOOT => Self::Reboot,
            ACTION_STATUS_REQUEST => Self::StatusRequest,
            ACTION_FIRMWARE_UPDATE => Self::FirmwareUpdate {
                url: string_field(&fields, "url"),
            },
            ACTION_SERVO_ANGLE => Self::SetActuatorPosition {
                angle: integer_field(&fields, "angle"),
            },
            other => Self::Unknown(other.to_owned()),
        })
    }

    /// Wire name of the action.
    pub fn action(&self) -> &str {
        match self {
            Self::Reboot => ACTION_REBOOT,
            Self::StatusRequest => ACTION_STATUS_REQUEST,
            Self::FirmwareUpdate { .. } => ACTION_FIRMWARE_UPDATE,
            Self::SetActuatorPosition { .. } => ACTION_SERVO_ANGLE,
            Self::Unknown(action) => action,
        }
    }

    /// Check that the action's required field is present.
    pub fn validate(&self) -> Result<(), CommandError> {
        match self {
            Self::FirmwareUpdate { url: None } => Err(CommandError::MissingField {
                action: ACTION_FIRMWARE_UPDATE,
                field: "url",
            }),
            Self::SetActuatorPosition { angle: None } => Err(CommandError::MissingField {
                action: ACTION_SERVO_ANGLE,
                field: "angle",
            }),
            _ => Ok(()),
        }
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Integers beyond `i64` saturate; they are clamped later anyway.
fn integer_field(fields: &Map<String, Value>, key: &str) -> Option<i64> {
    let v = fields.get(key)?;
    v.as_i64().or_else(|| v.as_u64().map(|_| i64::MAX))
}

/// Clamp a requested angle to the actuator's 0-180° travel.
pub fn clamp_angle(angle: i64) -> u8 {
    angle.clamp(0, 180) as u8
}
