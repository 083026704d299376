//! Unified error types for the FieldLink agent.
//!
//! One small enum per concern, each convertible into the top-level
//! [`Error`] so the tick loop can treat every failure uniformly: log it,
//! report it where a status exists, and re-evaluate on the next tick.
//! Only [`IdentityError`] is fatal, and only at boot.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level agent error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Identity(IdentityError),
    Link(LinkError),
    Session(SessionError),
    Decode(DecodeError),
    Command(CommandError),
    Publish(PublishError),
    Update(UpdateError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity(e) => write!(f, "identity: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Session(e) => write!(f, "session: {e}"),
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Publish(e) => write!(f, "publish: {e}"),
            Self::Update(e) => write!(f, "update: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Identity (fatal at startup)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityError {
    /// Hardware returned no identity, or an all-zero one.
    Unavailable,
    /// Identity is not 12 hex digits once separators are stripped.
    Malformed,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "hardware identity unavailable"),
            Self::Malformed => write!(f, "hardware identity is not a MAC address"),
        }
    }
}

impl std::error::Error for IdentityError {}

impl From<IdentityError> for Error {
    fn from(e: IdentityError) -> Self {
        Self::Identity(e)
    }
}

// ---------------------------------------------------------------------------
// Connectivity (retryable)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Polling budget exhausted without association.
    Unavailable { attempts: u8 },
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { attempts } => {
                write!(f, "network link unavailable after {attempts} polls")
            }
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// The link beneath the session is down.
    LinkDown,
    /// The broker refused or did not answer the connect.
    ConnectFailed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkDown => write!(f, "link is down"),
            Self::ConnectFailed => write!(f, "broker connect failed"),
        }
    }
}

impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

// ---------------------------------------------------------------------------
// Inbound commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not valid JSON (or not UTF-8).
    InvalidJson,
    /// Payload parsed, but is not a JSON object.
    NotAnObject,
    /// `action` is absent or not a string.
    MissingAction,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson => write!(f, "payload is not valid JSON"),
            Self::NotAnObject => write!(f, "payload is not a JSON object"),
            Self::MissingAction => write!(f, "missing string field 'action'"),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// A recognized action arrived without its required field.
    MissingField {
        action: &'static str,
        field: &'static str,
    },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { action, field } => {
                write!(f, "{action} requires field '{field}'")
            }
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Outbound telemetry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// Report could not be serialised.
    Encode,
    /// Bus rejected the publish (usually: session down).
    Transport,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode => write!(f, "report encoding failed"),
            Self::Transport => write!(f, "transport unavailable"),
        }
    }
}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        Self::Publish(e)
    }
}

// ---------------------------------------------------------------------------
// Firmware update
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// Download failed: HTTP error, connection drop, flash write error.
    Transport(String),
    /// Image downloaded but rejected on finalize / boot-partition switch.
    Verification(String),
    /// An update is already running.
    Busy,
    /// The transfer aborted without reporting an outcome.
    Aborted,
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transfer failed: {msg}"),
            Self::Verification(msg) => write!(f, "image rejected: {msg}"),
            Self::Busy => write!(f, "update already in progress"),
            Self::Aborted => write!(f, "transfer aborted"),
        }
    }
}

impl From<UpdateError> for Error {
    fn from(e: UpdateError) -> Self {
        Self::Update(e)
    }
}

/// Agent-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
