//! Application core: pure domain logic, zero I/O.
//!
//! Identity, link and session management, command dispatch, telemetry,
//! and the firmware update supervisor. All interaction with the radio,
//! the broker, and the hardware happens through **port traits** defined
//! in [`ports`], so this layer runs unchanged against mocks on the host.

pub mod commands;
pub mod context;
pub mod dispatcher;
pub mod identity;
pub mod link;
pub mod ports;
pub mod service;
pub mod session;
pub mod telemetry;
pub mod update;
