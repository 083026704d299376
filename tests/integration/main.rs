//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters. All tests run on the host (x86_64) with no
//! real hardware required.

mod mock_ports;
mod session_tests;
#[cfg(not(target_os = "espidf"))]
mod sim_adapter_tests;
mod update_tests;
