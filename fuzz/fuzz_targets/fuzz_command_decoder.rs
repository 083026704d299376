//! Fuzz target: `Command::decode`
//!
//! Feeds arbitrary bytes to the inbound command decoder and checks that
//! any angle it accepts clamps into the servo's travel.
//!
//! cargo fuzz run fuzz_command_decoder

#![no_main]

use fieldlink::app::commands::{Command, clamp_angle};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(command) = Command::decode(data) else {
        return;
    };
    if command.validate().is_ok() {
        if let Command::SetActuatorPosition { angle: Some(angle) } = command {
            assert!(clamp_angle(angle) <= 180);
        }
    }
});
