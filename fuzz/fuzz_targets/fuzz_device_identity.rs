//! Fuzz target: `DeviceIdentity::resolve`
//!
//! Any accepted input must normalise to 12 uppercase hex digits, and
//! resolving the normalised form again must be a no-op.
//!
//! cargo fuzz run fuzz_device_identity

#![no_main]

use fieldlink::app::identity::DeviceIdentity;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = core::str::from_utf8(data) else {
        return;
    };
    if let Ok(id) = DeviceIdentity::resolve(raw) {
        let s = id.as_str();
        assert_eq!(s.len(), 12);
        assert!(s.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)));
        assert_eq!(DeviceIdentity::resolve(s).as_ref(), Ok(&id));
    }
});
