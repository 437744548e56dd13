//! Fuzz target for IRC message parsing.
//!
//! Anything that parses must also format without panicking, and the
//! formatted body must stay within the requested limit.

#![no_main]

use libfuzzer_sys::fuzz_target;
use slirc_client::Message;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if input.len() > 8192 {
        return;
    }

    if let Ok(message) = input.parse::<Message>() {
        let wire = message.to_wire(false, 512);
        assert!(wire.len() <= 512);
        assert!(wire.ends_with("\r\n"));
        assert!(!wire[..wire.len() - 2].contains(['\r', '\n']));

        let _ = message.to_wire(true, 512);
        let _ = message.to_string();
    }
});
