#![no_main]

use libfuzzer_sys::fuzz_target;
use ticketbai::doc::Locale;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Errors are fine, panics are bugs.
        let _ = ticketbai::gateways::parse_rest_response(200, s, Locale::Es);
        let _ = ticketbai::gateways::parse_rest_response(200, s, Locale::Eu);
    }
});
