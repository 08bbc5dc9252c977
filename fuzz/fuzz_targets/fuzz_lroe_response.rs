#![no_main]

use libfuzzer_sys::fuzz_target;
use ticketbai::gateways::{N3Response, check_response};

fuzz_target!(|data: &[u8]| {
    let n3 = N3Response {
        kind: Some("Incorrecto".into()),
        code: Some("B4_2000002".into()),
        message: Some(ticketbai::gateways::decode_header_text(data)),
        registration_number: None,
    };
    let _ = check_response(200, &n3, data);
});
