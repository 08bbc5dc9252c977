#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(docs) = ticketbai::gateways::lroe::parse_query_response(s) {
            for doc in docs {
                let _ = doc.chain_data();
            }
        }
    }
});
