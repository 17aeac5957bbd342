#![no_main]

use libfuzzer_sys::fuzz_target;
use milli_tls::channel::record::{decode_record_header, ConnectionState, RECORD_HEADER_LEN};
use milli_tls::tls::cipher_suite::CipherSuite;
use milli_tls::tls::key_schedule::DirectionalKeys;

fuzz_target!(|data: &[u8]| {
    // Header validation and record opening must never panic.
    let Ok(Some(header)) = decode_record_header(data) else {
        return;
    };
    let end = (RECORD_HEADER_LEN + header.length as usize).min(data.len());
    let fragment = &data[RECORD_HEADER_LEN..end];

    for suite in CipherSuite::ALL {
        let keys = DirectionalKeys { key: vec![0x11; suite.key_len()], iv: vec![0x22; suite.fixed_iv_len()] };
        if let Ok(mut state) = ConnectionState::new(suite, &keys) {
            let _ = state.open(&header, fragment);
        }
    }
});
