#![no_main]

use libfuzzer_sys::fuzz_target;
use milli_tls::tls::messages::{read_handshake_header, HandshakeMessage, HANDSHAKE_HEADER_LEN};

fuzz_target!(|data: &[u8]| {
    // Every message parser should reject bad input without panicking, and
    // anything that parses must re-encode to a parseable message.
    let Some((msg_type, body_len)) = read_handshake_header(data) else {
        return;
    };
    let Some(body) = data.get(HANDSHAKE_HEADER_LEN..HANDSHAKE_HEADER_LEN + body_len) else {
        return;
    };
    if let Ok(msg) = HandshakeMessage::parse(msg_type, body) {
        let encoded = msg.encode();
        let (ty, len) = read_handshake_header(&encoded).expect("encoded header");
        assert!(HandshakeMessage::parse(ty, &encoded[HANDSHAKE_HEADER_LEN..HANDSHAKE_HEADER_LEN + len]).is_ok());
    }
});
