#![no_main]

use std::ops::ControlFlow;
use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use milli_tls::{
    Certificate, Channel, ChannelConfig, ChannelHandler, DefaultPolicy, InMemoryCredentials, NoSessionCache,
    PrivateKey, Rng, Session, Usage,
};

struct FixedRng(u8);

impl Rng for FixedRng {
    fn fill(&mut self, buf: &mut [u8]) {
        for b in buf {
            *b = self.0;
            self.0 = self.0.wrapping_add(1);
        }
    }
}

struct Discard;

impl ChannelHandler for Discard {
    fn on_output_ready(&mut self, _bytes: &[u8]) {}

    fn on_data_received(&mut self, _data: &[u8]) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn on_handshake_complete(&mut self, _session: &Session) -> bool {
        true
    }
}

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary bytes to a server in fuzzer-chosen pieces.
    let key = PrivateKey::ed25519_from_seed([7; 32]);
    let cert = Certificate::self_signed(&key, "fuzz.test").expect("certificate");
    let creds = InMemoryCredentials::new().with_identity(Usage::TlsServer, vec![cert], key).expect("identity");
    let config = ChannelConfig::new(Arc::new(DefaultPolicy::new()), Arc::new(creds), Arc::new(NoSessionCache));
    let Ok(mut server) = Channel::server(config, Discard, &mut FixedRng(1)) else {
        return;
    };

    let mut rest = data;
    while let Some((&n, tail)) = rest.split_first() {
        let take = (n as usize + 1).min(tail.len());
        let (piece, tail) = tail.split_at(take);
        if server.received(piece).is_err() {
            assert!(server.is_closed());
            return;
        }
        server.write_complete();
        rest = tail;
    }
});
