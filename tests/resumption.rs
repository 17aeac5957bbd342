//! Session resumption across channels sharing session caches.

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use common::*;
use milli_tls::transport::MICROS_PER_SEC;
use milli_tls::{
    Certificate, Channel, ChannelConfig, CipherSuite, Clock, DefaultPolicy, Error, HandshakeFailureReason,
    InMemoryCredentials, Instant, NoSessionCache, Session, SessionCache, SessionId, Usage,
};

/// Clock the test moves by hand.
#[derive(Default)]
struct ManualClock(AtomicU64);

impl ManualClock {
    fn advance(&self, micros: u64) {
        self.0.fetch_add(micros, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.0.load(Ordering::SeqCst)
    }
}

/// Offers the last session it stored, whatever server name is asked for.
#[derive(Default)]
struct OfferLast(Mutex<Option<Arc<Session>>>);

impl SessionCache for OfferLast {
    fn store(&self, session: Arc<Session>) {
        *self.0.lock().unwrap() = Some(session);
    }

    fn lookup(&self, id: &SessionId, _now: Instant) -> Option<Arc<Session>> {
        self.0.lock().unwrap().clone().filter(|s| s.id() == id)
    }

    fn lookup_by_server(&self, _server_name: &str, _now: Instant) -> Option<Arc<Session>> {
        self.0.lock().unwrap().clone()
    }
}

fn client_identity() -> (Certificate, Arc<InMemoryCredentials>) {
    let (cert, key) = identity(0x02, "client.test");
    let creds = InMemoryCredentials::new().with_identity(Usage::TlsClient, vec![cert.clone()], key).unwrap();
    (cert, Arc::new(creds))
}

fn channels(client: ChannelConfig, server: ChannelConfig, seed: u64) -> (Channel<Recorder>, Channel<Recorder>) {
    (
        Channel::client(client, Recorder::default(), &mut SeededRng::new(seed)).unwrap(),
        Channel::server(server, Recorder::default(), &mut SeededRng::new(seed + 1000)).unwrap(),
    )
}

fn exported(channel: &Channel<Recorder>) -> [u8; 32] {
    let mut out = [0u8; 32];
    channel.export_keying_material(b"EXPORTER-resumption", None, &mut out).unwrap();
    out
}

#[test]
fn second_connection_resumes() {
    let client_cache = cache();
    let server_cache = cache();
    let client_cfg = || client_config(DefaultPolicy::new(), client_cache.clone());
    let server_cfg = || server_config(DefaultPolicy::new(), server_cache.clone());

    let (mut c1, mut s1) = channels(client_cfg(), server_cfg(), 1);
    connect(&mut c1, &mut s1).unwrap();
    assert!(!c1.was_resumed());
    assert_eq!(c1.handshake_message_count(), 8);
    assert_eq!(client_cache.len(), 1);
    assert_eq!(server_cache.len(), 1);

    let (mut c2, mut s2) = channels(client_cfg(), server_cfg(), 2);
    connect(&mut c2, &mut s2).unwrap();
    assert!(c2.was_resumed() && s2.was_resumed());
    assert_eq!(c2.handshake_message_count(), 4);
    assert_eq!(s2.handshake_message_count(), 4);

    let first = c1.session().unwrap();
    let second = c2.session().unwrap();
    assert_eq!(first.id(), second.id());
    assert_eq!(first.peer_certificate_chain(), second.peer_certificate_chain());
    assert_eq!(first.cipher_suite(), second.cipher_suite());

    // Fresh randoms give fresh traffic keys on the same master secret.
    assert_eq!(exported(&c2), exported(&s2));
    assert_ne!(exported(&c1), exported(&c2));

    // A resumed session is not stored again.
    assert_eq!(client_cache.len(), 1);
    assert_eq!(server_cache.len(), 1);

    c2.send(b"resumed data").unwrap();
    transfer(&mut c2, &mut s2).unwrap();
    assert_eq!(s2.handler().data, b"resumed data");
}

#[test]
fn server_without_cache_falls_back_to_full_handshake() {
    let client_cache = cache();
    let client_cfg = || client_config(DefaultPolicy::new(), client_cache.clone());
    let server_cfg = || server_config(DefaultPolicy::new(), Arc::new(NoSessionCache));

    let (mut c1, mut s1) = channels(client_cfg(), server_cfg(), 3);
    connect(&mut c1, &mut s1).unwrap();
    let (mut c2, mut s2) = channels(client_cfg(), server_cfg(), 4);
    connect(&mut c2, &mut s2).unwrap();

    assert!(!c2.was_resumed());
    assert_eq!(c2.handshake_message_count(), 8);
    assert_ne!(c1.session().unwrap().id(), c2.session().unwrap().id());
}

#[test]
fn expired_session_is_not_offered() {
    let clock = Arc::new(ManualClock::default());
    let client_cache = cache();
    let server_cache = cache();
    let lifetime = 60 * MICROS_PER_SEC;
    let client_cfg = || {
        client_config(DefaultPolicy::new(), client_cache.clone())
            .with_clock(clock.clone())
            .with_session_lifetime(lifetime)
    };
    let server_cfg = || {
        server_config(DefaultPolicy::new(), server_cache.clone())
            .with_clock(clock.clone())
            .with_session_lifetime(lifetime)
    };

    let (mut c1, mut s1) = channels(client_cfg(), server_cfg(), 5);
    connect(&mut c1, &mut s1).unwrap();

    clock.advance(lifetime + 1);
    assert!(client_cache.lookup(c1.session().unwrap().id(), clock.now()).is_none());

    let (mut c2, mut s2) = channels(client_cfg(), server_cfg(), 6);
    connect(&mut c2, &mut s2).unwrap();
    assert!(!c2.was_resumed());
    assert_eq!(c2.handshake_message_count(), 8);
}

#[test]
fn client_dropping_cached_suite_skips_resumption() {
    let client_cache = cache();
    let server_cache = cache();
    let aes = [CipherSuite::EcdheEcdsaWithAes128GcmSha256];
    let chacha = [CipherSuite::EcdheEcdsaWithChacha20Poly1305Sha256];

    let (mut c1, mut s1) = channels(
        client_config(DefaultPolicy::new().with_cipher_suites(&aes), client_cache.clone()),
        server_config(DefaultPolicy::new(), server_cache.clone()),
        7,
    );
    connect(&mut c1, &mut s1).unwrap();

    let (mut c2, mut s2) = channels(
        client_config(DefaultPolicy::new().with_cipher_suites(&chacha), client_cache.clone()),
        server_config(DefaultPolicy::new(), server_cache.clone()),
        8,
    );
    connect(&mut c2, &mut s2).unwrap();
    assert!(!c2.was_resumed());
    assert_eq!(c2.negotiated_cipher_suite(), Some(chacha[0]));
}

#[test]
fn injected_clock_drives_expiry() {
    // Far from the system clock; sessions stamped with it must still resume.
    let clock = Arc::new(ManualClock::default());
    let client_cache = cache();
    let server_cache = cache();
    let client_cfg = || client_config(DefaultPolicy::new(), client_cache.clone()).with_clock(clock.clone());
    let server_cfg = || server_config(DefaultPolicy::new(), server_cache.clone()).with_clock(clock.clone());

    let (mut c1, mut s1) = channels(client_cfg(), server_cfg(), 9);
    connect(&mut c1, &mut s1).unwrap();
    assert_eq!(c1.session().unwrap().created_at(), 0);

    let (mut c2, mut s2) = channels(client_cfg(), server_cfg(), 10);
    connect(&mut c2, &mut s2).unwrap();
    assert!(c2.was_resumed() && s2.was_resumed());
}

#[test]
fn client_auth_required_after_caching_forces_full_handshake() {
    let client_cache = cache();
    let server_cache = cache();
    let (client_cert, client_creds) = client_identity();
    let client_cfg = || client_config(DefaultPolicy::new(), client_cache.clone()).with_credentials(client_creds.clone());

    let (mut c1, mut s1) = channels(client_cfg(), server_config(DefaultPolicy::new(), server_cache.clone()), 11);
    connect(&mut c1, &mut s1).unwrap();
    assert!(s1.session().unwrap().peer_certificate_chain().is_empty());

    let strict = server_config(DefaultPolicy::new().with_client_auth(true), server_cache.clone());
    let (mut c2, mut s2) = channels(client_cfg(), strict, 12);
    connect(&mut c2, &mut s2).unwrap();
    assert!(!c2.was_resumed() && !s2.was_resumed());
    assert_eq!(s2.handshake_message_count(), 11);
    assert_eq!(s2.session().unwrap().peer_certificate_chain(), &[client_cert]);
}

#[test]
fn cached_client_chain_is_rechecked() {
    let client_cache = cache();
    let server_cache = cache();
    let (_, client_creds) = client_identity();
    let client_cfg = || client_config(DefaultPolicy::new(), client_cache.clone()).with_credentials(client_creds.clone());

    let lenient = server_config(DefaultPolicy::new().with_client_auth(true), server_cache.clone());
    let (mut c1, mut s1) = channels(client_cfg(), lenient, 13);
    connect(&mut c1, &mut s1).unwrap();
    assert_eq!(s1.session().unwrap().peer_certificate_chain().len(), 1);

    let (other, _) = identity(0x09, "other.test");
    let pinned = server_config(DefaultPolicy::new().with_client_auth(true).pinned(vec![other]), server_cache.clone());
    let (mut c2, mut s2) = channels(client_cfg(), pinned, 14);
    assert_eq!(
        connect(&mut c2, &mut s2),
        Err(Error::HandshakeFailure(HandshakeFailureReason::CertificateRejected))
    );
    assert!(!s2.was_resumed());
    assert!(s2.is_closed());
}

#[test]
fn session_for_another_server_name_is_not_resumed() {
    let client_cache = Arc::new(OfferLast::default());
    let server_cache = cache();

    let (mut c1, mut s1) = channels(
        client_config(DefaultPolicy::new(), client_cache.clone()),
        server_config(DefaultPolicy::new(), server_cache.clone()),
        15,
    );
    connect(&mut c1, &mut s1).unwrap();
    assert_eq!(s1.session().unwrap().server_name(), Some(SERVER_NAME));

    let alias = client_config(DefaultPolicy::new(), client_cache.clone()).with_server_name(Some("alias.test"));
    let (mut c2, mut s2) = channels(alias, server_config(DefaultPolicy::new(), server_cache.clone()), 16);
    connect(&mut c2, &mut s2).unwrap();
    assert!(!c2.was_resumed() && !s2.was_resumed());
    assert_eq!(c2.handshake_message_count(), 8);
    assert_ne!(c1.session().unwrap().id(), c2.session().unwrap().id());
}
