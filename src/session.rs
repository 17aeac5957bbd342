//! Resumable sessions and the shared session cache.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::credentials::Certificate;
use crate::tls::cipher_suite::CipherSuite;
use crate::tls::key_schedule::MasterSecret;
use crate::transport::Instant;

/// Maximum TLS session identifier length.
pub const MAX_SESSION_ID_LEN: usize = 32;

/// A TLS session identifier, 0 to 32 bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct SessionId(heapless::Vec<u8, MAX_SESSION_ID_LEN>);

impl SessionId {
    /// The empty identifier: no resumption offered or possible.
    pub fn empty() -> Self {
        Self::default()
    }

    /// `None` if `bytes` is longer than 32.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        heapless::Vec::from_slice(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SessionId(")?;
        for b in self.0.iter().take(8) {
            write!(f, "{b:02x}")?;
        }
        if self.0.len() > 8 {
            f.write_str("..")?;
        }
        f.write_str(")")
    }
}

/// An established session.
///
/// Immutable once built; channels and caches share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    master_secret: MasterSecret,
    cipher_suite: CipherSuite,
    peer_certificate_chain: Vec<Certificate>,
    server_name: Option<String>,
    created_at: Instant,
    expires_at: Instant,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        master_secret: MasterSecret,
        cipher_suite: CipherSuite,
        peer_certificate_chain: Vec<Certificate>,
        server_name: Option<String>,
        created_at: Instant,
        lifetime: u64,
    ) -> Self {
        Self {
            id,
            master_secret,
            cipher_suite,
            peer_certificate_chain,
            server_name,
            created_at,
            expires_at: created_at.saturating_add(lifetime),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn master_secret(&self) -> &MasterSecret {
        &self.master_secret
    }

    pub fn cipher_suite(&self) -> CipherSuite {
        self.cipher_suite
    }

    /// The peer's chain, end-entity first. Empty for an unauthenticated client.
    pub fn peer_certificate_chain(&self) -> &[Certificate] {
        &self.peer_certificate_chain
    }

    /// The server name the client asked for, if any.
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Whether this session can be offered or accepted for resumption.
    pub fn is_resumable(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Store of resumable sessions shared by many channels.
///
/// `store` and `lookup` may be called concurrently from any thread. A
/// lookup never returns a session expired at `now`, which callers read
/// from the same clock that stamped the session.
pub trait SessionCache: Send + Sync {
    fn store(&self, session: Arc<Session>);

    fn lookup(&self, id: &SessionId, now: Instant) -> Option<Arc<Session>>;

    /// Most recent live session for `server_name`; used by clients to pick
    /// an identifier to offer.
    fn lookup_by_server(&self, _server_name: &str, _now: Instant) -> Option<Arc<Session>> {
        None
    }
}

/// A cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSessionCache;

impl SessionCache for NoSessionCache {
    fn store(&self, _session: Arc<Session>) {}

    fn lookup(&self, _id: &SessionId, _now: Instant) -> Option<Arc<Session>> {
        None
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<SessionId, Arc<Session>>,
    /// Least recently used at the front.
    order: VecDeque<SessionId>,
    /// Ids per host, oldest first.
    by_server: HashMap<String, Vec<SessionId>>,
}

impl CacheState {
    fn touch(&mut self, id: &SessionId) {
        if let Some(pos) = self.order.iter().position(|x| x == id) {
            self.order.remove(pos);
        }
        self.order.push_back(id.clone());
    }

    fn remove(&mut self, id: &SessionId) {
        if let Some(session) = self.entries.remove(id) {
            if let Some(pos) = self.order.iter().position(|x| x == id) {
                self.order.remove(pos);
            }
            if let Some(name) = session.server_name() {
                if let Some(ids) = self.by_server.get_mut(name) {
                    ids.retain(|x| x != id);
                    if ids.is_empty() {
                        self.by_server.remove(name);
                    }
                }
            }
        }
    }
}

/// `Mutex`-guarded in-memory cache with LRU eviction and lazy expiry.
pub struct InMemorySessionCache {
    state: Mutex<CacheState>,
    capacity: usize,
}

impl InMemorySessionCache {
    /// A cache holding at most `capacity` sessions. Zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self { state: Mutex::new(CacheState::default()), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries, expired ones included until they are looked up.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // A panic while holding the lock leaves the maps consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn get_live(state: &mut CacheState, id: &SessionId, now: Instant) -> Option<Arc<Session>> {
        let session = state.entries.get(id)?.clone();
        if session.is_expired(now) {
            log::trace!("session cache: {:?} expired", id);
            state.remove(id);
            return None;
        }
        state.touch(id);
        Some(session)
    }
}

impl SessionCache for InMemorySessionCache {
    fn store(&self, session: Arc<Session>) {
        if self.capacity == 0 || !session.is_resumable() {
            return;
        }
        let mut state = self.lock();
        let id = session.id().clone();
        state.remove(&id);
        while state.entries.len() >= self.capacity {
            let Some(oldest) = state.order.front().cloned() else {
                break;
            };
            log::trace!("session cache: evicting {:?}", oldest);
            state.remove(&oldest);
        }
        if let Some(name) = session.server_name() {
            state.by_server.entry(name.to_owned()).or_default().push(id.clone());
        }
        state.order.push_back(id.clone());
        state.entries.insert(id, session);
    }

    fn lookup(&self, id: &SessionId, now: Instant) -> Option<Arc<Session>> {
        if id.is_empty() {
            return None;
        }
        let mut state = self.lock();
        Self::get_live(&mut state, id, now)
    }

    fn lookup_by_server(&self, server_name: &str, now: Instant) -> Option<Arc<Session>> {
        let mut state = self.lock();
        let ids = state.by_server.get(server_name)?.clone();
        ids.iter().rev().find_map(|id| Self::get_live(&mut state, id, now))
    }
}

impl core::fmt::Debug for InMemorySessionCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemorySessionCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: u8, server_name: Option<&str>, created_at: Instant, lifetime: u64) -> Arc<Session> {
        Arc::new(Session::new(
            SessionId::from_slice(&[id; 32]).unwrap(),
            MasterSecret::from_bytes([id; 48]),
            CipherSuite::EcdheEcdsaWithAes128GcmSha256,
            Vec::new(),
            server_name.map(str::to_owned),
            created_at,
            lifetime,
        ))
    }

    fn id(b: u8) -> SessionId {
        SessionId::from_slice(&[b; 32]).unwrap()
    }

    #[test]
    fn session_id_bounds() {
        assert!(SessionId::from_slice(&[0; 32]).is_some());
        assert!(SessionId::from_slice(&[0; 33]).is_none());
        assert!(SessionId::empty().is_empty());
        assert_eq!(format!("{:?}", SessionId::from_slice(&[0xab, 0xcd]).unwrap()), "SessionId(abcd)");
    }

    #[test]
    fn store_and_lookup() {
        let cache = InMemorySessionCache::new(4);
        cache.store(session(1, None, 0, u64::MAX));
        let found = cache.lookup(&id(1), 0).unwrap();
        assert_eq!(found.id(), &id(1));
        assert!(cache.lookup(&id(2), 0).is_none());
        assert!(cache.lookup(&SessionId::empty(), 0).is_none());
    }

    #[test]
    fn expired_entries_miss_and_are_removed() {
        let cache = InMemorySessionCache::new(4);
        cache.store(session(1, Some("a.test"), 100, 50));

        assert!(cache.lookup(&id(1), 149).is_some());
        assert!(cache.lookup(&id(1), 150).is_none());
        assert!(cache.is_empty());
        assert!(cache.lookup_by_server("a.test", 150).is_none());
    }

    #[test]
    fn lru_eviction() {
        let cache = InMemorySessionCache::new(2);
        cache.store(session(1, None, 0, u64::MAX));
        cache.store(session(2, None, 0, u64::MAX));
        // Touch 1 so 2 becomes least recently used.
        assert!(cache.lookup(&id(1), 0).is_some());
        cache.store(session(3, None, 0, u64::MAX));

        assert_eq!(cache.len(), 2);
        assert!(cache.lookup(&id(1), 0).is_some());
        assert!(cache.lookup(&id(2), 0).is_none());
        assert!(cache.lookup(&id(3), 0).is_some());
    }

    #[test]
    fn restore_replaces_entry() {
        let cache = InMemorySessionCache::new(2);
        cache.store(session(1, None, 0, u64::MAX));
        cache.store(session(1, None, 5, u64::MAX));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&id(1), 0).unwrap().created_at(), 5);
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let cache = InMemorySessionCache::new(0);
        cache.store(session(1, None, 0, u64::MAX));
        assert!(cache.lookup(&id(1), 0).is_none());
    }

    #[test]
    fn empty_id_is_not_stored() {
        let cache = InMemorySessionCache::new(2);
        let s = Arc::new(Session::new(
            SessionId::empty(),
            MasterSecret::from_bytes([0; 48]),
            CipherSuite::EcdheEcdsaWithAes128GcmSha256,
            Vec::new(),
            None,
            0,
            10,
        ));
        cache.store(s);
        assert!(cache.is_empty());
    }

    #[test]
    fn lookup_by_server_tracks_latest() {
        let cache = InMemorySessionCache::new(4);
        cache.store(session(1, Some("host.test"), 0, u64::MAX));
        cache.store(session(2, Some("host.test"), 0, u64::MAX));
        assert_eq!(cache.lookup_by_server("host.test", 0).unwrap().id(), &id(2));
        assert!(cache.lookup_by_server("other.test", 0).is_none());
        assert!(NoSessionCache.lookup_by_server("host.test", 0).is_none());
    }

    #[test]
    fn lookup_by_server_falls_back_to_older_sessions() {
        let cache = InMemorySessionCache::new(4);
        cache.store(session(1, Some("host.test"), 0, u64::MAX));
        cache.store(session(2, Some("host.test"), 0, 10));
        cache.store(session(3, Some("other.test"), 0, u64::MAX));

        // The newest one for the host has expired; the older one is still live.
        assert_eq!(cache.lookup_by_server("host.test", 20).unwrap().id(), &id(1));
        assert_eq!(cache.len(), 2);

        // Evicting the newest entry keeps the older one reachable by name.
        let cache = InMemorySessionCache::new(2);
        cache.store(session(1, Some("host.test"), 0, u64::MAX));
        cache.store(session(2, Some("host.test"), 0, u64::MAX));
        assert!(cache.lookup(&id(1), 0).is_some());
        cache.store(session(3, None, 0, u64::MAX));
        assert!(cache.lookup(&id(2), 0).is_none());
        assert_eq!(cache.lookup_by_server("host.test", 0).unwrap().id(), &id(1));
    }

    #[test]
    fn concurrent_store_and_lookup() {
        let cache = Arc::new(InMemorySessionCache::new(64));
        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..16u8 {
                        let b = t * 16 + i;
                        cache.store(session(b, None, 0, u64::MAX));
                        assert_eq!(cache.lookup(&id(b), 0).unwrap().id(), &id(b));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 64);
    }
}
