//! Bounded, self-expiring in-memory revocation sets.
//!
//! Two instances back the access-token verifier: one keyed by raw revoked
//! access tokens, one keyed by deactivated account ids. Entries never need to
//! outlive the access-token lifetime, because past that point the signature
//! check alone rejects the token; that fixed TTL is what bounds memory without
//! any background cleanup.
//!
//! These caches are process-local. A multi-instance deployment would need an
//! externalized store for equivalent behavior; that is a known limitation, not
//! something this module papers over.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub struct RevocationCache<K> {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<K, Instant>>,
}

impl<K: Eq + Hash + Clone> RevocationCache<K> {
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Mark a key revoked. Expired entries are dropped on the way in, and the
    /// oldest entry is evicted once the capacity bound is hit.
    pub async fn insert(&self, key: K) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, inserted_at| now.duration_since(*inserted_at) < self.ttl);
        if entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, inserted_at)| **inserted_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(key, now);
    }

    /// Whether the key is currently revoked.
    pub async fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .is_some_and(|inserted_at| inserted_at.elapsed() < self.ttl)
    }
}
