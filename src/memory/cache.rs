//! Bounded in-process profile cache with LRU eviction and TTL expiry
//!
//! Purely advisory: the filesystem is the source of truth and a miss is a
//! normal outcome, never a failure. All operations are serialized under one
//! lock so the lookup map and the recency order can never diverge.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

use super::types::ConsumerProfile;

struct CacheSlot {
    profile: ConsumerProfile,
    cached_at: DateTime<Utc>,
}

struct CacheInner {
    slots: HashMap<String, CacheSlot>,
    /// Recency order, least recently used first. Key set always matches
    /// `slots` exactly.
    access_order: Vec<String>,
}

impl CacheInner {
    fn touch(&mut self, profile_id: &str) {
        if let Some(pos) = self.access_order.iter().position(|id| id == profile_id) {
            let id = self.access_order.remove(pos);
            self.access_order.push(id);
        }
    }

    fn evict(&mut self, profile_id: &str) {
        self.slots.remove(profile_id);
        self.access_order.retain(|id| id != profile_id);
    }
}

/// Thread-safe LRU+TTL cache keyed by profile id.
pub struct ProfileCache {
    max_size: usize,
    ttl: Duration,
    inner: Mutex<CacheInner>,
}

impl ProfileCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size,
            ttl,
            inner: Mutex::new(CacheInner {
                slots: HashMap::new(),
                access_order: Vec::new(),
            }),
        }
    }

    /// Profile for `profile_id` if cached and within TTL.
    ///
    /// An expired entry is purged and reported as a miss. A valid hit is
    /// promoted to most-recently-used.
    pub fn get(&self, profile_id: &str) -> Option<ConsumerProfile> {
        let mut inner = self.inner.lock();

        let expired = match inner.slots.get(profile_id) {
            None => return None,
            Some(slot) => Utc::now() - slot.cached_at > self.ttl,
        };

        if expired {
            inner.evict(profile_id);
            tracing::trace!(profile_id = profile_id, "Cache entry expired");
            return None;
        }

        inner.touch(profile_id);
        inner.slots.get(profile_id).map(|slot| slot.profile.clone())
    }

    /// Insert or replace the entry for this profile, stamped now, then evict
    /// least-recently-used entries while over capacity.
    pub fn put(&self, profile: &ConsumerProfile) {
        let profile_id = profile.profile_id.clone();
        let mut inner = self.inner.lock();

        if inner.slots.contains_key(&profile_id) {
            inner.access_order.retain(|id| id != &profile_id);
        }
        inner.slots.insert(
            profile_id.clone(),
            CacheSlot {
                profile: profile.clone(),
                cached_at: Utc::now(),
            },
        );
        inner.access_order.push(profile_id);

        while inner.slots.len() > self.max_size {
            match inner.access_order.first().cloned() {
                Some(oldest) => {
                    inner.evict(&oldest);
                    tracing::trace!(profile_id = %oldest, "Evicted LRU cache entry");
                }
                None => break,
            }
        }
    }

    pub fn remove(&self, profile_id: &str) {
        self.inner.lock().evict(profile_id);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.slots.clear();
        inner.access_order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().slots.is_empty()
    }

    /// Membership check that does not promote the entry or count as an
    /// access. Expired entries still count as present until observed by
    /// `get`.
    pub fn contains(&self, profile_id: &str) -> bool {
        self.inner.lock().slots.contains_key(profile_id)
    }
}
