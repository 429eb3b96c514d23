//! Cache of computed RRSIGs keyed by RRset digest.
//!
//! Each digest owns a slot with its own lock. A caller that misses computes
//! the signature while holding that lock, so concurrent callers for the same
//! RRset wait for and share one computation while other digests proceed
//! independently. The map is bounded: once over capacity an approximately
//! least recently used idle slot is evicted.

pub mod stats;

pub use stats::CacheStats;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::clock::Clock;
use crate::dnssec::{Rrsig, RrsetDigest, SignError};

struct Slot {
    entry: Mutex<Option<Rrsig>>,
    /// Monotonic access counter value at last use
    last_access: AtomicU64,
    /// Set once the slot has left the map; holders must look up again
    retired: AtomicBool,
}

impl Slot {
    fn new(access: u64) -> Self {
        Self {
            entry: Mutex::new(None),
            last_access: AtomicU64::new(access),
            retired: AtomicBool::new(false),
        }
    }

    fn is_live(&self) -> bool {
        !self.retired.load(Ordering::Acquire)
    }
}

/// Eviction queue entry: a slot and its access stamp when queued. A slot
/// used since then gets a second chance at the back of the queue.
struct Candidate {
    digest: RrsetDigest,
    slot: Weak<Slot>,
    access: u64,
}

pub struct SignatureCache {
    entries: DashMap<RrsetDigest, Arc<Slot>>,
    recency: Mutex<VecDeque<Candidate>>,
    capacity: usize,
    refresh_margin: u32,
    clock: Arc<dyn Clock>,
    access_counter: AtomicU64,
    stats: CacheStats,
}

impl SignatureCache {
    pub fn new(capacity: usize, refresh_margin: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity.min(1 << 16)),
            recency: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            refresh_margin: refresh_margin.as_secs().min(u64::from(u32::MAX)) as u32,
            clock,
            access_counter: AtomicU64::new(0),
            stats: CacheStats::new(),
        }
    }

    /// Whether a signature may still be served at `now`. Signatures within
    /// the refresh margin of their expiration are treated as missing.
    fn is_fresh(&self, rrsig: &Rrsig, now: u32) -> bool {
        now < rrsig.expiration.saturating_sub(self.refresh_margin)
    }

    fn slot(&self, digest: RrsetDigest) -> Arc<Slot> {
        let access = self.access_counter.fetch_add(1, Ordering::Relaxed);

        // Hits only take the shard read lock
        let existing = self.entries.get(&digest).map(|slot| Arc::clone(&slot));
        if let Some(slot) = existing {
            slot.last_access.store(access, Ordering::Relaxed);
            return slot;
        }

        let (slot, inserted) = match self.entries.entry(digest) {
            Entry::Occupied(occupied) => (Arc::clone(occupied.get()), false),
            Entry::Vacant(vacant) => {
                let slot = Arc::new(Slot::new(access));
                vacant.insert(Arc::clone(&slot));
                (slot, true)
            }
        };
        slot.last_access.store(access, Ordering::Relaxed);
        if inserted {
            self.enqueue(digest, &slot, access);
        }
        slot
    }

    fn enqueue(&self, digest: RrsetDigest, slot: &Arc<Slot>, access: u64) {
        let mut recency = self.recency.lock();
        recency.push_back(Candidate {
            digest,
            slot: Arc::downgrade(slot),
            access,
        });
        // Failed and purged slots leave dead candidates behind
        if recency.len() > self.capacity.saturating_mul(2).saturating_add(16) {
            recency.retain(|c| c.slot.upgrade().is_some_and(|s| s.is_live()));
        }
    }

    /// Return the cached signature for `digest`, or run `compute` and cache
    /// its result. At most one `compute` per digest runs at a time. Errors
    /// are returned to the caller and nothing is cached.
    pub fn get_or_compute<F>(&self, digest: RrsetDigest, compute: F) -> Result<Rrsig, SignError>
    where
        F: FnOnce() -> Result<Rrsig, SignError>,
    {
        let slot = self.slot(digest);
        let mut entry = slot.entry.lock();
        if slot.retired.load(Ordering::Acquire) {
            // Evicted while we waited for the lock
            drop(entry);
            return self.get_or_compute(digest, compute);
        }

        let now = self.clock.now();
        if let Some(rrsig) = entry.as_ref() {
            if self.is_fresh(rrsig, now) {
                self.stats.record_hit();
                trace!("Signature cache hit for {}", digest);
                return Ok(rrsig.clone());
            }
            debug!("Cached signature for {} is stale, re-signing", digest);
        }
        self.stats.record_miss();

        match compute() {
            Ok(rrsig) => {
                *entry = Some(rrsig.clone());
                drop(entry);
                self.stats.record_compute();
                self.enforce_capacity(&slot);
                Ok(rrsig)
            }
            Err(e) => {
                *entry = None;
                slot.retired.store(true, Ordering::Release);
                self.entries.remove_if(&digest, |_, s| Arc::ptr_eq(s, &slot));
                drop(entry);
                self.stats.record_failure();
                debug!("Signing {} failed, nothing cached: {}", digest, e);
                Err(e)
            }
        }
    }

    /// Fresh cached signature for `digest`, without computing.
    pub fn get(&self, digest: &RrsetDigest) -> Option<Rrsig> {
        let slot = self.entries.get(digest).map(|s| Arc::clone(&s))?;
        let entry = slot.entry.lock();
        entry
            .as_ref()
            .filter(|rrsig| self.is_fresh(rrsig, self.clock.now()))
            .cloned()
    }

    fn enforce_capacity(&self, keep: &Arc<Slot>) {
        while self.entries.len() > self.capacity {
            if !self.evict_lru(keep) {
                break;
            }
        }
    }

    /// Evict the oldest queued slot that has not been used since it was
    /// queued and is not being computed or read. Recently used and busy slots
    /// are moved to the back of the queue.
    fn evict_lru(&self, keep: &Arc<Slot>) -> bool {
        let mut budget = self.recency.lock().len();
        while budget > 0 {
            budget -= 1;
            let Some(candidate) = self.recency.lock().pop_front() else {
                return false;
            };
            let Some(slot) = candidate.slot.upgrade().filter(|s| s.is_live()) else {
                continue;
            };

            let access = slot.last_access.load(Ordering::Relaxed);
            if Arc::ptr_eq(&slot, keep) || access != candidate.access {
                self.requeue(candidate.digest, &slot, access);
                continue;
            }
            let Some(_guard) = slot.entry.try_lock() else {
                self.requeue(candidate.digest, &slot, access);
                continue;
            };
            if self
                .entries
                .remove_if(&candidate.digest, |_, s| Arc::ptr_eq(s, &slot))
                .is_some()
            {
                slot.retired.store(true, Ordering::Release);
                self.stats.record_eviction();
                trace!("Evicted signature for {}", candidate.digest);
                return true;
            }
        }
        false
    }

    fn requeue(&self, digest: RrsetDigest, slot: &Arc<Slot>, access: u64) {
        self.recency.lock().push_back(Candidate {
            digest,
            slot: Arc::downgrade(slot),
            access,
        });
    }

    /// Drop every idle entry that is stale or empty. Returns the number
    /// removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, slot| {
            let Some(entry) = slot.entry.try_lock() else {
                return true;
            };
            match entry.as_ref() {
                Some(rrsig) if self.is_fresh(rrsig, now) => true,
                _ => {
                    slot.retired.store(true, Ordering::Release);
                    false
                }
            }
        });
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.recency
                .lock()
                .retain(|c| c.slot.upgrade().is_some_and(|s| s.is_live()));
            self.stats.record_expired_evictions(removed as u64);
            info!("Purged {} stale signatures from cache", removed);
        }
        removed
    }

    /// Run `purge_expired` every `interval` until the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.upgrade() {
                    Some(cache) => {
                        cache.purge_expired();
                    }
                    None => break,
                }
            }
            debug!("Signature cache sweeper stopped");
        })
    }

    pub fn clear(&self) {
        self.entries.retain(|_, slot| {
            slot.retired.store(true, Ordering::Release);
            false
        });
        self.recency.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::dns::enums::DNSResourceType;
    use crate::dnssec::DnsSecAlgorithm;

    fn digest(n: u8) -> RrsetDigest {
        RrsetDigest([n; 32])
    }

    fn rrsig(expiration: u32) -> Rrsig {
        Rrsig {
            type_covered: DNSResourceType::A,
            algorithm: DnsSecAlgorithm::Ed25519,
            labels: 2,
            original_ttl: 3600,
            expiration,
            inception: 0,
            key_tag: 1,
            signer_name: vec!["example".to_string()],
            signature: vec![expiration as u8],
        }
    }

    fn cache(capacity: usize, clock: Arc<ManualClock>) -> SignatureCache {
        SignatureCache::new(capacity, Duration::from_secs(100), clock)
    }

    #[test]
    fn test_hit_after_compute() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = cache(10, clock);
        let first = cache.get_or_compute(digest(1), || Ok(rrsig(5_000))).unwrap();
        let second = cache
            .get_or_compute(digest(1), || panic!("must be served from cache"))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.stats().hits.load(Ordering::Relaxed), 1);
        assert_eq!(cache.stats().computes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_refresh_margin() {
        let clock = Arc::new(ManualClock::new(4_899));
        let cache = cache(10, clock.clone());
        cache.get_or_compute(digest(1), || Ok(rrsig(5_000))).unwrap();
        assert!(cache.get(&digest(1)).is_some());

        clock.set(4_900);
        assert!(cache.get(&digest(1)).is_none());
        let renewed = cache.get_or_compute(digest(1), || Ok(rrsig(9_000))).unwrap();
        assert_eq!(renewed.expiration, 9_000);
    }

    #[test]
    fn test_error_not_cached() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = cache(10, clock);
        let err = cache
            .get_or_compute(digest(1), || Err(SignError::EmptyRRset))
            .unwrap_err();
        assert_eq!(err, SignError::EmptyRRset);
        assert!(cache.is_empty());
        assert!(cache.get_or_compute(digest(1), || Ok(rrsig(5_000))).is_ok());
        assert_eq!(cache.stats().failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_lru_eviction() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = cache(2, clock);
        cache.get_or_compute(digest(1), || Ok(rrsig(5_000))).unwrap();
        cache.get_or_compute(digest(2), || Ok(rrsig(5_000))).unwrap();
        // touch 1 so that 2 is the oldest
        cache.get_or_compute(digest(1), || Ok(rrsig(5_000))).unwrap();
        cache.get_or_compute(digest(3), || Ok(rrsig(5_000))).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&digest(1)).is_some());
        assert!(cache.get(&digest(2)).is_none());
        assert!(cache.get(&digest(3)).is_some());
        assert_eq!(cache.stats().evictions.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_recently_used_survive_eviction() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = cache(4, clock);
        for n in 1..=4 {
            cache.get_or_compute(digest(n), || Ok(rrsig(5_000))).unwrap();
        }
        cache.get_or_compute(digest(1), || Ok(rrsig(5_000))).unwrap();
        cache.get_or_compute(digest(2), || Ok(rrsig(5_000))).unwrap();

        cache.get_or_compute(digest(5), || Ok(rrsig(5_000))).unwrap();
        cache.get_or_compute(digest(6), || Ok(rrsig(5_000))).unwrap();
        assert!(cache.get(&digest(3)).is_none());
        assert!(cache.get(&digest(4)).is_none());
        for n in [1, 2, 5, 6] {
            assert!(cache.get(&digest(n)).is_some(), "digest {}", n);
        }
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_failures_do_not_grow_eviction_queue() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = cache(4, clock);
        for n in 0..200u8 {
            let _ = cache.get_or_compute(digest(n), || Err(SignError::EmptyRRset));
        }
        assert!(cache.is_empty());
        assert!(cache.recency.lock().len() <= 2 * 4 + 16 + 1);
    }

    #[test]
    fn test_concurrent_hits() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = Arc::new(cache(10, clock));
        cache.get_or_compute(digest(1), || Ok(rrsig(5_000))).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        cache
                            .get_or_compute(digest(1), || panic!("must be served from cache"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.stats().hits.load(Ordering::Relaxed), 800);
        assert_eq!(cache.recency.lock().len(), 1);
    }

    #[test]
    fn test_purge_expired() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = cache(10, clock.clone());
        cache.get_or_compute(digest(1), || Ok(rrsig(2_000))).unwrap();
        cache.get_or_compute(digest(2), || Ok(rrsig(9_000))).unwrap();

        clock.set(1_950);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&digest(2)).is_some());
    }
}
