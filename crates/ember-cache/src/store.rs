// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Capacity-bounded cache scored by priority, access frequency and recency.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ember_core::config::CacheConfig;
use ember_core::sync::MutexExt;
use ember_core::{CachePriority, SharedClock, SystemClock};
use serde::Serialize;

use crate::recency::RecencyList;

type Weigher<V> = Box<dyn Fn(&V) -> usize + Send + Sync>;

/// One cached value with its bookkeeping.
#[derive(Debug)]
pub struct CacheEntry<K, V> {
    key: K,
    value: Arc<V>,
    priority: CachePriority,
    created_at: Instant,
    last_accessed_at: Instant,
    access_count: u64,
    ttl: Duration,
    expires_at: Option<Instant>,
    approximate_size: usize,
}

impl<K, V> CacheEntry<K, V> {
    /// The key this entry is stored under.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Shared handle on the value.
    pub fn value(&self) -> &Arc<V> {
        &self.value
    }

    /// Eviction resistance.
    pub fn priority(&self) -> CachePriority {
        self.priority
    }

    /// Insertion instant.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Instant of the last hit (or the insertion).
    pub fn last_accessed_at(&self) -> Instant {
        self.last_accessed_at
    }

    /// Number of accesses, the insertion included.
    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    /// Time-to-live given at insertion.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Expiry instant; `None` when the TTL does not fit in an `Instant`.
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Byte estimate computed by the store's weigher.
    pub fn approximate_size(&self) -> usize {
        self.approximate_size
    }

    /// An entry is valid up to and including its expiry instant.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }

    /// `(access_count * priority_weight) / (age_ms + recency_ms + 1)`.
    ///
    /// Higher scores survive eviction longer.
    pub fn score(&self, now: Instant) -> f64 {
        let age_ms = now.saturating_duration_since(self.created_at).as_secs_f64() * 1000.0;
        let recency_ms =
            now.saturating_duration_since(self.last_accessed_at).as_secs_f64() * 1000.0;
        (self.access_count * self.priority.weight()) as f64 / (age_ms + recency_ms + 1.0)
    }
}

/// Snapshot of the store's counters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CacheStats {
    /// Live entries.
    pub size: usize,
    /// Sum of the entries' approximate sizes, in bytes.
    pub total_size: usize,
    /// `hit_count / (hit_count + miss_count)`, `0.0` before any lookup.
    pub hit_rate: f64,
    /// Lookups that returned a value.
    pub hit_count: u64,
    /// Lookups that found nothing or an expired entry.
    pub miss_count: u64,
    /// Entries removed to make room.
    pub evictions: u64,
    /// Entries removed because their TTL elapsed.
    pub expirations: u64,
}

/// A single-owner cache store.
///
/// Lookups and inserts are O(1) amortized; only an overflow eviction scans
/// the whole store. Wrap it in a [`SharedCacheStore`] to share it between
/// tasks.
pub struct CacheStore<K, V> {
    index: HashMap<K, usize>,
    entries: RecencyList<CacheEntry<K, V>>,
    config: CacheConfig,
    clock: SharedClock,
    weigher: Option<Weigher<V>>,
    total_size: usize,
    hit_count: u64,
    miss_count: u64,
    evictions: u64,
    expirations: u64,
}

impl<K, V> fmt::Debug for CacheStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("len", &self.entries.len())
            .field("max_size", &self.config.max_size)
            .field("total_size", &self.total_size)
            .finish_non_exhaustive()
    }
}

impl<K, V> CacheStore<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Creates a store reading time from `clock`.
    pub fn new(config: CacheConfig, clock: SharedClock) -> Self {
        let config = CacheConfig {
            max_size: config.max_size.max(1),
            ..config
        };
        Self {
            index: HashMap::with_capacity(config.max_size),
            entries: RecencyList::with_capacity(config.max_size),
            config,
            clock,
            weigher: None,
            total_size: 0,
            hit_count: 0,
            miss_count: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    /// Creates a store with default tunables, `max_size` entries and the
    /// system clock.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::new(
            CacheConfig {
                max_size,
                ..CacheConfig::default()
            },
            SystemClock::shared(),
        )
    }

    /// Replaces the size estimator used for `approximate_size`
    /// (`size_of::<V>()` by default).
    pub fn with_weigher(mut self, weigher: impl Fn(&V) -> usize + Send + Sync + 'static) -> Self {
        self.weigher = Some(Box::new(weigher));
        self
    }

    /// The tunables this store was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Looks up `key`, counting a hit or a miss.
    ///
    /// A hit refreshes the entry's recency and access count. An expired
    /// entry is removed and reported as a miss.
    pub fn get<Q>(&mut self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let Some(&id) = self.index.get(key) else {
            self.miss_count += 1;
            log::trace!("Cache miss.");
            return None;
        };

        if self.entries.get(id).is_some_and(|e| e.is_expired(now)) {
            self.remove_id(id);
            self.expirations += 1;
            self.miss_count += 1;
            log::trace!("Cache miss on an expired entry.");
            return None;
        }

        self.entries.move_to_front(id);
        let entry = self.entries.get_mut(id)?;
        entry.last_accessed_at = now;
        entry.access_count += 1;
        self.hit_count += 1;
        log::trace!("Cache hit (access #{}).", entry.access_count);
        Some(Arc::clone(&entry.value))
    }

    /// Looks up `key` without touching counters, recency or expiry state.
    pub fn peek<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entry(key).map(|entry| Arc::clone(&entry.value))
    }

    /// Borrows the live entry stored under `key`, if any.
    pub fn entry<Q>(&self, key: &Q) -> Option<&CacheEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let id = *self.index.get(key)?;
        self.entries.get(id).filter(|entry| !entry.is_expired(now))
    }

    /// Returns `true` if a live entry is stored under `key`.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entry(key).is_some()
    }

    /// Inserts with the default priority and TTL.
    pub fn insert(&mut self, key: K, value: V) {
        let ttl = self.config.default_ttl;
        self.set(key, value, CachePriority::default(), ttl);
    }

    /// Inserts or overwrites `key`.
    ///
    /// Inserting a new key into a full store evicts the lowest-scoring
    /// entries first. Overwriting a live key keeps its access count and
    /// counts the write as one more access; age and TTL start over.
    ///
    /// ## Arguments
    /// * `key` - The entry key.
    /// * `value` - The value, shared out as `Arc<V>` by [`get`](Self::get).
    /// * `priority` - Weight of the entry in the eviction score.
    /// * `ttl` - Lifetime from now. Zero stores nothing and drops any
    ///   previous value under `key`.
    pub fn set(&mut self, key: K, value: V, priority: CachePriority, ttl: Duration) {
        self.set_shared(key, Arc::new(value), priority, ttl);
    }

    /// Same as [`set`](Self::set) for a value that is already shared.
    pub fn set_shared(&mut self, key: K, value: Arc<V>, priority: CachePriority, ttl: Duration) {
        let now = self.clock.now();
        let previous_accesses = self
            .index
            .get(&key)
            .copied()
            .and_then(|id| self.remove_id(id))
            .filter(|previous| !previous.is_expired(now))
            .map_or(0, |previous| previous.access_count);
        if ttl.is_zero() {
            log::trace!("Zero TTL, value dropped on insert.");
            return;
        }

        if self.entries.len() >= self.config.max_size {
            self.make_room();
        }

        let approximate_size = match &self.weigher {
            Some(weigher) => weigher(&value),
            None => std::mem::size_of::<V>(),
        };
        let entry = CacheEntry {
            key: key.clone(),
            value,
            priority,
            created_at: now,
            last_accessed_at: now,
            access_count: previous_accesses + 1,
            ttl,
            expires_at: now.checked_add(ttl),
            approximate_size,
        };
        self.total_size += approximate_size;
        let id = self.entries.push_front(entry);
        self.index.insert(key, id);
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.index.get(key) {
            Some(&id) => {
                self.remove_id(id);
                true
            }
            None => false,
        }
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
        self.total_size = 0;
    }

    /// Eagerly removes every expired entry and returns how many were removed.
    pub fn sweep_expired(&mut self) -> usize {
        let now = self.clock.now();
        let expired: Vec<usize> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(id, _)| id)
            .collect();
        for &id in &expired {
            self.remove_id(id);
        }
        self.expirations += expired.len() as u64;
        if !expired.is_empty() {
            log::debug!("Swept {} expired cache entries.", expired.len());
        }
        expired.len()
    }

    /// Number of stored entries, expired ones not yet observed included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.entries.iter().map(|(_, e)| e.key.clone()).collect()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        let lookups = self.hit_count + self.miss_count;
        CacheStats {
            size: self.entries.len(),
            total_size: self.total_size,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                self.hit_count as f64 / lookups as f64
            },
            hit_count: self.hit_count,
            miss_count: self.miss_count,
            evictions: self.evictions,
            expirations: self.expirations,
        }
    }

    fn remove_id(&mut self, id: usize) -> Option<CacheEntry<K, V>> {
        let entry = self.entries.remove(id)?;
        self.index.remove(&entry.key);
        self.total_size = self.total_size.saturating_sub(entry.approximate_size);
        Some(entry)
    }

    /// Frees at least one slot: expired entries go first, then the
    /// lowest-scoring fraction of the store.
    fn make_room(&mut self) {
        if self.sweep_expired() > 0 && self.entries.len() < self.config.max_size {
            return;
        }

        let now = self.clock.now();
        let mut candidates: Vec<(usize, f64, CachePriority, Instant)> = self
            .entries
            .iter()
            .map(|(id, e)| (id, e.score(now), e.priority, e.created_at))
            .collect();
        candidates.sort_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then_with(|| a.2.cmp(&b.2))
                .then_with(|| a.3.cmp(&b.3))
        });

        let len = candidates.len();
        let count = ((len as f64 * self.config.eviction_fraction).floor() as usize).clamp(1, len.max(1));
        for &(id, ..) in candidates.iter().take(count) {
            self.remove_id(id);
        }
        self.evictions += count.min(len) as u64;
        log::debug!("Evicted {} of {} cache entries.", count.min(len), len);
    }
}

/// A [`CacheStore`] behind one coarse mutex, cheap to clone.
pub struct SharedCacheStore<K, V> {
    inner: Arc<Mutex<CacheStore<K, V>>>,
}

impl<K, V> Clone for SharedCacheStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> fmt::Debug for SharedCacheStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedCacheStore").field(&self.inner).finish()
    }
}

impl<K, V> From<CacheStore<K, V>> for SharedCacheStore<K, V> {
    fn from(store: CacheStore<K, V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }
}

impl<K, V> SharedCacheStore<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Creates a shared store reading time from `clock`.
    pub fn new(config: CacheConfig, clock: SharedClock) -> Self {
        CacheStore::new(config, clock).into()
    }

    /// See [`CacheStore::get`].
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock_recover().get(key)
    }

    /// See [`CacheStore::peek`].
    pub fn peek<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock_recover().peek(key)
    }

    /// See [`CacheStore::contains`].
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock_recover().contains(key)
    }

    /// See [`CacheStore::insert`].
    pub fn insert(&self, key: K, value: V) {
        self.inner.lock_recover().insert(key, value);
    }

    /// See [`CacheStore::set`].
    pub fn set(&self, key: K, value: V, priority: CachePriority, ttl: Duration) {
        self.inner.lock_recover().set(key, value, priority, ttl);
    }

    /// See [`CacheStore::set_shared`].
    pub fn set_shared(&self, key: K, value: Arc<V>, priority: CachePriority, ttl: Duration) {
        self.inner.lock_recover().set_shared(key, value, priority, ttl);
    }

    /// See [`CacheStore::remove`].
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock_recover().remove(key)
    }

    /// See [`CacheStore::clear`].
    pub fn clear(&self) {
        self.inner.lock_recover().clear();
    }

    /// See [`CacheStore::sweep_expired`].
    pub fn sweep_expired(&self) -> usize {
        self.inner.lock_recover().sweep_expired()
    }

    /// See [`CacheStore::len`].
    pub fn len(&self) -> usize {
        self.inner.lock_recover().len()
    }

    /// See [`CacheStore::is_empty`].
    pub fn is_empty(&self) -> bool {
        self.inner.lock_recover().is_empty()
    }

    /// See [`CacheStore::keys_by_recency`].
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.inner.lock_recover().keys_by_recency()
    }

    /// See [`CacheStore::stats`].
    pub fn stats(&self) -> CacheStats {
        self.inner.lock_recover().stats()
    }

    /// Runs `f` with exclusive access to the underlying store.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut CacheStore<K, V>) -> R) -> R {
        f(&mut self.inner.lock_recover())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{Clock, ManualClock};
    use std::sync::Arc;

    fn store(max_size: usize) -> (CacheStore<&'static str, u32>, ManualClock) {
        let clock = ManualClock::new();
        let config = CacheConfig {
            max_size,
            ..CacheConfig::default()
        };
        (CacheStore::new(config, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn hit_refreshes_access_bookkeeping() {
        let (mut cache, clock) = store(4);
        cache.insert("a", 1);
        clock.advance(Duration::from_millis(30));

        assert_eq!(cache.get("a").as_deref(), Some(&1));
        let entry = cache.entry("a").unwrap();
        assert_eq!(entry.access_count(), 2);
        assert_eq!(entry.last_accessed_at() - entry.created_at(), Duration::from_millis(30));
    }

    #[test]
    fn score_formula() {
        let (mut cache, clock) = store(4);
        cache.set("a", 1, CachePriority::High, Duration::from_secs(60));
        clock.advance(Duration::from_millis(9));
        // 1 * 3 / (9 + 9 + 1)
        let score = cache.entry("a").unwrap().score(clock.now());
        assert!((score - 3.0 / 19.0).abs() < 1e-9);
    }

    #[test]
    fn zero_ttl_drops_existing_value() {
        let (mut cache, _clock) = store(4);
        cache.insert("a", 1);
        cache.set("a", 2, CachePriority::High, Duration::ZERO);
        assert!(!cache.contains("a"));
        assert_eq!(cache.len(), 0);
        let stats = cache.stats();
        assert_eq!(stats.hit_count + stats.miss_count, 0);
    }

    #[test]
    fn peek_does_not_count() {
        let (mut cache, _clock) = store(4);
        cache.insert("a", 1);
        assert_eq!(cache.peek("a").as_deref(), Some(&1));
        assert_eq!(cache.peek("b"), None);
        assert_eq!(cache.stats().hit_count, 0);
        assert_eq!(cache.stats().miss_count, 0);
        assert_eq!(cache.entry("a").unwrap().access_count(), 1);
    }

    #[test]
    fn expired_entries_are_swept_before_scoring() {
        let (mut cache, clock) = store(2);
        cache.set("short", 1, CachePriority::Critical, Duration::from_millis(10));
        cache.set("long", 2, CachePriority::Low, Duration::from_secs(60));
        clock.advance(Duration::from_millis(20));

        cache.insert("new", 3);
        assert!(cache.contains("long"));
        assert!(cache.contains("new"));
        let stats = cache.stats();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn weigher_feeds_total_size() {
        let clock = ManualClock::new();
        let mut cache: CacheStore<u32, String> =
            CacheStore::new(CacheConfig::default(), Arc::new(clock)).with_weigher(|s: &String| s.len());
        cache.insert(1, "abcd".to_string());
        cache.insert(2, "xy".to_string());
        assert_eq!(cache.stats().total_size, 6);
        cache.remove(&1);
        assert_eq!(cache.stats().total_size, 2);
    }
}
