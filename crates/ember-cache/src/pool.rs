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

//! Fixed-capacity pools of reusable objects and a registry keyed by name.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use ember_core::sync::MutexExt;
use serde::Serialize;

/// An object that can be recycled through an [`ObjectPool`].
pub trait Poolable: Send + 'static {
    /// Restores the object to the state the pool's factory produces.
    ///
    /// Called on every release that keeps the object in the pool, so a
    /// recycled object never carries state from its previous user.
    fn reset(&mut self);
}

impl<T: Send + 'static> Poolable for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl Poolable for String {
    fn reset(&mut self) {
        self.clear();
    }
}

/// Snapshot of a pool's counters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PoolStats {
    /// Objects currently waiting in the free list.
    pub pool_size: usize,
    /// Objects created by the factory.
    pub allocated: u64,
    /// Acquisitions served from the free list.
    pub recycled: u64,
    /// `recycled / (allocated + recycled)`, `0.0` before any acquisition.
    pub reuse_rate: f64,
}

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

/// A bounded free list in front of a factory.
pub struct ObjectPool<T: Poolable> {
    free: Vec<T>,
    factory: Factory<T>,
    max_size: usize,
    allocated: u64,
    recycled: u64,
}

impl<T: Poolable> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("available", &self.free.len())
            .field("max_size", &self.max_size)
            .field("allocated", &self.allocated)
            .field("recycled", &self.recycled)
            .finish_non_exhaustive()
    }
}

impl<T: Poolable> ObjectPool<T> {
    /// Creates an empty pool keeping at most `max_size` idle objects.
    pub fn new(factory: impl Fn() -> T + Send + Sync + 'static, max_size: usize) -> Self {
        Self {
            free: Vec::with_capacity(max_size),
            factory: Box::new(factory),
            max_size,
            allocated: 0,
            recycled: 0,
        }
    }

    /// Hands out an idle object, or a fresh one from the factory.
    pub fn acquire(&mut self) -> T {
        match self.free.pop() {
            Some(object) => {
                self.recycled += 1;
                object
            }
            None => {
                self.allocated += 1;
                (self.factory)()
            }
        }
    }

    /// Resets `object` and keeps it for reuse, or drops it when the pool is full.
    pub fn release(&mut self, mut object: T) {
        if self.free.len() >= self.max_size {
            return;
        }
        object.reset();
        self.free.push(object);
    }

    /// Drops every idle object. Counters are kept.
    pub fn clear(&mut self) {
        self.free.clear();
    }

    /// Maximum number of idle objects.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of idle objects.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> PoolStats {
        let served = self.allocated + self.recycled;
        PoolStats {
            pool_size: self.free.len(),
            allocated: self.allocated,
            recycled: self.recycled,
            reuse_rate: if served == 0 {
                0.0
            } else {
                self.recycled as f64 / served as f64
            },
        }
    }
}

/// A typed, cloneable handle on a pool owned by a [`PoolRegistry`].
pub struct PoolHandle<T: Poolable> {
    name: Arc<str>,
    pool: Arc<Mutex<ObjectPool<T>>>,
}

impl<T: Poolable> Clone for PoolHandle<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<T: Poolable> fmt::Debug for PoolHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolHandle").field("name", &self.name).finish()
    }
}

impl<T: Poolable> PoolHandle<T> {
    /// Name the pool was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// See [`ObjectPool::acquire`].
    pub fn acquire(&self) -> T {
        self.pool.lock_recover().acquire()
    }

    /// See [`ObjectPool::release`].
    pub fn release(&self, object: T) {
        self.pool.lock_recover().release(object);
    }

    /// See [`ObjectPool::stats`].
    pub fn stats(&self) -> PoolStats {
        self.pool.lock_recover().stats()
    }

    /// See [`ObjectPool::clear`].
    pub fn clear(&self) {
        self.pool.lock_recover().clear();
    }
}

/// Type-erased view of a registered pool.
trait ErasedPool: Send + Sync {
    fn stats(&self) -> PoolStats;
    fn clear(&self);
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Poolable> ErasedPool for Mutex<ObjectPool<T>> {
    fn stats(&self) -> PoolStats {
        self.lock_recover().stats()
    }

    fn clear(&self) {
        self.lock_recover().clear();
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Pools of heterogeneous object types, looked up by name.
#[derive(Default)]
pub struct PoolRegistry {
    pools: Mutex<HashMap<String, Arc<dyn ErasedPool>>>,
}

impl fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("pools", &self.names())
            .finish()
    }
}

impl PoolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new pool under `name`, replacing any previous one.
    ///
    /// ## Arguments
    /// * `name` - Registry key, also used in [`all_stats`](Self::all_stats).
    /// * `factory` - Builds a fresh instance when the free list is empty.
    /// * `max_size` - Free-list capacity; releases beyond it are dropped.
    ///
    /// ## Returns
    /// A cheap, cloneable handle to the pool.
    pub fn create<T: Poolable>(
        &self,
        name: &str,
        factory: impl Fn() -> T + Send + Sync + 'static,
        max_size: usize,
    ) -> PoolHandle<T> {
        let pool = Arc::new(Mutex::new(ObjectPool::new(factory, max_size)));
        let previous = self
            .pools
            .lock_recover()
            .insert(name.to_owned(), Arc::clone(&pool) as Arc<dyn ErasedPool>);
        if previous.is_some() {
            log::warn!("Pool '{}' was re-created; the previous pool is detached.", name);
        } else {
            log::info!(
                "Created pool '{}' for {} (max_size {}).",
                name,
                std::any::type_name::<T>(),
                max_size
            );
        }
        PoolHandle {
            name: Arc::from(name),
            pool,
        }
    }

    /// Returns a handle on the pool named `name` if it holds `T`.
    pub fn get<T: Poolable>(&self, name: &str) -> Option<PoolHandle<T>> {
        let erased = Arc::clone(self.pools.lock_recover().get(name)?);
        match erased.into_any().downcast::<Mutex<ObjectPool<T>>>() {
            Ok(pool) => Some(PoolHandle {
                name: Arc::from(name),
                pool,
            }),
            Err(_) => {
                log::warn!(
                    "Pool '{}' does not hold objects of type {}.",
                    name,
                    std::any::type_name::<T>()
                );
                None
            }
        }
    }

    /// Acquires an object from the pool behind `handle`.
    pub fn acquire<T: Poolable>(&self, handle: &PoolHandle<T>) -> T {
        handle.acquire()
    }

    /// Releases `object` back to the pool behind `handle`.
    pub fn release<T: Poolable>(&self, handle: &PoolHandle<T>, object: T) {
        handle.release(object);
    }

    /// Counters of the pool behind `handle`.
    pub fn stats<T: Poolable>(&self, handle: &PoolHandle<T>) -> PoolStats {
        handle.stats()
    }

    /// Counters of every registered pool, sorted by name.
    pub fn all_stats(&self) -> Vec<(String, PoolStats)> {
        let pools = self.pools.lock_recover();
        let mut stats: Vec<(String, PoolStats)> = pools
            .iter()
            .map(|(name, pool)| (name.clone(), pool.stats()))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }

    /// Unregisters `name`. Outstanding handles keep working on the detached pool.
    pub fn remove(&self, name: &str) -> bool {
        self.pools.lock_recover().remove(name).is_some()
    }

    /// Drops the idle objects of every pool.
    pub fn clear_all(&self) {
        for pool in self.pools.lock_recover().values() {
            pool.clear();
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.lock_recover().keys().cloned().collect();
        names.sort();
        names
    }
}
