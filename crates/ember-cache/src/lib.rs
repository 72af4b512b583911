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

//! # Ember Cache
//!
//! In-memory retention for the resource management core.
//!
//! - [`store`]: a capacity-bounded cache whose eviction order is driven by
//!   priority, access frequency and recency, with per-entry TTL.
//! - [`pool`]: fixed-capacity pools of reusable objects, registered by name.
//!
//! Both are synchronous; shared access goes through one coarse mutex per
//! component ([`SharedCacheStore`], [`PoolHandle`]).

#![warn(missing_docs)]

pub mod pool;
mod recency;
pub mod store;

pub use pool::{ObjectPool, PoolHandle, PoolRegistry, PoolStats, Poolable};
pub use store::{CacheEntry, CacheStats, CacheStore, SharedCacheStore};
