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

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use ember_cache::{CacheStore, ObjectPool};
use ember_core::config::CacheConfig;
use ember_core::{CachePriority, ManualClock};

fn filled_store(max_size: usize) -> CacheStore<u64, u64> {
    let clock = ManualClock::new();
    let mut store = CacheStore::new(
        CacheConfig {
            max_size,
            ..CacheConfig::default()
        },
        Arc::new(clock),
    );
    for i in 0..max_size as u64 {
        store.set(i, i, CachePriority::Medium, Duration::from_secs(60));
    }
    store
}

fn bench_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("Cache Store");

    group.bench_function("get hit (1k entries)", |b| {
        let mut store = filled_store(1_000);
        let mut key = 0u64;
        b.iter(|| {
            key = (key + 7) % 1_000;
            black_box(store.get(&key));
        });
    });

    group.bench_function("set with eviction (1k entries)", |b| {
        let mut store = filled_store(1_000);
        let mut key = 1_000u64;
        b.iter(|| {
            key += 1;
            store.set(key, key, CachePriority::Low, Duration::from_secs(60));
        });
    });

    group.finish();

    let mut group = c.benchmark_group("Object Pool");
    group.bench_function("acquire/release", |b| {
        let mut pool = ObjectPool::new(|| Vec::<u8>::with_capacity(256), 16);
        b.iter(|| {
            let buffer = pool.acquire();
            pool.release(black_box(buffer));
        });
    });
    group.finish();
}

criterion_group!(benches, bench_cache);
criterion_main!(benches);
