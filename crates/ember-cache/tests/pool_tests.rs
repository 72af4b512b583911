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

use ember_cache::{PoolRegistry, Poolable};

#[derive(Debug)]
struct Particle {
    position: (f32, f32),
    was_reset: bool,
}

impl Particle {
    fn spawn() -> Self {
        Self {
            position: (0.0, 0.0),
            was_reset: false,
        }
    }
}

impl Poolable for Particle {
    fn reset(&mut self) {
        self.position = (0.0, 0.0);
        self.was_reset = true;
    }
}

#[test]
fn registry_round_trip_through_handle() {
    let registry = PoolRegistry::new();
    let handle = registry.create("particles", Particle::spawn, 2);

    let mut p = registry.acquire(&handle);
    assert!(!p.was_reset);
    p.position = (3.0, 4.0);
    registry.release(&handle, p);

    let p = registry.acquire(&handle);
    assert!(p.was_reset);
    assert_eq!(p.position, (0.0, 0.0));

    let stats = registry.stats(&handle);
    assert_eq!(stats.allocated, 1);
    assert_eq!(stats.recycled, 1);
    assert_eq!(stats.pool_size, 0);
}

#[test]
fn pool_size_is_bounded() {
    let registry = PoolRegistry::new();
    let handle = registry.create("particles", Particle::spawn, 3);

    let objects: Vec<Particle> = (0..10).map(|_| handle.acquire()).collect();
    for object in objects {
        handle.release(object);
        assert!(handle.stats().pool_size <= 3);
    }
    assert_eq!(handle.stats().pool_size, 3);
    assert_eq!(handle.stats().allocated, 10);
}

#[test]
fn handles_share_one_pool() {
    let registry = PoolRegistry::new();
    let created = registry.create("scratch", Vec::<u8>::new, 4);
    let looked_up = registry.get::<Vec<u8>>("scratch").expect("pool registered");

    created.release(vec![1, 2, 3]);
    let reused = looked_up.acquire();
    assert!(reused.is_empty());
    assert_eq!(looked_up.stats().recycled, 1);
    assert_eq!(looked_up.name(), "scratch");
}

#[test]
fn names_stats_and_removal() {
    let registry = PoolRegistry::new();
    registry.create("b", String::new, 1);
    registry.create("a", Vec::<u32>::new, 1);
    assert_eq!(registry.names(), vec!["a", "b"]);

    let all = registry.all_stats();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].0, "a");

    assert!(registry.remove("a"));
    assert!(!registry.remove("a"));
    assert_eq!(registry.names(), vec!["b"]);
}

#[test]
fn clear_all_empties_free_lists() {
    let registry = PoolRegistry::new();
    let handle = registry.create("strings", String::new, 4);
    handle.release(String::from("x"));
    handle.release(String::from("y"));
    assert_eq!(handle.stats().pool_size, 2);

    registry.clear_all();
    assert_eq!(handle.stats().pool_size, 0);
}
