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

//! # Ember Core
//!
//! Foundational crate containing the shared vocabulary of the resource
//! management core: priority tiers, the injectable clock, telemetry samples
//! and events, the generic event bus and the flat configuration tunables.
//!
//! Higher-level crates (`ember-cache`, `ember-telemetry`, `ember-control`,
//! `ember-loader`) only agree with each other through the types defined here.

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod event;
pub mod priority;
pub mod sync;
pub mod telemetry;

pub use clock::{Clock, ManualClock, SharedClock, Stopwatch, SystemClock};
pub use config::{
    BehaviorConfig, CacheConfig, ConfigError, EmberConfig, LoaderConfig, MonitorConfig,
    NetworkConfig,
};
pub use event::EventBus;
pub use priority::{CachePriority, LoadPriority};
