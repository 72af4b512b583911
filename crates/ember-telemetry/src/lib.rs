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

//! # Ember Telemetry
//!
//! The [`ResourceMonitor`] samples memory (through a [`MemoryProbe`]) and
//! frame rate on a fixed interval, aggregates render and interaction timings
//! reported by the host, and emits advisory events through listeners and a
//! channel subscription. It never touches cache or pool contents.

#![warn(missing_docs)]

pub mod frame;
pub mod monitor;
pub mod probe;
pub mod timer;

pub use frame::FrameCounter;
pub use monitor::{ListenerId, MonitorReport, ResourceMonitor};
pub use probe::{ManualMemoryProbe, MemoryProbe, SysinfoMemoryProbe};
pub use timer::ScopedRenderTimer;
