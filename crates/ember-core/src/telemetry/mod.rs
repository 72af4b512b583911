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

//! The "common language" of resource telemetry.
//!
//! This module defines samples, rolling aggregates and the closed set of
//! advisory events. `ember-telemetry` provides the monitor that produces
//! them; hosts consume them through listeners or bus subscriptions.

pub mod event;
pub mod sample;

pub use self::event::{
    FpsDrop, InteractionDelay, MemoryWarning, MonitorEvent, OptimizationSuggestion, SlowRender,
    SuggestionArea,
};
pub use self::sample::{MetricAggregate, Sample, SampleKind, SampleSeries};
