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

//! # Ember Control
//!
//! Advisory inputs to the loading pipeline:
//!
//! - [`network::NetworkSensor`] turns connection reports into batch-size and
//!   concurrency hints.
//! - [`behavior::BehaviorPredictor`] turns scroll and interaction history
//!   into confidence-scored predictions.
//!
//! Neither component schedules work or fails; they only inform the loader.

#![warn(missing_docs)]

pub mod behavior;
pub mod network;

pub use behavior::{BehaviorPredictor, Prediction, PredictionPayload, PredictionSubject};
pub use network::{
    ConnectionClass, EffectiveType, NetworkCondition, NetworkInfo, NetworkSensor, NetworkStats,
};
