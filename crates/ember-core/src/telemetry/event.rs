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

//! Advisory events emitted by the resource monitor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A render or measure pass exceeded the slow threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowRender {
    /// Component or pass that was measured.
    pub component: String,
    /// Measured duration in milliseconds.
    pub duration_ms: f64,
    /// Configured threshold in milliseconds.
    pub threshold_ms: f64,
}

/// Memory usage rose above the configured ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryWarning {
    /// Bytes currently in use.
    pub used_bytes: u64,
    /// Configured ceiling in bytes.
    pub ceiling_bytes: u64,
}

impl MemoryWarning {
    /// Usage as a fraction of the ceiling.
    pub fn pressure(&self) -> f64 {
        if self.ceiling_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.ceiling_bytes as f64
    }
}

/// The frame rate fell below 80% of the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FpsDrop {
    /// Frames per second measured over the last window.
    pub fps: f64,
    /// Configured target frame rate.
    pub target_fps: f64,
}

/// An interaction took longer than the configured threshold to respond.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionDelay {
    /// Interaction target.
    pub target: String,
    /// Measured latency in milliseconds.
    pub latency_ms: f64,
    /// Configured threshold in milliseconds.
    pub threshold_ms: f64,
}

/// Area an optimization suggestion applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuggestionArea {
    /// Rendering cost.
    Rendering,
    /// Memory footprint.
    Memory,
    /// Frame pacing.
    FrameRate,
    /// Input responsiveness.
    Interaction,
}

/// A derived, human-readable hint about sustained problems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    /// Which area the suggestion targets.
    pub area: SuggestionArea,
    /// Suggestion text for display.
    pub message: String,
}

/// Closed set of monitor events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MonitorEvent {
    /// See [`SlowRender`].
    SlowRender(SlowRender),
    /// See [`MemoryWarning`].
    MemoryWarning(MemoryWarning),
    /// See [`FpsDrop`].
    FpsDrop(FpsDrop),
    /// See [`InteractionDelay`].
    InteractionDelay(InteractionDelay),
    /// See [`OptimizationSuggestion`].
    OptimizationSuggestion(OptimizationSuggestion),
}

impl MonitorEvent {
    /// Short name of the event kind, stable for logging and filtering.
    pub fn kind_name(&self) -> &'static str {
        match self {
            MonitorEvent::SlowRender(_) => "slow_render",
            MonitorEvent::MemoryWarning(_) => "memory_warning",
            MonitorEvent::FpsDrop(_) => "fps_drop",
            MonitorEvent::InteractionDelay(_) => "interaction_delay",
            MonitorEvent::OptimizationSuggestion(_) => "optimization_suggestion",
        }
    }
}

impl fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorEvent::SlowRender(e) => write!(
                f,
                "slow render in '{}': {:.1} ms (threshold {:.1} ms)",
                e.component, e.duration_ms, e.threshold_ms
            ),
            MonitorEvent::MemoryWarning(e) => write!(
                f,
                "memory usage {:.1} MB above ceiling {:.1} MB",
                e.used_bytes as f64 / (1024.0 * 1024.0),
                e.ceiling_bytes as f64 / (1024.0 * 1024.0)
            ),
            MonitorEvent::FpsDrop(e) => {
                write!(f, "frame rate {:.1} fps (target {:.0})", e.fps, e.target_fps)
            }
            MonitorEvent::InteractionDelay(e) => write!(
                f,
                "interaction '{}' took {:.1} ms (threshold {:.1} ms)",
                e.target, e.latency_ms, e.threshold_ms
            ),
            MonitorEvent::OptimizationSuggestion(e) => {
                write!(f, "suggestion ({:?}): {}", e.area, e.message)
            }
        }
    }
}
