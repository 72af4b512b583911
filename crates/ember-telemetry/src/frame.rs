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

//! Sliding-window frame counting.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Counts frames reported by the host over a trailing window.
#[derive(Debug, Clone)]
pub struct FrameCounter {
    window: Duration,
    frames: VecDeque<Instant>,
    total: u64,
}

impl FrameCounter {
    /// Creates a counter averaging over `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            frames: VecDeque::new(),
            total: 0,
        }
    }

    /// Records one presented frame.
    pub fn record(&mut self, now: Instant) {
        self.frames.push_back(now);
        self.total += 1;
        self.prune(now);
    }

    /// Frames per second over the window ending at `now`.
    pub fn fps(&mut self, now: Instant) -> f64 {
        self.prune(now);
        self.frames.len() as f64 / self.window.as_secs_f64()
    }

    /// Returns `true` while frames fall inside the window ending at `now`.
    /// A host that stops presenting, such as a hidden view, goes inactive.
    pub fn is_active(&mut self, now: Instant) -> bool {
        self.prune(now);
        !self.frames.is_empty()
    }

    /// Frames reported since creation.
    pub fn total(&self) -> u64 {
        self.total
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.frames.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.frames.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
