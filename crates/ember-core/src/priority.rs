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

//! Priority tiers shared by the cache and the loading pipeline.
//!
//! Two scales coexist: [`CachePriority`] expresses how strongly an entry
//! resists eviction (higher resists more), while [`LoadPriority`] expresses
//! scheduling urgency (lower numeric value is more urgent).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Eviction resistance of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum CachePriority {
    /// Cheap to refetch, evicted first.
    Low,
    /// Default tier.
    #[default]
    Medium,
    /// Expensive to refetch.
    High,
    /// Must survive eviction pressure as long as possible.
    Critical,
}

impl CachePriority {
    /// Integer rank used as the eviction score weight (1..=4).
    pub fn weight(self) -> u64 {
        match self {
            CachePriority::Low => 1,
            CachePriority::Medium => 2,
            CachePriority::High => 3,
            CachePriority::Critical => 4,
        }
    }
}

/// Scheduling urgency of a load task.
///
/// The ordering is total and follows the numeric value: `Immediate` (0) is
/// the most urgent, `Background` (4) the least.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum LoadPriority {
    /// Blocking the user right now.
    Immediate = 0,
    /// Needed for the next interaction.
    High = 1,
    /// Standard priority.
    #[default]
    Normal = 2,
    /// Prefetch.
    Low = 3,
    /// Load when nothing else is queued.
    Background = 4,
}

impl LoadPriority {
    /// All tiers, most urgent first.
    pub const ALL: [LoadPriority; 5] = [
        LoadPriority::Immediate,
        LoadPriority::High,
        LoadPriority::Normal,
        LoadPriority::Low,
        LoadPriority::Background,
    ];

    /// Number of tiers.
    pub const COUNT: usize = Self::ALL.len();

    /// Index of the tier's queue, `0` being the most urgent.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns the tier one step less urgent, saturating at `Background`.
    pub fn demoted(self) -> Self {
        Self::ALL[(self.index() + 1).min(Self::COUNT - 1)]
    }

    /// Returns `true` for tiers that are dropped when the host view is hidden.
    pub fn is_deferrable(self) -> bool {
        self >= LoadPriority::Low
    }
}

impl fmt::Display for LoadPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadPriority::Immediate => "immediate",
            LoadPriority::High => "high",
            LoadPriority::Normal => "normal",
            LoadPriority::Low => "low",
            LoadPriority::Background => "background",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_priority_weights_follow_rank() {
        assert!(CachePriority::Low < CachePriority::Critical);
        assert_eq!(CachePriority::Low.weight(), 1);
        assert_eq!(CachePriority::Critical.weight(), 4);
    }

    #[test]
    fn load_priority_order_is_urgency() {
        assert!(LoadPriority::Immediate < LoadPriority::Background);
        assert_eq!(LoadPriority::Immediate.index(), 0);
        assert_eq!(LoadPriority::Background.index(), 4);
    }

    #[test]
    fn demotion_saturates() {
        assert_eq!(LoadPriority::High.demoted(), LoadPriority::Normal);
        assert_eq!(LoadPriority::Background.demoted(), LoadPriority::Background);
    }

    #[test]
    fn deferrable_tiers() {
        assert!(!LoadPriority::Normal.is_deferrable());
        assert!(LoadPriority::Low.is_deferrable());
        assert!(LoadPriority::Background.is_deferrable());
    }
}
