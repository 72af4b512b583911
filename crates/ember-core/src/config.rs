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

//! Flat configuration tunables supplied at construction.
//!
//! Every component reads its own section. Durations are (de)serialized as
//! integer milliseconds so a config file stays readable:
//!
//! ```rust
//! use ember_core::config::EmberConfig;
//!
//! let config = EmberConfig::from_json_str(r#"{ "cache": { "max_size": 16 } }"#).unwrap();
//! assert_eq!(config.cache.max_size, 16);
//! assert_eq!(config.network.default_concurrency, 4);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::priority::LoadPriority;

/// An error raised while reading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON for [`EmberConfig`].
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),
    /// A value is outside its accepted range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// (De)serializes a [`Duration`] as integer milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes as milliseconds.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    /// Deserializes from milliseconds.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Cache store tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries (count-based capacity is primary).
    pub max_size: usize,
    /// TTL applied when a caller does not supply one.
    #[serde(with = "duration_ms")]
    pub default_ttl: Duration,
    /// Fraction of entries evicted in one overflow pass (at least one).
    pub eviction_fraction: f64,
    /// Period of the background expiry sweep.
    #[serde(with = "duration_ms")]
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            default_ttl: Duration::from_secs(5 * 60),
            eviction_fraction: 0.1,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Resource monitor tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sampling period.
    #[serde(with = "duration_ms")]
    pub sample_interval: Duration,
    /// Values retained per sample kind.
    pub reservoir_size: usize,
    /// Memory usage above which a warning is emitted.
    pub memory_ceiling_bytes: u64,
    /// Frame rate the host aims for.
    pub target_fps: f64,
    /// Render samples above this are reported as slow.
    #[serde(with = "duration_ms")]
    pub slow_render_threshold: Duration,
    /// Interaction samples above this are reported as delayed.
    #[serde(with = "duration_ms")]
    pub interaction_delay_threshold: Duration,
    /// Consecutive problematic ticks before an optimization suggestion.
    pub suggestion_streak: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(1),
            reservoir_size: 100,
            memory_ceiling_bytes: 512 * 1024 * 1024,
            target_fps: 60.0,
            slow_render_threshold: Duration::from_millis(16),
            interaction_delay_threshold: Duration::from_millis(100),
            suggestion_streak: 3,
        }
    }
}

/// Network condition sensor tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Batch size under ordinary conditions.
    pub default_batch_size: usize,
    /// Concurrent loads under ordinary conditions.
    pub default_concurrency: usize,
    /// Concurrent loads under constrained conditions.
    pub constrained_concurrency: usize,
    /// Concurrent loads under fast conditions.
    pub fast_concurrency: usize,
    /// Downlink below this (Mbps) counts as constrained.
    pub min_downlink_mbps: f64,
    /// Downlink at or above this (Mbps) counts as fast.
    pub fast_downlink_mbps: f64,
    /// Transfers retained for the observed-throughput estimate.
    pub bandwidth_samples: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            default_batch_size: 5,
            default_concurrency: 4,
            constrained_concurrency: 2,
            fast_concurrency: 8,
            min_downlink_mbps: 1.5,
            fast_downlink_mbps: 10.0,
            bandwidth_samples: 10,
        }
    }
}

/// Behavior predictor tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Scroll samples retained.
    pub scroll_history: usize,
    /// Interaction samples retained.
    pub interaction_history: usize,
    /// Interactions older than this are ignored by the frequency count.
    #[serde(with = "duration_ms")]
    pub interaction_window: Duration,
    /// How far ahead the scroll position is projected.
    #[serde(with = "duration_ms")]
    pub projection_horizon: Duration,
    /// Velocity variance ((px/s)^2) at which scroll confidence drops to 0.5.
    pub scroll_variance_scale: f64,
    /// Scroll confidence above which preloading is advised.
    pub scroll_confidence_threshold: f64,
    /// Interaction confidence above which preloading is advised.
    pub interaction_confidence_threshold: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            scroll_history: 10,
            interaction_history: 50,
            interaction_window: Duration::from_secs(30),
            projection_horizon: Duration::from_secs(1),
            scroll_variance_scale: 10_000.0,
            scroll_confidence_threshold: 0.7,
            interaction_confidence_threshold: 0.6,
        }
    }
}

/// Progressive loader tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Retries after the first attempt; a task runs at most `retry_count + 1` times.
    pub retry_count: u32,
    /// Fixed delay between attempts.
    #[serde(with = "duration_ms")]
    pub retry_delay: Duration,
    /// Priority used by `preload` when neither an explicit nor an
    /// index-derived priority applies.
    pub preload_priority: LoadPriority,
    /// Finished tasks remembered for status queries and dependency checks.
    /// The oldest are forgotten first.
    pub task_history: usize,
}

impl LoaderConfig {
    /// Upper bound accepted for [`retry_count`](Self::retry_count).
    pub const MAX_RETRY_COUNT: u32 = 100;
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            retry_count: 2,
            retry_delay: Duration::from_millis(1000),
            preload_priority: LoadPriority::Low,
            task_history: 256,
        }
    }
}

/// The complete set of tunables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmberConfig {
    /// Cache store section.
    pub cache: CacheConfig,
    /// Resource monitor section.
    pub monitor: MonitorConfig,
    /// Network sensor section.
    pub network: NetworkConfig,
    /// Behavior predictor section.
    pub behavior: BehaviorConfig,
    /// Loader section.
    pub loader: LoaderConfig,
}

impl EmberConfig {
    /// Parses and validates a JSON document; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects values no component can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_size == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.max_size",
                reason: "must be at least 1".into(),
            });
        }
        if !(self.cache.eviction_fraction > 0.0 && self.cache.eviction_fraction <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "cache.eviction_fraction",
                reason: format!("{} is not in (0, 1]", self.cache.eviction_fraction),
            });
        }
        if self.cache.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "cache.sweep_interval",
                reason: "must be non-zero".into(),
            });
        }
        if self.monitor.sample_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "monitor.sample_interval",
                reason: "must be non-zero".into(),
            });
        }
        if self.monitor.target_fps <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "monitor.target_fps",
                reason: "must be positive".into(),
            });
        }
        if self.network.default_batch_size == 0 || self.network.default_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "network",
                reason: "batch size and concurrency must be at least 1".into(),
            });
        }
        if self.loader.retry_count > LoaderConfig::MAX_RETRY_COUNT {
            return Err(ConfigError::Invalid {
                field: "loader.retry_count",
                reason: format!(
                    "{} exceeds the maximum of {}",
                    self.loader.retry_count,
                    LoaderConfig::MAX_RETRY_COUNT
                ),
            });
        }
        Ok(())
    }
}
