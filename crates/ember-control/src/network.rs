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

//! Network condition sensing.
//!
//! The sensor holds the last connection report from the host and derives
//! batch-size and concurrency hints from it. It never fails: without a
//! report it answers from defaults.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use ember_core::config::NetworkConfig;
use ember_core::sync::MutexExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Physical link type reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionClass {
    /// The host did not say.
    #[default]
    Unknown,
    /// Ethernet or similar.
    Wired,
    /// Wireless LAN.
    Wifi,
    /// Mobile data.
    Cellular,
}

/// Effective bandwidth class, as measured by the host.
///
/// Ordered from slowest to fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum EffectiveType {
    /// Below 2G.
    #[serde(rename = "slow-2g")]
    Slow2g,
    /// 2G.
    #[serde(rename = "2g")]
    G2,
    /// 3G.
    #[serde(rename = "3g")]
    G3,
    /// 4G or better.
    #[default]
    #[serde(rename = "4g")]
    G4,
}

impl EffectiveType {
    /// Wire name of the class (`"slow-2g"`, `"2g"`, `"3g"`, `"4g"`).
    pub fn as_str(self) -> &'static str {
        match self {
            EffectiveType::Slow2g => "slow-2g",
            EffectiveType::G2 => "2g",
            EffectiveType::G3 => "3g",
            EffectiveType::G4 => "4g",
        }
    }
}

impl fmt::Display for EffectiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown effective type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown effective connection type '{0}'")]
pub struct UnknownEffectiveType(pub String);

impl FromStr for EffectiveType {
    type Err = UnknownEffectiveType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Ok(EffectiveType::Slow2g),
            "2g" => Ok(EffectiveType::G2),
            "3g" => Ok(EffectiveType::G3),
            "4g" => Ok(EffectiveType::G4),
            other => Err(UnknownEffectiveType(other.to_owned())),
        }
    }
}

/// The last connection report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Link type.
    pub connection_class: ConnectionClass,
    /// Measured bandwidth class.
    pub effective_type: EffectiveType,
    /// The user asked to reduce data usage.
    pub save_data: bool,
    /// Estimated downlink in megabits per second.
    pub downlink_mbps: f64,
    /// Estimated round-trip time in milliseconds.
    pub rtt_ms: u32,
}

impl Default for NetworkInfo {
    fn default() -> Self {
        Self {
            connection_class: ConnectionClass::Unknown,
            effective_type: EffectiveType::G4,
            save_data: false,
            downlink_mbps: 5.0,
            rtt_ms: 50,
        }
    }
}

/// Coarse classification driving the hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NetworkCondition {
    /// Save-data, 2G or worse, or a low downlink.
    Constrained,
    /// Nothing notable.
    Normal,
    /// 4G with a high downlink, or an unconstrained wired/wifi link.
    Fast,
}

/// Serializable view of the sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkStats {
    /// Last report.
    pub info: NetworkInfo,
    /// Classification of that report.
    pub condition: NetworkCondition,
    /// Weighted moving average of recorded transfers, in Mbps.
    pub observed_downlink_mbps: Option<f64>,
    /// Transfers recorded since creation.
    pub transfers_recorded: u64,
}

#[derive(Debug, Default)]
struct SensorState {
    info: NetworkInfo,
    throughput_mbps: VecDeque<f64>,
    transfers_recorded: u64,
}

/// Derives loading hints from network conditions.
#[derive(Debug)]
pub struct NetworkSensor {
    config: NetworkConfig,
    state: Mutex<SensorState>,
}

impl NetworkSensor {
    /// Creates a sensor reporting default conditions.
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SensorState::default()),
        }
    }

    /// Replaces the connection report.
    pub fn update(&self, info: NetworkInfo) {
        let mut state = self.state.lock_recover();
        if state.info != info {
            log::debug!(
                "Network changed: {:?} {} {:.1} Mbps, {} ms rtt, save_data={}.",
                info.connection_class,
                info.effective_type,
                info.downlink_mbps,
                info.rtt_ms,
                info.save_data
            );
        }
        state.info = info;
    }

    /// The last connection report.
    pub fn info(&self) -> NetworkInfo {
        self.state.lock_recover().info.clone()
    }

    /// Returns `true` under save-data, 2G or worse, or a low downlink.
    pub fn should_reduce_quality(&self) -> bool {
        let state = self.state.lock_recover();
        self.is_constrained(&state.info)
    }

    /// Classifies the current conditions.
    pub fn condition(&self) -> NetworkCondition {
        let state = self.state.lock_recover();
        self.classify(&state.info)
    }

    /// Number of items to load per preload batch.
    pub fn optimal_batch_size(&self) -> usize {
        let default = self.config.default_batch_size.max(1);
        match self.condition() {
            NetworkCondition::Constrained => (default / 2).max(1),
            NetworkCondition::Normal => default,
            NetworkCondition::Fast => default * 2,
        }
    }

    /// Number of loads allowed to run at once.
    pub fn optimal_concurrency(&self) -> usize {
        let concurrency = match self.condition() {
            NetworkCondition::Constrained => self.config.constrained_concurrency,
            NetworkCondition::Normal => self.config.default_concurrency,
            NetworkCondition::Fast => self.config.fast_concurrency,
        };
        concurrency.max(1)
    }

    /// Folds a completed transfer into the observed-throughput estimate.
    pub fn record_transfer(&self, bytes: u64, duration: Duration) {
        let secs = duration.as_secs_f64();
        if secs <= 0.0 {
            return;
        }
        let mbps = bytes as f64 * 8.0 / secs / 1_000_000.0;
        let capacity = self.config.bandwidth_samples.max(1);

        let mut state = self.state.lock_recover();
        if state.throughput_mbps.len() >= capacity {
            state.throughput_mbps.pop_front();
        }
        state.throughput_mbps.push_back(mbps);
        state.transfers_recorded += 1;
    }

    /// Weighted moving average of recorded transfers (recent ones weigh
    /// more), in Mbps. `None` before the first transfer.
    pub fn observed_downlink_mbps(&self) -> Option<f64> {
        weighted_average(&self.state.lock_recover().throughput_mbps)
    }

    /// Serializable view of the sensor.
    pub fn stats(&self) -> NetworkStats {
        let state = self.state.lock_recover();
        NetworkStats {
            info: state.info.clone(),
            condition: self.classify(&state.info),
            observed_downlink_mbps: weighted_average(&state.throughput_mbps),
            transfers_recorded: state.transfers_recorded,
        }
    }

    fn is_constrained(&self, info: &NetworkInfo) -> bool {
        info.save_data
            || info.effective_type <= EffectiveType::G2
            || info.downlink_mbps < self.config.min_downlink_mbps
    }

    fn classify(&self, info: &NetworkInfo) -> NetworkCondition {
        if self.is_constrained(info) {
            return NetworkCondition::Constrained;
        }
        let fast_cellular = info.effective_type == EffectiveType::G4
            && info.downlink_mbps >= self.config.fast_downlink_mbps;
        let local_link = matches!(
            info.connection_class,
            ConnectionClass::Wired | ConnectionClass::Wifi
        );
        if fast_cellular || local_link {
            NetworkCondition::Fast
        } else {
            NetworkCondition::Normal
        }
    }
}

impl Default for NetworkSensor {
    fn default() -> Self {
        Self::new(NetworkConfig::default())
    }
}

fn weighted_average(samples: &VecDeque<f64>) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let (sum, weights) = samples
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sum, weights), (i, value)| {
            let weight = (i + 1) as f64;
            (sum + value * weight, weights + weight)
        });
    Some(sum / weights)
}
