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

//! Immutable observations and their bounded rolling aggregates.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

/// What a [`Sample`] measures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SampleKind {
    /// Duration of a render/measure pass, in milliseconds.
    RenderDuration,
    /// Memory in use, in bytes.
    MemoryUsage,
    /// Frames per second over the last window.
    FrameRate,
    /// Input-to-response latency, in milliseconds.
    InteractionLatency,
    /// Host-defined measurement.
    Custom(String),
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleKind::RenderDuration => f.write_str("render_duration"),
            SampleKind::MemoryUsage => f.write_str("memory_usage"),
            SampleKind::FrameRate => f.write_str("frame_rate"),
            SampleKind::InteractionLatency => f.write_str("interaction_latency"),
            SampleKind::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// A single immutable observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// What was measured.
    pub kind: SampleKind,
    /// The measured value, in the kind's unit.
    pub value: f64,
    /// Optional origin of the measurement (component name, interaction target).
    pub label: Option<String>,
    /// When the observation was taken.
    pub timestamp: Instant,
}

impl Sample {
    /// Creates an unlabeled sample.
    pub fn new(kind: SampleKind, value: f64, timestamp: Instant) -> Self {
        Self {
            kind,
            value,
            label: None,
            timestamp,
        }
    }

    /// Attaches a label to the sample.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Summary statistics for one sample kind.
///
/// `count`, `mean`, `min` and `max` cover every value ever observed;
/// percentiles only cover the values still held in the reservoir.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricAggregate {
    /// Total number of observations.
    pub count: u64,
    /// Running arithmetic mean.
    pub mean: f64,
    /// Smallest observed value.
    pub min: f64,
    /// Largest observed value.
    pub max: f64,
    /// Median of the reservoir.
    pub p50: f64,
    /// 95th percentile of the reservoir.
    pub p95: f64,
    /// 99th percentile of the reservoir.
    pub p99: f64,
}

/// A bounded reservoir of values plus a running aggregate.
///
/// Once `capacity` values are held, each push drops the oldest one.
#[derive(Debug, Clone)]
pub struct SampleSeries {
    values: VecDeque<f64>,
    capacity: usize,
    count: u64,
    mean: f64,
    min: f64,
    max: f64,
}

impl SampleSeries {
    /// Creates an empty series holding at most `capacity` values (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            count: 0,
            mean: 0.0,
            min: f64::MAX,
            max: f64::MIN,
        }
    }

    /// Folds a new value into the series.
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);

        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Number of values currently held in the reservoir.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing was ever pushed.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Most recent value, if any.
    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Values in the reservoir, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }

    /// Mean of the reservoir only (as opposed to the lifetime mean).
    pub fn window_mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Computes the current aggregate.
    pub fn aggregate(&self) -> MetricAggregate {
        if self.count == 0 {
            return MetricAggregate::default();
        }

        let mut sorted: Vec<f64> = self.values.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        MetricAggregate {
            count: self.count,
            mean: self.mean,
            min: self.min,
            max: self.max,
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        }
    }
}

/// Nearest-rank percentile over an ascending slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reservoir_drops_oldest() {
        let mut series = SampleSeries::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            series.push(v);
        }
        let values: Vec<f64> = series.iter().copied().collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
        assert_eq!(series.latest(), Some(4.0));
    }

    #[test]
    fn lifetime_stats_survive_eviction() {
        let mut series = SampleSeries::new(2);
        for v in [10.0, 20.0, 30.0] {
            series.push(v);
        }
        let agg = series.aggregate();
        assert_eq!(agg.count, 3);
        assert_relative_eq!(agg.mean, 20.0);
        assert_eq!(agg.min, 10.0);
        assert_eq!(agg.max, 30.0);
        // Percentiles only see the reservoir: [20, 30].
        assert_eq!(agg.p50, 20.0);
        assert_eq!(agg.p99, 30.0);
        assert_relative_eq!(series.window_mean(), 25.0);
    }

    #[test]
    fn percentiles_use_nearest_rank() {
        let mut series = SampleSeries::new(100);
        for v in 1..=100 {
            series.push(v as f64);
        }
        let agg = series.aggregate();
        assert_eq!(agg.p50, 50.0);
        assert_eq!(agg.p95, 95.0);
        assert_eq!(agg.p99, 99.0);
    }

    #[test]
    fn empty_series_aggregates_to_default() {
        let series = SampleSeries::new(0);
        assert!(series.is_empty());
        assert_eq!(series.aggregate(), MetricAggregate::default());
    }

    #[test]
    fn custom_kind_display() {
        assert_eq!(SampleKind::Custom("decode".into()).to_string(), "custom:decode");
        assert_eq!(SampleKind::FrameRate.to_string(), "frame_rate");
    }
}
