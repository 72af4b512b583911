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

//! Short-horizon prediction of what the user will need next.
//!
//! The predictor keeps bounded histories of scroll positions and interaction
//! targets and turns them into confidence-scored [`Prediction`]s. It is
//! purely advisory: it never schedules work itself.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Instant;

use ember_core::config::BehaviorConfig;
use ember_core::sync::MutexExt;
use ember_core::SharedClock;
use serde::Serialize;

/// Scroll predictions need at least this many samples.
const MIN_SCROLL_SAMPLES: usize = 3;

/// What a prediction is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PredictionSubject {
    /// Where the viewport is heading.
    Scroll,
    /// Which target the user will interact with.
    Interaction,
}

/// The predicted value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PredictionPayload {
    /// Projected scroll position and the mean velocity it was projected with.
    ScrollPosition {
        /// Position after the projection horizon.
        position: f64,
        /// Mean velocity in units per second.
        velocity: f64,
    },
    /// Most likely next interaction target.
    Target(String),
}

/// A confidence-scored guess.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// What is predicted.
    pub subject: PredictionSubject,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// The predicted value.
    pub payload: PredictionPayload,
}

#[derive(Debug, Default)]
struct BehaviorState {
    scrolls: VecDeque<(Instant, f64)>,
    interactions: VecDeque<(Instant, String)>,
}

/// Velocity and frequency models over recent user behavior.
#[derive(Debug)]
pub struct BehaviorPredictor {
    config: BehaviorConfig,
    clock: SharedClock,
    state: Mutex<BehaviorState>,
}

impl BehaviorPredictor {
    /// Creates a predictor with empty histories.
    pub fn new(config: BehaviorConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(BehaviorState::default()),
        }
    }

    /// Records the current scroll position.
    pub fn record_scroll(&self, position: f64) {
        let now = self.clock.now();
        let capacity = self.config.scroll_history.max(MIN_SCROLL_SAMPLES);
        let mut state = self.state.lock_recover();
        if state.scrolls.len() >= capacity {
            state.scrolls.pop_front();
        }
        state.scrolls.push_back((now, position));
    }

    /// Records an interaction with `target`.
    pub fn record_interaction(&self, target: impl Into<String>) {
        let now = self.clock.now();
        let capacity = self.config.interaction_history.max(1);
        let mut state = self.state.lock_recover();
        if state.interactions.len() >= capacity {
            state.interactions.pop_front();
        }
        state.interactions.push_back((now, target.into()));
    }

    /// Projects the scroll position `projection_horizon` ahead.
    ///
    /// Confidence is `1 / (1 + variance / scroll_variance_scale)` over the
    /// velocities between consecutive samples, so steady scrolling scores
    /// high and erratic scrolling low.
    pub fn predict_scroll(&self) -> Option<Prediction> {
        let state = self.state.lock_recover();
        if state.scrolls.len() < MIN_SCROLL_SAMPLES {
            return None;
        }

        let velocities: Vec<f64> = state
            .scrolls
            .iter()
            .zip(state.scrolls.iter().skip(1))
            .filter_map(|((t0, p0), (t1, p1))| {
                let dt = t1.saturating_duration_since(*t0).as_secs_f64();
                (dt > 0.0).then(|| (p1 - p0) / dt)
            })
            .collect();
        if velocities.is_empty() {
            return None;
        }

        let n = velocities.len() as f64;
        let mean = velocities.iter().sum::<f64>() / n;
        let variance = velocities.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let scale = self.config.scroll_variance_scale.max(f64::EPSILON);
        let confidence = (1.0 / (1.0 + variance / scale)).clamp(0.0, 1.0);

        let (_, last) = *state.scrolls.back()?;
        let position = last + mean * self.config.projection_horizon.as_secs_f64();

        Some(Prediction {
            subject: PredictionSubject::Scroll,
            confidence,
            payload: PredictionPayload::ScrollPosition {
                position,
                velocity: mean,
            },
        })
    }

    /// Predicts the most frequent target within `interaction_window`.
    ///
    /// Confidence is that target's share of the windowed interactions. Ties
    /// go to the most recently used target.
    pub fn predict_interaction(&self) -> Option<Prediction> {
        let now = self.clock.now();
        let window = self.config.interaction_window;
        let state = self.state.lock_recover();

        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        let mut total = 0usize;
        for (order, (at, target)) in state.interactions.iter().enumerate() {
            if now.saturating_duration_since(*at) > window {
                continue;
            }
            let slot = counts.entry(target.as_str()).or_insert((0, order));
            slot.0 += 1;
            slot.1 = order;
            total += 1;
        }

        let (target, (count, _)) = counts
            .into_iter()
            .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(a.1 .1.cmp(&b.1 .1)))?;

        Some(Prediction {
            subject: PredictionSubject::Interaction,
            confidence: count as f64 / total as f64,
            payload: PredictionPayload::Target(target.to_owned()),
        })
    }

    /// All current predictions, scroll first.
    pub fn predictions(&self) -> Vec<Prediction> {
        self.predict_scroll()
            .into_iter()
            .chain(self.predict_interaction())
            .collect()
    }

    /// Returns `true` when either model is confident enough to justify
    /// preloading.
    pub fn should_preload_based_on_behavior(&self) -> bool {
        let scroll = self
            .predict_scroll()
            .is_some_and(|p| p.confidence > self.config.scroll_confidence_threshold);
        let interaction = self
            .predict_interaction()
            .is_some_and(|p| p.confidence > self.config.interaction_confidence_threshold);
        if scroll || interaction {
            log::debug!(
                "Behavior suggests preloading (scroll={}, interaction={}).",
                scroll,
                interaction
            );
        }
        scroll || interaction
    }

    /// Forgets every recorded sample.
    pub fn clear(&self) {
        let mut state = self.state.lock_recover();
        state.scrolls.clear();
        state.interactions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ember_core::ManualClock;
    use std::sync::Arc;
    use std::time::Duration;

    fn predictor() -> (BehaviorPredictor, ManualClock) {
        let clock = ManualClock::new();
        (
            BehaviorPredictor::new(BehaviorConfig::default(), Arc::new(clock.clone())),
            clock,
        )
    }

    #[test]
    fn needs_three_scroll_samples() {
        let (predictor, clock) = predictor();
        predictor.record_scroll(0.0);
        clock.advance(Duration::from_millis(100));
        predictor.record_scroll(50.0);
        assert!(predictor.predict_scroll().is_none());
    }

    #[test]
    fn steady_scroll_projects_one_second_ahead() {
        let (predictor, clock) = predictor();
        for i in 0..5 {
            predictor.record_scroll(i as f64 * 100.0);
            clock.advance(Duration::from_millis(100));
        }
        let prediction = predictor.predict_scroll().unwrap();
        assert_relative_eq!(prediction.confidence, 1.0);
        match prediction.payload {
            PredictionPayload::ScrollPosition { position, velocity } => {
                assert_relative_eq!(velocity, 1000.0, epsilon = 1e-6);
                assert_relative_eq!(position, 1400.0, epsilon = 1e-6);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn erratic_scroll_has_low_confidence() {
        let (predictor, clock) = predictor();
        for position in [0.0, 500.0, 0.0, 500.0, 0.0] {
            predictor.record_scroll(position);
            clock.advance(Duration::from_millis(100));
        }
        let prediction = predictor.predict_scroll().unwrap();
        assert!(prediction.confidence < 0.1);
        assert!(!predictor.should_preload_based_on_behavior());
    }

    #[test]
    fn scroll_history_is_bounded() {
        let (predictor, clock) = predictor();
        // Erratic start, steady end: only the last ten samples count.
        for position in [0.0, 900.0, 0.0] {
            predictor.record_scroll(position);
            clock.advance(Duration::from_millis(100));
        }
        for i in 0..10 {
            predictor.record_scroll(i as f64 * 10.0);
            clock.advance(Duration::from_millis(100));
        }
        assert_relative_eq!(predictor.predict_scroll().unwrap().confidence, 1.0);
    }

    #[test]
    fn interaction_share_within_window() {
        let (predictor, clock) = predictor();
        predictor.record_interaction("old");
        predictor.record_interaction("old");
        clock.advance(Duration::from_secs(31));

        for target in ["menu", "menu", "menu", "search"] {
            predictor.record_interaction(target);
        }
        let prediction = predictor.predict_interaction().unwrap();
        assert_eq!(prediction.payload, PredictionPayload::Target("menu".into()));
        assert_relative_eq!(prediction.confidence, 0.75);
        assert!(predictor.should_preload_based_on_behavior());
    }

    #[test]
    fn ties_go_to_latest_target() {
        let (predictor, _clock) = predictor();
        for target in ["a", "b", "a", "b"] {
            predictor.record_interaction(target);
        }
        let prediction = predictor.predict_interaction().unwrap();
        assert_eq!(prediction.payload, PredictionPayload::Target("b".into()));
        assert_relative_eq!(prediction.confidence, 0.5);
        assert!(!predictor.should_preload_based_on_behavior());
    }

    #[test]
    fn clear_forgets_everything() {
        let (predictor, _clock) = predictor();
        predictor.record_interaction("x");
        predictor.clear();
        assert!(predictor.predictions().is_empty());
    }
}
