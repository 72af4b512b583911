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

//! The periodic resource monitor.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ember_core::config::MonitorConfig;
use ember_core::sync::MutexExt;
use ember_core::telemetry::{
    FpsDrop, InteractionDelay, MemoryWarning, MetricAggregate, MonitorEvent,
    OptimizationSuggestion, SampleKind, SampleSeries, SlowRender, SuggestionArea,
};
use ember_core::{EventBus, SharedClock};
use serde::Serialize;

use crate::frame::FrameCounter;
use crate::probe::{MemoryProbe, SysinfoMemoryProbe};
use crate::timer::ScopedRenderTimer;

/// Frame rates below this fraction of the target are reported.
const FPS_DROP_RATIO: f64 = 0.8;

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&MonitorEvent) + Send + Sync>;

/// Serializable snapshot of what the monitor has seen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorReport {
    /// Aggregates keyed by sample kind name.
    pub aggregates: BTreeMap<String, MetricAggregate>,
    /// Frame rate at the last sample, if the host reports frames.
    pub last_fps: Option<f64>,
    /// Memory in use at the last sample, if a probe is available.
    pub last_memory_bytes: Option<u64>,
    /// Periodic samples taken so far.
    pub samples_taken: u64,
    /// Advisory events emitted so far.
    pub events_emitted: u64,
}

#[derive(Debug, Default)]
struct Streaks {
    memory: u32,
    fps: u32,
    render: u32,
    interaction: u32,
}

#[derive(Debug)]
struct MonitorState {
    series: HashMap<SampleKind, SampleSeries>,
    frames: FrameCounter,
    last_sample: Instant,
    last_fps: Option<f64>,
    last_memory: Option<u64>,
    streaks: Streaks,
    samples_taken: u64,
}

impl MonitorState {
    fn push(&mut self, kind: SampleKind, value: f64, capacity: usize) {
        self.series
            .entry(kind)
            .or_insert_with(|| SampleSeries::new(capacity))
            .push(value);
    }

    fn p95(&self, kind: &SampleKind) -> Option<f64> {
        self.series
            .get(kind)
            .filter(|series| !series.is_empty())
            .map(|series| series.aggregate().p95)
    }
}

/// Samples memory and frame rate on a fixed interval, aggregates render and
/// interaction measurements reported by the host, and emits advisory
/// [`MonitorEvent`]s when thresholds are crossed.
///
/// Every method takes `&self`; share the monitor behind an `Arc`.
pub struct ResourceMonitor {
    config: MonitorConfig,
    clock: SharedClock,
    probe: Option<Arc<dyn MemoryProbe>>,
    state: Mutex<MonitorState>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
    events_emitted: AtomicU64,
    bus: EventBus<MonitorEvent>,
}

impl fmt::Debug for ResourceMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceMonitor")
            .field("config", &self.config)
            .field("probe", &self.probe)
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

impl ResourceMonitor {
    /// Creates a monitor reading process memory through `sysinfo`.
    pub fn new(config: MonitorConfig, clock: SharedClock) -> Self {
        Self::with_probe(config, clock, Some(Arc::new(SysinfoMemoryProbe::new())))
    }

    /// Creates a monitor with an explicit memory source; `None` skips
    /// memory sampling.
    pub fn with_probe(
        config: MonitorConfig,
        clock: SharedClock,
        probe: Option<Arc<dyn MemoryProbe>>,
    ) -> Self {
        let now = clock.now();
        Self {
            state: Mutex::new(MonitorState {
                series: HashMap::new(),
                frames: FrameCounter::new(Duration::from_secs(1)),
                last_sample: now,
                last_fps: None,
                last_memory: None,
                streaks: Streaks::default(),
                samples_taken: 0,
            }),
            config,
            clock,
            probe,
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
            events_emitted: AtomicU64::new(0),
            bus: EventBus::new(),
        }
    }

    /// The tunables this monitor was built with.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Samples if the interval has elapsed since the last sample.
    ///
    /// Returns `true` when a sample was taken.
    pub fn tick(&self) -> bool {
        let now = self.clock.now();
        {
            let state = self.state.lock_recover();
            if now.saturating_duration_since(state.last_sample) < self.config.sample_interval {
                return false;
            }
        }
        log::trace!("Sampling resources...");
        self.sample_at(now);
        true
    }

    /// Samples immediately, regardless of the interval, and returns the
    /// events this sample produced.
    pub fn sample_now(&self) -> Vec<MonitorEvent> {
        let now = self.clock.now();
        self.sample_at(now)
    }

    fn sample_at(&self, now: Instant) -> Vec<MonitorEvent> {
        let memory = self.probe.as_ref().and_then(|probe| probe.used_bytes());
        let capacity = self.config.reservoir_size;
        let streak_len = self.config.suggestion_streak.max(1);
        let mut events = Vec::new();

        {
            let mut state = self.state.lock_recover();
            state.last_sample = now;
            state.samples_taken += 1;

            match memory {
                Some(used) => {
                    state.last_memory = Some(used);
                    state.push(SampleKind::MemoryUsage, used as f64, capacity);
                    if used > self.config.memory_ceiling_bytes {
                        state.streaks.memory += 1;
                        events.push(MonitorEvent::MemoryWarning(MemoryWarning {
                            used_bytes: used,
                            ceiling_bytes: self.config.memory_ceiling_bytes,
                        }));
                    } else {
                        state.streaks.memory = 0;
                    }
                }
                None => state.streaks.memory = 0,
            }

            if state.frames.is_active(now) {
                let fps = state.frames.fps(now);
                state.last_fps = Some(fps);
                state.push(SampleKind::FrameRate, fps, capacity);
                if fps < self.config.target_fps * FPS_DROP_RATIO {
                    state.streaks.fps += 1;
                    events.push(MonitorEvent::FpsDrop(FpsDrop {
                        fps,
                        target_fps: self.config.target_fps,
                    }));
                } else {
                    state.streaks.fps = 0;
                }
            } else {
                state.streaks.fps = 0;
            }

            let render_limit = duration_ms(self.config.slow_render_threshold);
            match state.p95(&SampleKind::RenderDuration) {
                Some(p95) if p95 > render_limit => state.streaks.render += 1,
                _ => state.streaks.render = 0,
            }
            let interaction_limit = duration_ms(self.config.interaction_delay_threshold);
            match state.p95(&SampleKind::InteractionLatency) {
                Some(p95) if p95 > interaction_limit => state.streaks.interaction += 1,
                _ => state.streaks.interaction = 0,
            }

            let sustained = |streak: u32| streak > 0 && streak % streak_len == 0;
            if sustained(state.streaks.memory) {
                events.push(suggestion(
                    SuggestionArea::Memory,
                    format!(
                        "Memory stayed above {} MB for {} samples; shrink caches or release pooled objects.",
                        self.config.memory_ceiling_bytes / (1024 * 1024),
                        state.streaks.memory
                    ),
                ));
            }
            if sustained(state.streaks.fps) {
                events.push(suggestion(
                    SuggestionArea::FrameRate,
                    format!(
                        "Frame rate stayed below {:.0} fps for {} samples; reduce per-frame work or defer preloading.",
                        self.config.target_fps * FPS_DROP_RATIO,
                        state.streaks.fps
                    ),
                ));
            }
            if sustained(state.streaks.render) {
                events.push(suggestion(
                    SuggestionArea::Rendering,
                    format!(
                        "Render p95 exceeds {:.1} ms; virtualize long lists or memoize expensive components.",
                        render_limit
                    ),
                ));
            }
            if sustained(state.streaks.interaction) {
                events.push(suggestion(
                    SuggestionArea::Interaction,
                    format!(
                        "Interaction p95 exceeds {:.1} ms; move work off the input path.",
                        interaction_limit
                    ),
                ));
            }
        }

        for event in &events {
            self.emit(event.clone());
        }
        events
    }

    /// Reports one presented frame.
    pub fn record_frame(&self) {
        let now = self.clock.now();
        self.state.lock_recover().frames.record(now);
    }

    /// Records a render pass of `component`; emits [`SlowRender`] above the threshold.
    pub fn record_render(&self, component: &str, duration: Duration) {
        let value = duration_ms(duration);
        self.state.lock_recover().push(
            SampleKind::RenderDuration,
            value,
            self.config.reservoir_size,
        );
        let threshold_ms = duration_ms(self.config.slow_render_threshold);
        if value > threshold_ms {
            self.emit(MonitorEvent::SlowRender(SlowRender {
                component: component.to_owned(),
                duration_ms: value,
                threshold_ms,
            }));
        }
    }

    /// Records the latency of an interaction with `target`; emits
    /// [`InteractionDelay`] above the threshold.
    pub fn record_interaction(&self, target: &str, latency: Duration) {
        let value = duration_ms(latency);
        self.state.lock_recover().push(
            SampleKind::InteractionLatency,
            value,
            self.config.reservoir_size,
        );
        let threshold_ms = duration_ms(self.config.interaction_delay_threshold);
        if value > threshold_ms {
            self.emit(MonitorEvent::InteractionDelay(InteractionDelay {
                target: target.to_owned(),
                latency_ms: value,
                threshold_ms,
            }));
        }
    }

    /// Records a host-defined measurement. Never emits events.
    pub fn record_custom(&self, name: &str, value: f64) {
        self.state.lock_recover().push(
            SampleKind::Custom(name.to_owned()),
            value,
            self.config.reservoir_size,
        );
    }

    /// Starts a timer that records a render sample for `component` when dropped.
    pub fn time_render(&self, component: impl Into<String>) -> ScopedRenderTimer<'_> {
        ScopedRenderTimer::new(self, component.into(), self.clock.now())
    }

    pub(crate) fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Calls `listener` for every event emitted from now on.
    ///
    /// Listeners run synchronously on the sampling thread, after the
    /// monitor's own lock is released.
    ///
    /// ## Returns
    /// An id for [`remove_listener`](Self::remove_listener).
    pub fn add_listener(&self, listener: impl Fn(&MonitorEvent) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.lock_recover();
        listeners.push((id, Arc::new(listener)));
        log::info!("Monitor listener registered ({} total).", listeners.len());
        id
    }

    /// Unregisters a listener; returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock_recover();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        before != listeners.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock_recover().len()
    }

    /// Returns a channel receiving every event emitted from now on.
    pub fn subscribe(&self) -> flume::Receiver<MonitorEvent> {
        self.bus.subscribe()
    }

    /// Aggregate for one sample kind, if anything was recorded.
    pub fn aggregate(&self, kind: &SampleKind) -> Option<MetricAggregate> {
        self.state
            .lock_recover()
            .series
            .get(kind)
            .map(SampleSeries::aggregate)
    }

    /// Frame rate at the last sample.
    pub fn last_fps(&self) -> Option<f64> {
        self.state.lock_recover().last_fps
    }

    /// Memory usage at the last sample.
    pub fn last_memory_bytes(&self) -> Option<u64> {
        self.state.lock_recover().last_memory
    }

    /// Snapshot of aggregates and counters.
    pub fn report(&self) -> MonitorReport {
        let state = self.state.lock_recover();
        MonitorReport {
            aggregates: state
                .series
                .iter()
                .map(|(kind, series)| (kind.to_string(), series.aggregate()))
                .collect(),
            last_fps: state.last_fps,
            last_memory_bytes: state.last_memory,
            samples_taken: state.samples_taken,
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
        }
    }

    fn emit(&self, event: MonitorEvent) {
        log::warn!("[ResourceMonitor] {}", event);
        self.events_emitted.fetch_add(1, Ordering::Relaxed);

        // Listeners run outside the lock so they may (un)register listeners.
        let listeners: Vec<Listener> = self
            .listeners
            .lock_recover()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&event);
        }
        self.bus.publish(event);
    }
}

fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

fn suggestion(area: SuggestionArea, message: String) -> MonitorEvent {
    MonitorEvent::OptimizationSuggestion(OptimizationSuggestion { area, message })
}
