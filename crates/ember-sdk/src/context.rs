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

//! The [`ResourceContext`]: one explicitly owned instance of every component.

use std::sync::{Arc, Mutex};

use ember_cache::{CacheStats, PoolRegistry, PoolStats, SharedCacheStore};
use ember_control::{BehaviorPredictor, NetworkSensor};
use ember_core::sync::MutexExt;
use ember_core::{ConfigError, EmberConfig, SharedClock, Stopwatch, SystemClock};
use ember_loader::{LoaderStats, ProgressiveLoader};
use ember_telemetry::{MemoryProbe, MonitorReport, ResourceMonitor, SysinfoMemoryProbe};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Serializable snapshot of a whole context.
#[derive(Debug, Clone, Serialize)]
pub struct ContextReport {
    /// Milliseconds since [`ResourceContext::start`], if running.
    pub uptime_ms: Option<f64>,
    /// Cache store counters.
    pub cache: CacheStats,
    /// Every registered pool, by name.
    pub pools: Vec<(String, PoolStats)>,
    /// Monitor aggregates.
    pub monitor: MonitorReport,
    /// Loader counters and collaborators.
    pub loader: LoaderStats,
}

#[derive(Debug, Default)]
struct Background {
    started: Option<Stopwatch>,
    handles: Vec<JoinHandle<()>>,
}

/// Owns the cache, the pools, the monitor, both sensors and the loader,
/// and runs the periodic sampler and sweeper once started.
///
/// Built once and dropped explicitly; dropping it stops the background
/// tasks. `V` is the type of loaded resources.
pub struct ResourceContext<V> {
    config: EmberConfig,
    clock: SharedClock,
    cache: SharedCacheStore<String, V>,
    pools: Arc<PoolRegistry>,
    monitor: Arc<ResourceMonitor>,
    network: Arc<NetworkSensor>,
    behavior: Arc<BehaviorPredictor>,
    loader: ProgressiveLoader<V>,
    background: Mutex<Background>,
}

impl<V> std::fmt::Debug for ResourceContext<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceContext")
            .field("config", &self.config)
            .field("pools", &self.pools)
            .field("monitor", &self.monitor)
            .field("loader", &self.loader)
            .finish_non_exhaustive()
    }
}

impl<V> ResourceContext<V>
where
    V: Send + Sync + 'static,
{
    /// Validates `config` and builds a context on the system clock, reading
    /// process memory through `sysinfo`.
    pub fn new(config: EmberConfig) -> Result<Self, ConfigError> {
        let probe: Arc<dyn MemoryProbe> = Arc::new(SysinfoMemoryProbe::new());
        Self::with_parts(config, SystemClock::shared(), Some(probe))
    }

    /// Builds a context from an explicit clock and memory source.
    pub fn with_parts(
        config: EmberConfig,
        clock: SharedClock,
        probe: Option<Arc<dyn MemoryProbe>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let cache = SharedCacheStore::new(config.cache.clone(), clock.clone());
        let monitor = Arc::new(ResourceMonitor::with_probe(
            config.monitor.clone(),
            clock.clone(),
            probe,
        ));
        let network = Arc::new(NetworkSensor::new(config.network.clone()));
        let behavior = Arc::new(BehaviorPredictor::new(config.behavior.clone(), clock.clone()));
        let loader = ProgressiveLoader::new(
            config.loader.clone(),
            cache.clone(),
            Arc::clone(&network),
            Arc::clone(&behavior),
        );
        log::info!(
            "Resource context created (cache capacity {}, retry count {}).",
            config.cache.max_size,
            config.loader.retry_count
        );

        Ok(Self {
            config,
            clock,
            cache,
            pools: Arc::new(PoolRegistry::new()),
            monitor,
            network,
            behavior,
            loader,
            background: Mutex::new(Background::default()),
        })
    }

    /// Spawns the periodic sampler and the expiry sweeper on the current
    /// tokio runtime. Returns `false` if they were already running.
    pub fn start(&self) -> bool {
        let mut background = self.background.lock_recover();
        if background.started.is_some() {
            log::warn!("Resource context already started.");
            return false;
        }

        let monitor = Arc::clone(&self.monitor);
        let sample_interval = self.config.monitor.sample_interval;
        background.handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(sample_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                monitor.sample_now();
            }
        }));

        let cache = self.cache.clone();
        let sweep_interval = self.config.cache.sweep_interval;
        background.handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let swept = cache.sweep_expired();
                if swept > 0 {
                    log::debug!("Swept {} expired cache entries.", swept);
                }
            }
        }));

        background.started = Some(Stopwatch::new());
        log::info!(
            "Resource context started (sampling every {:?}, sweeping every {:?}).",
            sample_interval,
            sweep_interval
        );
        true
    }

    /// Aborts the background tasks. Returns `false` if nothing was running.
    pub fn stop(&self) -> bool {
        let mut background = self.background.lock_recover();
        let Some(started) = background.started.take() else {
            return false;
        };
        for handle in background.handles.drain(..) {
            handle.abort();
        }
        log::info!(
            "Resource context stopped after {:.1} ms.",
            started.elapsed_ms_f64()
        );
        true
    }

    /// Returns `true` between [`start`](Self::start) and
    /// [`stop`](Self::stop).
    pub fn is_running(&self) -> bool {
        self.background.lock_recover().started.is_some()
    }

    /// The configuration the context was built from.
    pub fn config(&self) -> &EmberConfig {
        &self.config
    }

    /// The clock shared by every component.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// The cache store.
    pub fn cache(&self) -> &SharedCacheStore<String, V> {
        &self.cache
    }

    /// The object pool registry.
    pub fn pools(&self) -> &Arc<PoolRegistry> {
        &self.pools
    }

    /// The resource monitor.
    pub fn monitor(&self) -> &Arc<ResourceMonitor> {
        &self.monitor
    }

    /// The network sensor.
    pub fn network(&self) -> &Arc<NetworkSensor> {
        &self.network
    }

    /// The behavior predictor.
    pub fn behavior(&self) -> &Arc<BehaviorPredictor> {
        &self.behavior
    }

    /// The progressive loader.
    pub fn loader(&self) -> &ProgressiveLoader<V> {
        &self.loader
    }

    /// Snapshot of every component.
    pub fn report(&self) -> ContextReport {
        let uptime_ms = self
            .background
            .lock_recover()
            .started
            .map(|started| started.elapsed_ms_f64());
        ContextReport {
            uptime_ms,
            cache: self.cache.stats(),
            pools: self.pools.all_stats(),
            monitor: self.monitor.report(),
            loader: self.loader.stats(),
        }
    }

    /// [`report`](Self::report) as pretty-printed JSON.
    pub fn report_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.report())
    }
}

impl<V> Drop for ResourceContext<V> {
    fn drop(&mut self) {
        let background = self
            .background
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if background.started.take().is_some() {
            for handle in background.handles.drain(..) {
                handle.abort();
            }
            log::info!("Resource context dropped, background tasks aborted.");
        }
    }
}
