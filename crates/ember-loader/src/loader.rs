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

//! The progressive loader: cache-then-network loads with single flight,
//! dependencies, bounded retries, cooperative cancellation and preloading.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ember_cache::{CacheStats, SharedCacheStore};
use ember_control::{BehaviorPredictor, NetworkInfo, NetworkSensor, NetworkStats, Prediction};
use ember_core::config::duration_ms;
use ember_core::sync::MutexExt;
use ember_core::{CachePriority, LoadPriority, LoaderConfig};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::cancel::CancellationToken;
use crate::error::{FailureReason, LoadError, LoadFailure};
use crate::scheduler::{QueueStatus, Scheduler};
use crate::task::{LoadTask, TaskStatus};

/// What every waiter on one task eventually receives.
pub type LoadResult<V> = Result<Arc<V>, LoadError>;

/// Per-call scheduling and cache policy.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Scheduling tier.
    pub priority: LoadPriority,
    /// Task identifiers that must finish successfully first.
    pub dependencies: Vec<String>,
    /// Read from and write to the cache.
    pub use_cache: bool,
    /// Cache key; the task identifier when `None`.
    pub cache_key: Option<String>,
    /// Cache TTL; the cache's default TTL when `None`.
    pub ttl: Option<Duration>,
    /// Cache priority of the stored value.
    pub cache_priority: CachePriority,
    /// Per-attempt time limit. An attempt that exceeds it fails with
    /// [`FailureReason::Timeout`].
    pub timeout: Option<Duration>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            priority: LoadPriority::Normal,
            dependencies: Vec::new(),
            use_cache: true,
            cache_key: None,
            ttl: None,
            cache_priority: CachePriority::Medium,
            timeout: None,
        }
    }
}

impl LoadOptions {
    /// Sets the scheduling tier.
    pub fn with_priority(mut self, priority: LoadPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Adds dependencies.
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Bypasses the cache for both lookup and storage.
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Stores and looks up the value under `key`.
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// Sets the cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the cache priority.
    pub fn with_cache_priority(mut self, priority: CachePriority) -> Self {
        self.cache_priority = priority;
        self
    }

    /// Bounds every attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Policy for a [`ProgressiveLoader::preload`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct PreloadOptions {
    /// Static tier for every item. Falls back to the configured preload
    /// priority.
    pub priority: Option<LoadPriority>,
    /// Items started together. Falls back to the network sensor's hint.
    pub batch_size: Option<usize>,
    /// Derive each item's tier from its position instead.
    pub use_intelligent_priority: bool,
    /// Read from and write to the cache.
    pub use_cache: bool,
    /// Cache TTL for every item.
    pub ttl: Option<Duration>,
}

impl Default for PreloadOptions {
    fn default() -> Self {
        Self {
            priority: None,
            batch_size: None,
            use_intelligent_priority: false,
            use_cache: true,
            ttl: None,
        }
    }
}

const POSITIONAL_TIERS: [LoadPriority; 4] = [
    LoadPriority::High,
    LoadPriority::Normal,
    LoadPriority::Low,
    LoadPriority::Background,
];

/// Tier for the item at `index` of `total`: earlier items land in more
/// urgent tiers, and a degraded network pushes everything one tier down.
pub fn positional_priority(index: usize, total: usize, degraded: bool) -> LoadPriority {
    let slot = (index * POSITIONAL_TIERS.len() / total.max(1)).min(POSITIONAL_TIERS.len() - 1);
    let priority = POSITIONAL_TIERS[slot];
    if degraded {
        priority.demoted()
    } else {
        priority
    }
}

/// Snapshot of the loader.
///
/// `successful_requests`, `failed_requests` and `cancelled_requests` count
/// executed tasks; cache hits and joined waiters are counted separately.
#[derive(Debug, Clone, Serialize)]
pub struct LoaderStats {
    /// Every `load` call, including those served by the cache.
    pub total_requests: u64,
    /// Tasks that produced a value.
    pub successful_requests: u64,
    /// Tasks that ended with an error other than cancellation.
    pub failed_requests: u64,
    /// Tasks that were cancelled.
    pub cancelled_requests: u64,
    /// Calls answered from the cache.
    pub cache_hits: u64,
    /// Calls that joined an in-flight task.
    pub deduplicated_requests: u64,
    /// Mean duration of successful tasks, dependencies and retries included.
    #[serde(with = "duration_ms")]
    pub average_load_time: Duration,
    /// Scheduler queues.
    pub queue_status: QueueStatus,
    /// Network sensor.
    pub network: NetworkStats,
    /// Current behavior predictions.
    pub behavior_predictions: Vec<Prediction>,
    /// Cache store.
    pub cache: CacheStats,
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    cancelled_requests: u64,
    cache_hits: u64,
    deduplicated_requests: u64,
    total_load_time: Duration,
}

struct TaskEntry<V> {
    task: LoadTask,
    // Dropped once the task settles so the cache alone owns the value.
    result: Option<watch::Receiver<Option<LoadResult<V>>>>,
}

struct Job<F> {
    id: String,
    generation: u64,
    token: CancellationToken,
    operation: F,
    options: LoadOptions,
    cache_key: String,
}

struct LoaderInner<V> {
    config: LoaderConfig,
    cache: SharedCacheStore<String, V>,
    scheduler: Scheduler,
    network: Arc<NetworkSensor>,
    behavior: Arc<BehaviorPredictor>,
    tasks: Mutex<HashMap<String, TaskEntry<V>>>,
    counters: Mutex<Counters>,
    visible: AtomicBool,
    next_generation: AtomicU64,
}

/// Loads resources through the cache, the scheduler and the network hints.
///
/// Cheap to clone; clones share every piece of state. Loads run as tokio
/// tasks, so a runtime must be active.
pub struct ProgressiveLoader<V> {
    inner: Arc<LoaderInner<V>>,
}

impl<V> Clone for ProgressiveLoader<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> std::fmt::Debug for ProgressiveLoader<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressiveLoader")
            .field("config", &self.inner.config)
            .field("scheduler", &self.inner.scheduler)
            .field("visible", &self.inner.visible.load(Ordering::Relaxed))
            .finish()
    }
}

impl<V> ProgressiveLoader<V>
where
    V: Send + Sync + 'static,
{
    /// Creates a loader whose concurrency follows the network sensor.
    pub fn new(
        config: LoaderConfig,
        cache: SharedCacheStore<String, V>,
        network: Arc<NetworkSensor>,
        behavior: Arc<BehaviorPredictor>,
    ) -> Self {
        let scheduler = Scheduler::new(network.optimal_concurrency());
        Self {
            inner: Arc::new(LoaderInner {
                config,
                cache,
                scheduler,
                network,
                behavior,
                tasks: Mutex::new(HashMap::new()),
                counters: Mutex::new(Counters::default()),
                visible: AtomicBool::new(true),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Loads `id`, running `operation` only on a cache miss with no
    /// identical load in flight.
    ///
    /// The operation receives the task's [`CancellationToken`] and may be
    /// invoked several times when attempts fail. A successful value is
    /// handed to the cache under `options.cache_key` (default `id`); the
    /// loader keeps no reference to it afterwards.
    ///
    /// ## Arguments
    /// * `id` - Task identifier, also the de-duplication key.
    /// * `operation` - Produces the value; called once per attempt.
    /// * `options` - Priority, dependencies and cache policy.
    ///
    /// ## Returns
    /// The shared value, or the [`LoadError`] every waiter on this task
    /// receives. An operation that panics fails the task with
    /// [`FailureReason::Unknown`] instead of poisoning `id`.
    pub async fn load<F, Fut>(
        &self,
        id: impl Into<String>,
        operation: F,
        options: LoadOptions,
    ) -> LoadResult<V>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, LoadFailure>> + Send + 'static,
    {
        let id = id.into();
        self.inner.counters.lock_recover().total_requests += 1;

        let cache_key = options.cache_key.clone().unwrap_or_else(|| id.clone());
        if options.use_cache {
            if let Some(value) = self.inner.cache.get(&cache_key) {
                self.inner.counters.lock_recover().cache_hits += 1;
                log::trace!("Cache hit for '{}'.", id);
                return Ok(value);
            }
        }

        let (mut receiver, joined) = {
            let mut tasks = self.inner.tasks.lock_recover();
            let in_flight = tasks
                .get(&id)
                .filter(|entry| !entry.task.is_finished())
                .and_then(|entry| entry.result.as_ref())
                .filter(|result| result.has_changed().is_ok())
                .cloned();
            match in_flight {
                Some(result) => (result, true),
                None => {
                    let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                    let task = LoadTask::new(
                        id.clone(),
                        generation,
                        options.priority,
                        options.dependencies.clone(),
                    );
                    let (sender, receiver) = watch::channel(None);
                    let job = Job {
                        id: id.clone(),
                        generation,
                        token: task.token().clone(),
                        operation,
                        options,
                        cache_key,
                    };
                    tasks.insert(
                        id.clone(),
                        TaskEntry {
                            task,
                            result: Some(receiver.clone()),
                        },
                    );
                    tokio::spawn(Arc::clone(&self.inner).drive(job, sender));
                    (receiver, false)
                }
            }
        };
        if joined {
            self.inner.counters.lock_recover().deduplicated_requests += 1;
            log::trace!("Joined in-flight load of '{}'.", id);
        }

        settled(&mut receiver)
            .await
            .unwrap_or_else(|| Err(LoadError::cancelled(&id)))
    }

    /// Loads every item in batches and returns one result per item, in
    /// input order. A failing item never stops the others.
    pub async fn preload<F, Fut>(
        &self,
        items: Vec<(String, F)>,
        options: PreloadOptions,
    ) -> Vec<LoadResult<V>>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, LoadFailure>> + Send + 'static,
    {
        let total = items.len();
        let batch_size = options
            .batch_size
            .unwrap_or_else(|| self.inner.network.optimal_batch_size())
            .max(1);
        let degraded = self.inner.network.should_reduce_quality();
        log::debug!(
            "Preloading {} item(s) in batches of {}.",
            total,
            batch_size
        );

        let mut results = Vec::with_capacity(total);
        let mut items = items.into_iter().enumerate().peekable();
        while items.peek().is_some() {
            let mut batch = Vec::with_capacity(batch_size);
            for (index, (id, operation)) in items.by_ref().take(batch_size) {
                let priority = if options.use_intelligent_priority {
                    positional_priority(index, total, degraded)
                } else {
                    options.priority.unwrap_or(self.inner.config.preload_priority)
                };
                let load_options = LoadOptions {
                    priority,
                    use_cache: options.use_cache,
                    ttl: options.ttl,
                    ..LoadOptions::default()
                };
                let loader = self.clone();
                let handle = {
                    let id = id.clone();
                    tokio::spawn(async move { loader.load(id, operation, load_options).await })
                };
                batch.push((id, handle));
            }
            for (id, handle) in batch {
                results.push(match handle.await {
                    Ok(result) => result,
                    Err(_) => Err(LoadError::cancelled(&id)),
                });
            }
        }
        results
    }

    /// Runs [`preload`](Self::preload) only when the behavior predictor is
    /// confident enough. Returns `None` when nothing was started.
    pub async fn preload_if_predicted<F, Fut>(
        &self,
        items: Vec<(String, F)>,
        options: PreloadOptions,
    ) -> Option<Vec<LoadResult<V>>>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, LoadFailure>> + Send + 'static,
    {
        if !self.inner.behavior.should_preload_based_on_behavior() {
            log::debug!("Skipping preload of {} item(s): no confident prediction.", items.len());
            return None;
        }
        Some(self.preload(items, options).await)
    }

    /// Hiding cancels every unfinished task at [`LoadPriority::Low`] or
    /// below, queued or running. Higher tiers keep being admitted. Showing
    /// re-runs scheduling; cancelled tasks are not resubmitted.
    pub fn set_visible(&self, visible: bool) {
        if self.inner.visible.swap(visible, Ordering::SeqCst) == visible {
            return;
        }
        let scheduler = &self.inner.scheduler;
        if visible {
            scheduler.schedule_execution();
            log::info!("Loader visible, scheduling re-run.");
            return;
        }

        let dequeued = scheduler.cancel_where(|_, priority| priority.is_deferrable());
        let tokens: Vec<CancellationToken> = self
            .inner
            .tasks
            .lock_recover()
            .values()
            .filter(|entry| !entry.task.is_finished() && entry.task.priority().is_deferrable())
            .map(|entry| entry.task.token().clone())
            .collect();
        for token in &tokens {
            token.cancel();
        }
        log::info!(
            "Loader hidden: {} deferrable task(s) cancelled ({} dequeued).",
            tokens.len(),
            dequeued
        );
    }

    /// Returns `false` while hidden.
    pub fn is_visible(&self) -> bool {
        self.inner.visible.load(Ordering::SeqCst)
    }

    /// Cancels an unfinished task. Returns `false` if there is none.
    pub fn cancel(&self, id: &str) -> bool {
        let token = self
            .inner
            .tasks
            .lock_recover()
            .get(id)
            .filter(|entry| !entry.task.is_finished())
            .map(|entry| entry.task.token().clone());
        match token {
            Some(token) => {
                self.inner.scheduler.cancel_where(|queued, _| queued == id);
                token.cancel()
            }
            None => false,
        }
    }

    /// Status of the latest task with this identifier.
    pub fn task_status(&self, id: &str) -> Option<TaskStatus> {
        self.inner
            .tasks
            .lock_recover()
            .get(id)
            .map(|entry| entry.task.status())
    }

    /// Copy of the latest task with this identifier.
    pub fn task(&self, id: &str) -> Option<LoadTask> {
        self.inner
            .tasks
            .lock_recover()
            .get(id)
            .map(|entry| entry.task.clone())
    }

    /// Forgets finished tasks. Returns how many were dropped.
    ///
    /// Finished tasks are also forgotten automatically, oldest first, beyond
    /// [`LoaderConfig::task_history`].
    pub fn clear_finished(&self) -> usize {
        let mut tasks = self.inner.tasks.lock_recover();
        let before = tasks.len();
        tasks.retain(|_, entry| !entry.task.is_finished());
        before - tasks.len()
    }

    /// Feeds a connection report and re-derives the concurrency cap.
    pub fn update_network(&self, info: NetworkInfo) {
        self.inner.network.update(info);
        self.inner
            .scheduler
            .set_max_concurrent(self.inner.network.optimal_concurrency());
    }

    /// Records a scroll position.
    pub fn record_scroll(&self, position: f64) {
        self.inner.behavior.record_scroll(position);
    }

    /// Records an interaction.
    pub fn record_interaction(&self, target: impl Into<String>) {
        self.inner.behavior.record_interaction(target);
    }

    /// The cache loads are served from.
    pub fn cache(&self) -> &SharedCacheStore<String, V> {
        &self.inner.cache
    }

    /// The scheduler every attempt goes through.
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// The network sensor.
    pub fn network(&self) -> &Arc<NetworkSensor> {
        &self.inner.network
    }

    /// The behavior predictor.
    pub fn behavior(&self) -> &Arc<BehaviorPredictor> {
        &self.inner.behavior
    }

    /// Snapshot of counters and collaborators.
    pub fn stats(&self) -> LoaderStats {
        let counters = self.inner.counters.lock_recover();
        let average_load_time = match u32::try_from(counters.successful_requests) {
            Ok(0) => Duration::ZERO,
            Ok(count) => counters.total_load_time / count,
            Err(_) => Duration::from_secs_f64(
                counters.total_load_time.as_secs_f64() / counters.successful_requests as f64,
            ),
        };
        LoaderStats {
            total_requests: counters.total_requests,
            successful_requests: counters.successful_requests,
            failed_requests: counters.failed_requests,
            cancelled_requests: counters.cancelled_requests,
            cache_hits: counters.cache_hits,
            deduplicated_requests: counters.deduplicated_requests,
            average_load_time,
            queue_status: self.inner.scheduler.queue_status(),
            network: self.inner.network.stats(),
            behavior_predictions: self.inner.behavior.predictions(),
            cache: self.inner.cache.stats(),
        }
    }
}

impl<V> LoaderInner<V>
where
    V: Send + Sync + 'static,
{
    async fn drive<F, Fut>(self: Arc<Self>, job: Job<F>, sender: watch::Sender<Option<LoadResult<V>>>)
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, LoadFailure>> + Send + 'static,
    {
        let id = job.id.clone();
        let generation = job.generation;
        let started_at = Instant::now();
        // The attempts run in their own task so a panicking operation still
        // settles the task here.
        let outcome = match tokio::spawn(Arc::clone(&self).run(job)).await {
            Ok(outcome) => outcome,
            Err(error) if error.is_panic() => Err(LoadError::Failed {
                id: id.clone(),
                reason: FailureReason::Unknown,
                attempt: self.attempts_of(&id, generation),
                message: "operation panicked".into(),
            }),
            Err(_) => Err(LoadError::cancelled(&id)),
        };
        let elapsed = started_at.elapsed();

        self.settle(&id, generation, &outcome);
        {
            let mut counters = self.counters.lock_recover();
            match &outcome {
                Ok(_) => {
                    counters.successful_requests += 1;
                    counters.total_load_time += elapsed;
                }
                Err(error) if error.is_cancelled() => counters.cancelled_requests += 1,
                Err(_) => counters.failed_requests += 1,
            }
        }
        match &outcome {
            Ok(_) => log::debug!("Loaded '{}' in {:?}.", id, elapsed),
            Err(error) if error.is_cancelled() => log::debug!("{}", error),
            Err(error) => log::warn!("{}", error),
        }

        sender.send_replace(Some(outcome));
    }

    async fn run<F, Fut>(self: Arc<Self>, job: Job<F>) -> LoadResult<V>
    where
        F: Fn(CancellationToken) -> Fut,
        Fut: Future<Output = Result<V, LoadFailure>>,
    {
        let outcome = self.execute(&job).await;
        if let Ok(value) = &outcome {
            if job.options.use_cache {
                let ttl = job
                    .options
                    .ttl
                    .unwrap_or_else(|| self.cache.with_store(|store| store.config().default_ttl));
                self.cache.set_shared(
                    job.cache_key.clone(),
                    Arc::clone(value),
                    job.options.cache_priority,
                    ttl,
                );
            }
        }
        outcome
    }

    async fn execute<F, Fut>(&self, job: &Job<F>) -> LoadResult<V>
    where
        F: Fn(CancellationToken) -> Fut,
        Fut: Future<Output = Result<V, LoadFailure>>,
    {
        self.await_dependencies(job).await?;

        let max_attempts = self.config.retry_count.saturating_add(1);
        let mut last_failure = LoadFailure::new(FailureReason::Unknown, "no attempt ran");
        for attempt in 1..=max_attempts {
            if job.token.is_cancelled() {
                return Err(LoadError::cancelled(&job.id));
            }

            let request = self.scheduler.add_task(&job.id, job.options.priority);
            let slot = tokio::select! {
                slot = request.admitted() => slot,
                _ = job.token.cancelled() => None,
            };
            let Some(slot) = slot else {
                return Err(LoadError::cancelled(&job.id));
            };

            self.update_task(&job.id, job.generation, LoadTask::begin_attempt);
            let attempt_future = (job.operation)(job.token.clone());
            let outcome = match job.options.timeout {
                Some(limit) => match tokio::time::timeout(limit, attempt_future).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(LoadFailure::timeout(format!("no result within {limit:?}"))),
                },
                None => attempt_future.await,
            };
            drop(slot);

            // A cancelled task discards whatever the operation produced.
            if job.token.is_cancelled() {
                return Err(LoadError::cancelled(&job.id));
            }

            let failure = match outcome {
                Ok(value) => return Ok(Arc::new(value)),
                Err(failure) => failure,
            };
            self.update_task(&job.id, job.generation, LoadTask::attempt_failed);

            if !failure.reason.is_retryable() {
                return Err(LoadError::Failed {
                    id: job.id.clone(),
                    reason: failure.reason,
                    attempt,
                    message: failure.message,
                });
            }

            if attempt < max_attempts {
                log::warn!(
                    "Attempt {}/{} of '{}' failed ({}), retrying in {:?}.",
                    attempt,
                    max_attempts,
                    job.id,
                    failure,
                    self.config.retry_delay
                );
                self.update_task(&job.id, job.generation, LoadTask::await_retry);
                tokio::select! {
                    _ = tokio::time::sleep(self.config.retry_delay) => {}
                    _ = job.token.cancelled() => return Err(LoadError::cancelled(&job.id)),
                }
            }
            last_failure = failure;
        }

        Err(LoadError::MaxRetriesExceeded {
            id: job.id.clone(),
            attempts: max_attempts,
            last_reason: last_failure.reason,
            message: last_failure.message,
        })
    }

    /// Waits for every known, unfinished dependency. Unknown identifiers and
    /// finished successes count as satisfied.
    async fn await_dependencies<F>(&self, job: &Job<F>) -> Result<(), LoadError> {
        for dependency in &job.options.dependencies {
            if *dependency == job.id {
                continue;
            }
            let pending = {
                let tasks = self.tasks.lock_recover();
                match tasks.get(dependency) {
                    None => None,
                    Some(entry) if entry.task.is_finished() => match entry.task.error() {
                        Some(error) => return Err(dependency_failed(job, dependency, error.clone())),
                        None => None,
                    },
                    Some(entry) => entry.result.clone(),
                }
            };
            let Some(mut receiver) = pending else {
                continue;
            };

            log::trace!("'{}' waiting for dependency '{}'.", job.id, dependency);
            let outcome = tokio::select! {
                outcome = settled(&mut receiver) => outcome,
                _ = job.token.cancelled() => return Err(LoadError::cancelled(&job.id)),
            };
            match outcome {
                Some(Ok(_)) => {}
                Some(Err(error)) => return Err(dependency_failed(job, dependency, error)),
                None => {
                    return Err(dependency_failed(
                        job,
                        dependency,
                        LoadError::cancelled(dependency),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Marks the task finished, releases its result and forgets the oldest
    /// finished tasks beyond the configured history.
    fn settle(&self, id: &str, generation: u64, outcome: &LoadResult<V>) {
        let mut tasks = self.tasks.lock_recover();
        if let Some(entry) = tasks.get_mut(id) {
            if entry.task.generation() == generation {
                entry.task.finish(outcome.as_ref().map(|_| ()));
                entry.result = None;
            }
        }

        let mut finished: Vec<(u64, String)> = tasks
            .values()
            .filter(|entry| entry.task.is_finished())
            .map(|entry| (entry.task.generation(), entry.task.id().to_owned()))
            .collect();
        let excess = finished.len().saturating_sub(self.config.task_history);
        if excess > 0 {
            finished.sort_unstable();
            for (_, stale) in finished.into_iter().take(excess) {
                tasks.remove(&stale);
            }
            log::trace!("Forgot {} finished task(s).", excess);
        }
    }

    fn attempts_of(&self, id: &str, generation: u64) -> u32 {
        self.tasks
            .lock_recover()
            .get(id)
            .filter(|entry| entry.task.generation() == generation)
            .map_or(0, |entry| entry.task.attempt())
    }

    fn update_task(&self, id: &str, generation: u64, update: impl FnOnce(&mut LoadTask)) {
        let mut tasks = self.tasks.lock_recover();
        if let Some(entry) = tasks.get_mut(id) {
            if entry.task.generation() == generation {
                update(&mut entry.task);
            }
        }
    }
}

fn dependency_failed<F>(job: &Job<F>, dependency: &str, source: LoadError) -> LoadError {
    LoadError::DependencyFailed {
        id: job.id.clone(),
        dependency: dependency.to_owned(),
        source: Box::new(source),
    }
}

/// Waits for a task's result. `None` if the driver went away without one.
async fn settled<V>(receiver: &mut watch::Receiver<Option<LoadResult<V>>>) -> Option<LoadResult<V>> {
    match receiver.wait_for(Option::is_some).await {
        Ok(result) => (*result).clone(),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_priority_spreads_across_tiers() {
        let tiers: Vec<_> = (0..8).map(|i| positional_priority(i, 8, false)).collect();
        assert_eq!(
            tiers,
            vec![
                LoadPriority::High,
                LoadPriority::High,
                LoadPriority::Normal,
                LoadPriority::Normal,
                LoadPriority::Low,
                LoadPriority::Low,
                LoadPriority::Background,
                LoadPriority::Background,
            ]
        );
    }

    #[test]
    fn degraded_network_demotes_one_tier() {
        assert_eq!(positional_priority(0, 4, true), LoadPriority::Normal);
        assert_eq!(positional_priority(3, 4, true), LoadPriority::Background);
        assert_eq!(positional_priority(0, 1, false), LoadPriority::High);
    }

    #[test]
    fn load_options_builder() {
        let options = LoadOptions::default()
            .with_priority(LoadPriority::Immediate)
            .with_dependencies(["a", "b"])
            .with_cache_key("key")
            .with_ttl(Duration::from_millis(100))
            .with_cache_priority(CachePriority::High)
            .without_cache();
        assert_eq!(options.priority, LoadPriority::Immediate);
        assert_eq!(options.dependencies, vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(options.cache_key.as_deref(), Some("key"));
        assert!(!options.use_cache);
        assert_eq!(options.timeout, None);
    }
}
