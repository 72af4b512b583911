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

use std::future::{ready, Ready};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ember_cache::SharedCacheStore;
use ember_control::{BehaviorPredictor, NetworkSensor};
use ember_core::{
    BehaviorConfig, CacheConfig, LoadPriority, LoaderConfig, ManualClock, NetworkConfig,
    SharedClock, SystemClock,
};
use ember_loader::{
    CancellationToken, FailureReason, LoadError, LoadFailure, LoadOptions, PreloadOptions,
    ProgressiveLoader, TaskStatus,
};
use tokio::time::sleep;

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn loader_with(config: LoaderConfig, clock: SharedClock) -> ProgressiveLoader<String> {
    loader_with_cache(CacheConfig::default(), config, clock)
}

fn loader_with_cache(
    cache: CacheConfig,
    config: LoaderConfig,
    clock: SharedClock,
) -> ProgressiveLoader<String> {
    let cache = SharedCacheStore::new(cache, clock.clone());
    ProgressiveLoader::new(
        config,
        cache,
        Arc::new(NetworkSensor::new(NetworkConfig::default())),
        Arc::new(BehaviorPredictor::new(BehaviorConfig::default(), clock)),
    )
}

fn loader(retry_count: u32) -> ProgressiveLoader<String> {
    let config = LoaderConfig {
        retry_count,
        retry_delay: ms(10),
        ..LoaderConfig::default()
    };
    loader_with(config, SystemClock::shared())
}

fn counted(
    calls: &Arc<AtomicUsize>,
    value: &'static str,
) -> impl Fn(CancellationToken) -> Ready<Result<String, LoadFailure>> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        ready(Ok(value.to_owned()))
    }
}

fn item(
    value: &'static str,
    fail: bool,
) -> impl Fn(CancellationToken) -> Ready<Result<String, LoadFailure>> + Send + Sync + 'static {
    move |_| {
        ready(if fail {
            Err(LoadFailure::aborted(format!("{value} is broken")))
        } else {
            Ok(value.to_owned())
        })
    }
}

/// Records its id in `order` once admitted, then holds its slot for `hold`.
fn tracked(
    order: &Arc<Mutex<Vec<&'static str>>>,
    id: &'static str,
    hold: Duration,
) -> impl Fn(
    CancellationToken,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String, LoadFailure>> + Send>>
       + Send
       + Sync
       + 'static {
    let order = Arc::clone(order);
    move |_| {
        order.lock().unwrap().push(id);
        Box::pin(async move {
            sleep(hold).await;
            Ok::<_, LoadFailure>(id.to_owned())
        })
    }
}

#[tokio::test(start_paused = true)]
async fn cache_hit_within_ttl_skips_the_operation() {
    let clock = ManualClock::new();
    let loader = loader_with(LoaderConfig::default(), Arc::new(clock.clone()));
    let first_calls = Arc::new(AtomicUsize::new(0));
    let second_calls = Arc::new(AtomicUsize::new(0));
    let options = LoadOptions::default().with_ttl(ms(100));

    let first = loader
        .load("x", counted(&first_calls, "first"), options.clone())
        .await
        .unwrap();
    assert_eq!(*first, "first");

    clock.advance(ms(50));
    let second = loader
        .load("x", counted(&second_calls, "second"), options.clone())
        .await
        .unwrap();
    assert_eq!(*second, "first");
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);

    clock.advance(ms(60));
    let third = loader
        .load("x", counted(&second_calls, "second"), options)
        .await
        .unwrap();
    assert_eq!(*third, "second");
    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);

    let stats = loader.stats();
    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.successful_requests, 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_loads_share_one_execution() {
    let loader = loader(0);
    let calls = Arc::new(AtomicUsize::new(0));
    let operation = {
        let calls = Arc::clone(&calls);
        move |_: CancellationToken| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                sleep(ms(50)).await;
                Ok::<_, LoadFailure>("y".to_owned())
            }
        }
    };

    let (a, b) = tokio::join!(
        loader.load("y", operation.clone(), LoadOptions::default()),
        loader.load("y", operation, LoadOptions::default()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(loader.stats().deduplicated_requests, 1);
}

#[tokio::test(start_paused = true)]
async fn always_failing_task_runs_retry_count_plus_one_times() {
    let loader = loader(2);
    let calls = Arc::new(AtomicUsize::new(0));
    let operation = {
        let calls = Arc::clone(&calls);
        move |_: CancellationToken| {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(Err::<String, _>(LoadFailure::network("connection reset")))
        }
    };

    let error = loader
        .load("flaky", operation, LoadOptions::default())
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        error,
        LoadError::MaxRetriesExceeded {
            id: "flaky".into(),
            attempts: 3,
            last_reason: FailureReason::Network,
            message: "connection reset".into(),
        }
    );
    assert_eq!(loader.task_status("flaky"), Some(TaskStatus::Error));
    assert_eq!(loader.task("flaky").map(|task| task.attempt()), Some(3));
    assert_eq!(loader.stats().failed_requests, 1);
}

#[tokio::test(start_paused = true)]
async fn aborted_failures_are_not_retried() {
    let loader = loader(3);
    let error = loader
        .load("gone", item("gone", true), LoadOptions::default())
        .await
        .unwrap_err();

    match error {
        LoadError::Failed {
            reason, attempt, ..
        } => {
            assert_eq!(reason, FailureReason::Aborted);
            assert_eq!(attempt, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn maximal_retry_count_does_not_overflow() {
    let loader = loader(u32::MAX);
    let error = loader
        .load("edge", item("edge", true), LoadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(error, LoadError::Failed { attempt: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn panicking_operation_fails_without_blocking_its_id() {
    let loader = loader(2);
    let error = loader
        .load(
            "decoder",
            |_: CancellationToken| -> Ready<Result<String, LoadFailure>> {
                panic!("corrupt header")
            },
            LoadOptions::default(),
        )
        .await
        .unwrap_err();

    match &error {
        LoadError::Failed {
            reason, attempt, ..
        } => {
            assert_eq!(*reason, FailureReason::Unknown);
            assert_eq!(*attempt, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(loader.task_status("decoder"), Some(TaskStatus::Error));
    assert_eq!(loader.stats().failed_requests, 1);

    let calls = Arc::new(AtomicUsize::new(0));
    let value = loader
        .load("decoder", counted(&calls, "decoded"), LoadOptions::default())
        .await
        .unwrap();
    assert_eq!(*value, "decoded");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(loader.scheduler().queue_status().running, 0);
}

#[tokio::test(start_paused = true)]
async fn evicted_values_are_released() {
    let cache = CacheConfig {
        max_size: 1,
        ..CacheConfig::default()
    };
    let loader = loader_with_cache(cache, LoaderConfig::default(), SystemClock::shared());

    let first = loader
        .load("a", item("a", false), LoadOptions::default())
        .await
        .unwrap();
    let weak = Arc::downgrade(&first);
    drop(first);
    assert!(weak.upgrade().is_some(), "the cache still owns the value");

    loader
        .load("b", item("b", false), LoadOptions::default())
        .await
        .unwrap();

    assert!(!loader.cache().contains("a"));
    assert!(weak.upgrade().is_none());
    assert_eq!(loader.task_status("a"), Some(TaskStatus::Loaded));
}

#[tokio::test(start_paused = true)]
async fn finished_tasks_beyond_the_history_are_forgotten() {
    let config = LoaderConfig {
        task_history: 2,
        ..LoaderConfig::default()
    };
    let loader = loader_with(config, SystemClock::shared());
    for id in ["one", "two", "three"] {
        loader
            .load(id, item(id, false), LoadOptions::default().without_cache())
            .await
            .unwrap();
    }

    assert_eq!(loader.task_status("one"), None);
    assert_eq!(loader.task_status("two"), Some(TaskStatus::Loaded));
    assert_eq!(loader.task_status("three"), Some(TaskStatus::Loaded));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_recover_on_retry() {
    let loader = loader(2);
    let calls = Arc::new(AtomicUsize::new(0));
    let operation = {
        let calls = Arc::clone(&calls);
        move |_: CancellationToken| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            ready(if attempt < 3 {
                Err(LoadFailure::timeout("slow"))
            } else {
                Ok(format!("attempt {attempt}"))
            })
        }
    };

    let value = loader
        .load("retry", operation, LoadOptions::default())
        .await
        .unwrap();
    assert_eq!(*value, "attempt 3");
    assert_eq!(loader.task_status("retry"), Some(TaskStatus::Loaded));
}

#[tokio::test(start_paused = true)]
async fn attempts_exceeding_the_timeout_fail_as_timeouts() {
    let loader = loader(0);
    let error = loader
        .load(
            "stuck",
            |_| async {
                sleep(Duration::from_secs(5)).await;
                Ok::<_, LoadFailure>("late".to_owned())
            },
            LoadOptions::default().with_timeout(ms(100)),
        )
        .await
        .unwrap_err();

    assert_eq!(error.reason(), Some(FailureReason::Timeout));
    assert!(matches!(
        error,
        LoadError::MaxRetriesExceeded { attempts: 1, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn higher_priority_is_admitted_first_when_a_slot_frees() {
    let loader = loader(0);
    loader.scheduler().set_max_concurrent(1);
    let order = Arc::new(Mutex::new(Vec::new()));

    let spawn = |id: &'static str, priority: LoadPriority| {
        let loader = loader.clone();
        let operation = tracked(&order, id, ms(20));
        tokio::spawn(async move {
            loader
                .load(id, operation, LoadOptions::default().with_priority(priority))
                .await
        })
    };

    let blocker = spawn("blocker", LoadPriority::Normal);
    sleep(ms(1)).await;
    let low = spawn("low", LoadPriority::Low);
    let high = spawn("high", LoadPriority::High);
    sleep(ms(1)).await;
    assert_eq!(loader.scheduler().queue_status().total_queued(), 2);

    for handle in [blocker, low, high] {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec!["blocker", "high", "low"]);
}

#[tokio::test(start_paused = true)]
async fn running_loads_never_exceed_the_cap() {
    let loader = loader(0);
    loader.scheduler().set_max_concurrent(2);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let loader = loader.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let operation = move |_: CancellationToken| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(ms(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, LoadFailure>(format!("item {i}"))
                }
            };
            tokio::spawn(async move {
                loader
                    .load(format!("item-{i}"), operation, LoadOptions::default())
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn hiding_cancels_queued_low_priority_loads() {
    let loader = loader(0);
    loader.scheduler().set_max_concurrent(1);
    let order = Arc::new(Mutex::new(Vec::new()));

    let blocker = {
        let loader = loader.clone();
        let operation = tracked(&order, "blocker", ms(50));
        tokio::spawn(async move { loader.load("blocker", operation, LoadOptions::default()).await })
    };
    sleep(ms(1)).await;
    let low = {
        let loader = loader.clone();
        let operation = tracked(&order, "low", ms(10));
        tokio::spawn(async move {
            loader
                .load(
                    "low",
                    operation,
                    LoadOptions::default().with_priority(LoadPriority::Low),
                )
                .await
        })
    };
    sleep(ms(1)).await;

    loader.set_visible(false);
    assert!(!loader.is_visible());

    let low = low.await.unwrap();
    assert!(matches!(low, Err(LoadError::Cancelled { ref id }) if id == "low"));
    assert_eq!(*blocker.await.unwrap().unwrap(), "blocker");
    assert_eq!(*order.lock().unwrap(), vec!["blocker"]);
    assert_eq!(loader.task_status("low"), Some(TaskStatus::Cancelled));
    assert_eq!(loader.stats().cancelled_requests, 1);
}

#[tokio::test(start_paused = true)]
async fn hiding_discards_the_result_of_a_running_low_priority_load() {
    let loader = loader(0);
    let handle = {
        let loader = loader.clone();
        tokio::spawn(async move {
            loader
                .load(
                    "background",
                    |_| async {
                        sleep(ms(100)).await;
                        Ok::<_, LoadFailure>("ignored".to_owned())
                    },
                    LoadOptions::default().with_priority(LoadPriority::Background),
                )
                .await
        })
    };
    sleep(ms(10)).await;
    assert_eq!(loader.task_status("background"), Some(TaskStatus::Loading));

    loader.set_visible(false);
    assert!(handle.await.unwrap().unwrap_err().is_cancelled());
    assert!(!loader.cache().contains("background"));

    loader.set_visible(true);
    let value = loader
        .load(
            "background",
            item("fresh", false),
            LoadOptions::default().with_priority(LoadPriority::Background),
        )
        .await
        .unwrap();
    assert_eq!(*value, "fresh");
}

#[tokio::test(start_paused = true)]
async fn urgent_loads_run_while_hidden() {
    let loader = loader(0);
    loader.set_visible(false);

    let value = tokio::time::timeout(
        Duration::from_secs(3600),
        loader.load(
            "urgent",
            item("urgent", false),
            LoadOptions::default().with_priority(LoadPriority::Immediate),
        ),
    )
    .await
    .expect("admitted while hidden")
    .unwrap();

    assert_eq!(*value, "urgent");
    assert!(!loader.scheduler().is_paused());
}

#[tokio::test(start_paused = true)]
async fn cooperative_operations_observe_cancel() {
    let loader = loader(0);
    let handle = {
        let loader = loader.clone();
        tokio::spawn(async move {
            loader
                .load(
                    "watching",
                    |token: CancellationToken| async move {
                        tokio::select! {
                            _ = sleep(Duration::from_secs(60)) => Ok("done".to_owned()),
                            _ = token.cancelled() => Err(LoadFailure::aborted("stopped")),
                        }
                    },
                    LoadOptions::default(),
                )
                .await
        })
    };
    sleep(ms(5)).await;

    assert!(loader.cancel("watching"));
    assert!(!loader.cancel("watching"));
    assert!(handle.await.unwrap().unwrap_err().is_cancelled());
    assert!(!loader.cancel("unknown"));
}

#[tokio::test(start_paused = true)]
async fn failed_dependency_fails_the_dependent() {
    let loader = loader(0);
    let dependency = {
        let loader = loader.clone();
        tokio::spawn(async move {
            loader
                .load(
                    "base",
                    |_| async {
                        sleep(ms(20)).await;
                        Err::<String, _>(LoadFailure::aborted("missing asset"))
                    },
                    LoadOptions::default(),
                )
                .await
        })
    };
    sleep(ms(1)).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let error = loader
        .load(
            "derived",
            counted(&calls, "derived"),
            LoadOptions::default().with_dependencies(["base"]),
        )
        .await
        .unwrap_err();

    assert!(dependency.await.unwrap().is_err());
    match error {
        LoadError::DependencyFailed {
            id, dependency, ..
        } => {
            assert_eq!(id, "derived");
            assert_eq!(dependency, "base");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn dependents_start_after_their_dependencies_finish() {
    let loader = loader(0);
    let order = Arc::new(Mutex::new(Vec::new()));
    let base = {
        let loader = loader.clone();
        let operation = tracked(&order, "base", ms(30));
        tokio::spawn(async move { loader.load("base", operation, LoadOptions::default()).await })
    };
    sleep(ms(1)).await;

    let derived = loader
        .load(
            "derived",
            tracked(&order, "derived", ms(1)),
            LoadOptions::default().with_dependencies(["base", "never-submitted"]),
        )
        .await
        .unwrap();

    assert_eq!(*derived, "derived");
    assert!(base.await.unwrap().is_ok());
    assert_eq!(*order.lock().unwrap(), vec!["base", "derived"]);
}

#[tokio::test(start_paused = true)]
async fn preload_keeps_input_order_through_failures() {
    let loader = loader(0);
    let items = vec![
        ("a".to_owned(), item("a", false)),
        ("b".to_owned(), item("b", true)),
        ("c".to_owned(), item("c", false)),
    ];
    let options = PreloadOptions {
        batch_size: Some(2),
        use_intelligent_priority: true,
        ..PreloadOptions::default()
    };

    let results = loader.preload(items, options).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_deref().ok().map(String::as_str), Some("a"));
    assert_eq!(results[1].as_ref().unwrap_err().id(), "b");
    assert_eq!(results[2].as_deref().ok().map(String::as_str), Some("c"));
    assert_eq!(loader.task("a").map(|task| task.priority()), Some(LoadPriority::High));
    assert_eq!(loader.task("c").map(|task| task.priority()), Some(LoadPriority::Low));
}

#[tokio::test(start_paused = true)]
async fn predicted_preload_waits_for_a_confident_prediction() {
    let loader = loader(0);
    let items = || vec![("icon".to_owned(), item("icon", false))];

    assert!(loader
        .preload_if_predicted(items(), PreloadOptions::default())
        .await
        .is_none());

    loader.record_interaction("settings");
    let results = loader
        .preload_if_predicted(items(), PreloadOptions::default())
        .await
        .expect("a single interaction is a confident prediction");
    assert!(results[0].is_ok());
    assert_eq!(loader.stats().behavior_predictions.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cache_can_be_bypassed() {
    let loader = loader(0);
    let calls = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        loader
            .load("fresh", counted(&calls, "v"), LoadOptions::default().without_cache())
            .await
            .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(loader.cache().is_empty());

    loader
        .load(
            "keyed",
            counted(&calls, "v"),
            LoadOptions::default().with_cache_key("shared-key"),
        )
        .await
        .unwrap();
    assert!(loader.cache().contains("shared-key"));
    assert_eq!(loader.clear_finished(), 2);
}
