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

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ember_core::LoadPriority;
use ember_loader::Scheduler;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn waiters_are_admitted_in_priority_order_as_slots_free() {
    let scheduler = Scheduler::new(1);
    let admitted = Arc::new(Mutex::new(Vec::new()));

    let holder = scheduler
        .add_task("holder", LoadPriority::Immediate)
        .admitted()
        .await
        .expect("free slot");

    let mut waiters = Vec::new();
    for (id, priority) in [
        ("background", LoadPriority::Background),
        ("normal", LoadPriority::Normal),
        ("immediate", LoadPriority::Immediate),
        ("low", LoadPriority::Low),
    ] {
        let request = scheduler.add_task(id, priority);
        let admitted = Arc::clone(&admitted);
        waiters.push(tokio::spawn(async move {
            let _slot = request.admitted().await.expect("not cancelled");
            admitted.lock().unwrap().push(id);
            sleep(Duration::from_millis(5)).await;
        }));
    }
    assert_eq!(scheduler.queue_status().total_queued(), 4);
    assert_eq!(scheduler.queue_status().queued_at(LoadPriority::Low), 1);

    drop(holder);
    for waiter in waiters {
        waiter.await.unwrap();
    }

    assert_eq!(
        *admitted.lock().unwrap(),
        vec!["immediate", "normal", "low", "background"]
    );
    let status = scheduler.queue_status();
    assert_eq!(status.running, 0);
    assert_eq!(status.total_queued(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_waiters_resolve_to_none() {
    let scheduler = Scheduler::new(1);
    scheduler.pause();
    let request = scheduler.add_task("deferred", LoadPriority::Background);
    let waiter = tokio::spawn(request.admitted());
    sleep(Duration::from_millis(1)).await;

    assert_eq!(scheduler.cancel_where(|id, _| id == "deferred"), 1);
    assert!(waiter.await.unwrap().is_none());
}
