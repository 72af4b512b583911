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

//! Multi-queue, concurrency-limited admission control.
//!
//! Every [`LoadPriority`] has its own FIFO queue. Whenever a slot is free the
//! scheduler admits the head of the most urgent non-empty queue by handing
//! its waiter a [`SlotGuard`]; dropping the guard frees the slot and admits
//! the next waiter. Lower tiers may starve under sustained higher-priority
//! load.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use ember_core::sync::MutexExt;
use ember_core::LoadPriority;
use serde::Serialize;
use tokio::sync::oneshot;

/// Snapshot of the queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Queued waiters per tier, most urgent first.
    pub queued: [usize; LoadPriority::COUNT],
    /// Slots currently held.
    pub running: usize,
    /// Slot limit.
    pub max_concurrent: usize,
    /// Whether admission is suspended.
    pub paused: bool,
}

impl QueueStatus {
    /// Total queued waiters across tiers.
    pub fn total_queued(&self) -> usize {
        self.queued.iter().sum()
    }

    /// Queued waiters at one tier.
    pub fn queued_at(&self, priority: LoadPriority) -> usize {
        self.queued[priority.index()]
    }
}

struct Waiter {
    id: String,
    priority: LoadPriority,
    admit: oneshot::Sender<SlotGuard>,
}

struct SchedulerState {
    queues: [VecDeque<Waiter>; LoadPriority::COUNT],
    running: usize,
    max_concurrent: usize,
    paused: bool,
}

impl SchedulerState {
    fn pop_most_urgent(&mut self) -> Option<Waiter> {
        self.queues.iter_mut().find_map(VecDeque::pop_front)
    }
}

/// Admission control shared by every load. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("status", &self.queue_status())
            .finish()
    }
}

impl Scheduler {
    /// Creates a scheduler admitting at most `max_concurrent` waiters at once.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState {
                queues: Default::default(),
                running: 0,
                max_concurrent: max_concurrent.max(1),
                paused: false,
            })),
        }
    }

    /// Queues a waiter and immediately tries to admit it.
    ///
    /// ## Arguments
    /// * `id` - Task identifier, matched by [`cancel_where`](Self::cancel_where).
    /// * `priority` - Queue the waiter joins; FIFO within it.
    ///
    /// ## Returns
    /// A request resolving to a [`SlotGuard`] once admitted, or `None` if
    /// the waiter is cancelled first.
    pub fn add_task(&self, id: &str, priority: LoadPriority) -> SlotRequest {
        let (admit, admitted) = oneshot::channel();
        {
            let mut state = self.state.lock_recover();
            state.queues[priority.index()].push_back(Waiter {
                id: id.to_owned(),
                priority,
                admit,
            });
            self.pump(&mut state);
        }
        SlotRequest { admitted }
    }

    /// Admits waiters, most urgent first, until the slot limit is reached.
    pub fn schedule_execution(&self) {
        let mut state = self.state.lock_recover();
        self.pump(&mut state);
    }

    /// Changes the slot limit; raising it admits waiters right away.
    /// Lowering it never interrupts running work.
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        let mut state = self.state.lock_recover();
        let max_concurrent = max_concurrent.max(1);
        if state.max_concurrent != max_concurrent {
            log::debug!(
                "Scheduler concurrency {} -> {}.",
                state.max_concurrent,
                max_concurrent
            );
            state.max_concurrent = max_concurrent;
        }
        self.pump(&mut state);
    }

    /// Stops admitting waiters. Running work is unaffected.
    pub fn pause(&self) {
        self.state.lock_recover().paused = true;
        log::debug!("Scheduler paused.");
    }

    /// Resumes admission.
    pub fn resume(&self) {
        let mut state = self.state.lock_recover();
        state.paused = false;
        log::debug!("Scheduler resumed.");
        self.pump(&mut state);
    }

    /// Returns `true` while admission is suspended.
    pub fn is_paused(&self) -> bool {
        self.state.lock_recover().paused
    }

    /// Drops every queued waiter matching `predicate`. Their
    /// [`SlotRequest`]s resolve to `None`.
    pub fn cancel_where(&self, mut predicate: impl FnMut(&str, LoadPriority) -> bool) -> usize {
        let mut state = self.state.lock_recover();
        let mut removed = 0;
        for queue in state.queues.iter_mut() {
            let before = queue.len();
            queue.retain(|waiter| !predicate(&waiter.id, waiter.priority));
            removed += before - queue.len();
        }
        if removed > 0 {
            log::debug!("Removed {} queued task(s).", removed);
        }
        removed
    }

    /// Snapshot of the queues.
    pub fn queue_status(&self) -> QueueStatus {
        let state = self.state.lock_recover();
        let mut queued = [0; LoadPriority::COUNT];
        for (count, queue) in queued.iter_mut().zip(state.queues.iter()) {
            *count = queue.len();
        }
        QueueStatus {
            queued,
            running: state.running,
            max_concurrent: state.max_concurrent,
            paused: state.paused,
        }
    }

    fn pump(&self, state: &mut SchedulerState) {
        while !state.paused && state.running < state.max_concurrent {
            let Some(waiter) = state.pop_most_urgent() else {
                break;
            };
            state.running += 1;
            let guard = SlotGuard {
                scheduler: Some(self.clone()),
            };
            if let Err(mut guard) = waiter.admit.send(guard) {
                // The waiter went away. Releasing through the guard would
                // re-enter this lock, so give the slot back by hand.
                guard.scheduler = None;
                state.running -= 1;
                continue;
            }
            log::trace!(
                "Admitted '{}' ({}), {}/{} running.",
                waiter.id,
                waiter.priority,
                state.running,
                state.max_concurrent
            );
        }
    }

    fn release(&self) {
        let mut state = self.state.lock_recover();
        state.running = state.running.saturating_sub(1);
        self.pump(&mut state);
    }
}

/// A pending admission.
#[derive(Debug)]
pub struct SlotRequest {
    admitted: oneshot::Receiver<SlotGuard>,
}

impl SlotRequest {
    /// Waits for a slot. `None` means the waiter was removed from its queue.
    pub async fn admitted(self) -> Option<SlotGuard> {
        self.admitted.await.ok()
    }

    /// Returns the slot if it was already granted.
    pub fn try_admitted(&mut self) -> Option<SlotGuard> {
        self.admitted.try_recv().ok()
    }
}

/// A held scheduler slot, released on drop.
pub struct SlotGuard {
    scheduler: Option<Scheduler>,
}

impl fmt::Debug for SlotGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotGuard")
            .field("armed", &self.scheduler.is_some())
            .finish()
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.release();
        }
    }
}
