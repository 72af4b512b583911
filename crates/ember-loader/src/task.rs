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

//! Per-load bookkeeping.

use std::time::Instant;

use ember_core::LoadPriority;
use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::error::LoadError;

/// Lifecycle of a [`LoadTask`].
///
/// `Pending -> Loading -> Loaded | Error | Cancelled`, and
/// `Error -> Pending` while retries remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskStatus {
    /// Waiting for dependencies or a scheduler slot.
    Pending,
    /// An attempt is running.
    Loading,
    /// Finished with a value.
    Loaded,
    /// The last attempt failed.
    Error,
    /// Cancelled before producing a usable value.
    Cancelled,
}

/// One load, from submission to completion.
#[derive(Debug, Clone)]
pub struct LoadTask {
    id: String,
    generation: u64,
    priority: LoadPriority,
    dependencies: Vec<String>,
    status: TaskStatus,
    attempt: u32,
    token: CancellationToken,
    created_at: Instant,
    finished: bool,
    error: Option<LoadError>,
}

impl LoadTask {
    pub(crate) fn new(
        id: String,
        generation: u64,
        priority: LoadPriority,
        dependencies: Vec<String>,
    ) -> Self {
        Self {
            id,
            generation,
            priority,
            dependencies,
            status: TaskStatus::Pending,
            attempt: 0,
            token: CancellationToken::new(),
            created_at: Instant::now(),
            finished: false,
            error: None,
        }
    }

    /// Identifier, also the de-duplication key.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Scheduling tier.
    pub fn priority(&self) -> LoadPriority {
        self.priority
    }

    /// Identifiers this task waits for.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Current state.
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Attempts started so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Token handed to every attempt of this task.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Submission instant.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Returns `true` once the task will not run again.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Final error, once finished unsuccessfully.
    pub fn error(&self) -> Option<&LoadError> {
        self.error.as_ref()
    }

    pub(crate) fn begin_attempt(&mut self) {
        self.attempt += 1;
        self.status = TaskStatus::Loading;
    }

    pub(crate) fn attempt_failed(&mut self) {
        self.status = TaskStatus::Error;
    }

    pub(crate) fn await_retry(&mut self) {
        self.status = TaskStatus::Pending;
    }

    pub(crate) fn finish(&mut self, outcome: Result<(), &LoadError>) {
        self.finished = true;
        match outcome {
            Ok(()) => self.status = TaskStatus::Loaded,
            Err(error) => {
                self.status = if error.is_cancelled() {
                    TaskStatus::Cancelled
                } else {
                    TaskStatus::Error
                };
                self.error = Some(error.clone());
            }
        }
    }
}
