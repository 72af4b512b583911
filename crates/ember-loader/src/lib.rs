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

//! # Ember Loader
//!
//! Adaptive progressive loading on top of the ember cache.
//!
//! A [`ProgressiveLoader`] answers `load` calls from the cache when it can,
//! collapses identical in-flight loads into one, waits for dependencies and
//! runs the operation through the [`Scheduler`], which admits work by
//! [`LoadPriority`](ember_core::LoadPriority) under a concurrency cap driven
//! by the network sensor. Failed attempts are retried with a fixed delay;
//! cancellation is cooperative through a [`CancellationToken`].

#![warn(missing_docs)]

pub mod cancel;
pub mod error;
pub mod loader;
pub mod scheduler;
pub mod task;

pub use cancel::CancellationToken;
pub use error::{FailureReason, LoadError, LoadFailure};
pub use loader::{
    positional_priority, LoadOptions, LoadResult, LoaderStats, PreloadOptions, ProgressiveLoader,
};
pub use scheduler::{QueueStatus, Scheduler, SlotGuard, SlotRequest};
pub use task::{LoadTask, TaskStatus};
