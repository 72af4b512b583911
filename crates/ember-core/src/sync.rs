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

//! Lock helpers.
//!
//! Components guard their state with a single coarse `std::sync::Mutex`.
//! None of them panics while holding a lock, so a poisoned lock still holds
//! consistent state and is recovered instead of propagated.

use std::sync::{Mutex, MutexGuard};

/// Poison-tolerant locking for [`Mutex`].
pub trait MutexExt<T> {
    /// Locks the mutex, recovering the guard if the lock was poisoned.
    fn lock_recover(&self) -> MutexGuard<'_, T>;
}

impl<T> MutexExt<T> for Mutex<T> {
    fn lock_recover(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|poisoned| {
            log::warn!("Recovering poisoned mutex");
            poisoned.into_inner()
        })
    }
}
