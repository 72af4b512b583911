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

//! RAII render timing.

use std::time::Instant;

use crate::monitor::ResourceMonitor;

/// Records a render sample on the owning monitor when dropped.
///
/// The measurement is recorded even on early return, so wrap the whole
/// render pass in the timer's scope.
pub struct ScopedRenderTimer<'a> {
    monitor: &'a ResourceMonitor,
    component: String,
    started_at: Instant,
}

impl<'a> ScopedRenderTimer<'a> {
    pub(crate) fn new(monitor: &'a ResourceMonitor, component: String, started_at: Instant) -> Self {
        Self {
            monitor,
            component,
            started_at,
        }
    }

    /// Component this timer measures.
    pub fn component(&self) -> &str {
        &self.component
    }
}

impl Drop for ScopedRenderTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.monitor.now().saturating_duration_since(self.started_at);
        self.monitor.record_render(&self.component, elapsed);
    }
}
