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

//! # Ember SDK
//!
//! The public-facing entry point of the resource management core. A
//! [`ResourceContext`] is built once from an [`EmberConfig`](ember_core::EmberConfig),
//! started on a tokio runtime and dropped when the host shuts down.
//!
//! ```no_run
//! use ember_sdk::prelude::*;
//!
//! # async fn run() -> Result<(), ConfigError> {
//! ember_sdk::init_logging();
//! let context: ResourceContext<String> = ResourceContext::new(EmberConfig::default())?;
//! context.start();
//! let value = context
//!     .loader()
//!     .load("greeting", |_| async { Ok::<_, LoadFailure>("hello".to_owned()) }, LoadOptions::default())
//!     .await;
//! # let _ = value;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod context;
pub mod logging;

pub use context::{ContextReport, ResourceContext};
pub use logging::{init_logging, init_logging_with};

/// Everything a host typically needs.
pub mod prelude {
    pub use crate::context::{ContextReport, ResourceContext};
    pub use ember_cache::{PoolHandle, PoolRegistry, Poolable, SharedCacheStore};
    pub use ember_control::{ConnectionClass, EffectiveType, NetworkInfo};
    pub use ember_core::telemetry::{MonitorEvent, SampleKind};
    pub use ember_core::{
        CachePriority, Clock, ConfigError, EmberConfig, LoadPriority, ManualClock, SystemClock,
    };
    pub use ember_loader::{
        CancellationToken, FailureReason, LoadError, LoadFailure, LoadOptions, PreloadOptions,
        ProgressiveLoader, TaskStatus,
    };
    pub use ember_telemetry::{ManualMemoryProbe, MemoryProbe, ResourceMonitor};
}
