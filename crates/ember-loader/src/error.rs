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

//! Error types for the loading pipeline.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why an operation attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureReason {
    /// Transport-level failure.
    Network,
    /// The attempt took too long.
    Timeout,
    /// The operation gave up on purpose; never retried.
    Aborted,
    /// Anything else.
    Unknown,
}

impl FailureReason {
    /// Returns `true` if another attempt may succeed.
    pub fn is_retryable(self) -> bool {
        !matches!(self, FailureReason::Aborted)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureReason::Network => "network",
            FailureReason::Timeout => "timeout",
            FailureReason::Aborted => "aborted",
            FailureReason::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// The error an operation returns for one failed attempt.
///
/// Operations written with `anyhow` can use `?` directly: any
/// `anyhow::Error` converts into a failure with [`FailureReason::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: {message}")]
pub struct LoadFailure {
    /// Classification of the failure.
    pub reason: FailureReason,
    /// Human-readable detail.
    pub message: String,
}

impl LoadFailure {
    /// Creates a failure.
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    /// A retryable transport failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureReason::Network, message)
    }

    /// A retryable timeout.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureReason::Timeout, message)
    }

    /// A deliberate, non-retryable abort.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(FailureReason::Aborted, message)
    }
}

impl From<anyhow::Error> for LoadFailure {
    fn from(error: anyhow::Error) -> Self {
        Self::new(FailureReason::Unknown, format!("{error:#}"))
    }
}

/// The error returned by a load.
///
/// `Clone` so that one outcome can be handed to every de-duplicated waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    /// A non-retryable failure.
    #[error("loading '{id}' failed on attempt {attempt} ({reason}): {message}")]
    Failed {
        /// Task identifier.
        id: String,
        /// Failure classification.
        reason: FailureReason,
        /// 1-based attempt that failed.
        attempt: u32,
        /// Detail from the operation.
        message: String,
    },

    /// Every allowed attempt failed.
    #[error("loading '{id}' failed after {attempts} attempt(s) ({last_reason}): {message}")]
    MaxRetriesExceeded {
        /// Task identifier.
        id: String,
        /// Attempts made (`retry_count + 1`).
        attempts: u32,
        /// Classification of the last failure.
        last_reason: FailureReason,
        /// Detail from the last failure.
        message: String,
    },

    /// The task was cancelled before producing a usable result.
    #[error("loading '{id}' was cancelled")]
    Cancelled {
        /// Task identifier.
        id: String,
    },

    /// A dependency failed, so the task never ran.
    #[error("dependency '{dependency}' of '{id}' failed")]
    DependencyFailed {
        /// Task identifier.
        id: String,
        /// Identifier of the failed dependency.
        dependency: String,
        /// The dependency's own error.
        source: Box<LoadError>,
    },
}

impl LoadError {
    /// Identifier of the task that failed.
    pub fn id(&self) -> &str {
        match self {
            LoadError::Failed { id, .. }
            | LoadError::MaxRetriesExceeded { id, .. }
            | LoadError::Cancelled { id }
            | LoadError::DependencyFailed { id, .. } => id,
        }
    }

    /// Returns `true` for [`LoadError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadError::Cancelled { .. })
    }

    /// Classification of the underlying failure, if any.
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            LoadError::Failed { reason, .. } => Some(*reason),
            LoadError::MaxRetriesExceeded { last_reason, .. } => Some(*last_reason),
            LoadError::Cancelled { .. } => None,
            LoadError::DependencyFailed { source, .. } => source.reason(),
        }
    }

    pub(crate) fn cancelled(id: &str) -> Self {
        LoadError::Cancelled { id: id.to_owned() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use std::error::Error as _;

    #[test]
    fn anyhow_errors_become_unknown_failures() {
        let result: anyhow::Result<()> = Err(anyhow::anyhow!("socket closed")).context("fetching icon");
        let failure = LoadFailure::from(result.unwrap_err());
        assert_eq!(failure.reason, FailureReason::Unknown);
        assert_eq!(failure.message, "fetching icon: socket closed");
    }

    #[test]
    fn only_aborted_is_final() {
        assert!(FailureReason::Network.is_retryable());
        assert!(FailureReason::Timeout.is_retryable());
        assert!(FailureReason::Unknown.is_retryable());
        assert!(!FailureReason::Aborted.is_retryable());
    }

    #[test]
    fn dependency_failure_exposes_source() {
        let inner = LoadError::MaxRetriesExceeded {
            id: "a".into(),
            attempts: 3,
            last_reason: FailureReason::Timeout,
            message: "slow".into(),
        };
        let error = LoadError::DependencyFailed {
            id: "b".into(),
            dependency: "a".into(),
            source: Box::new(inner.clone()),
        };
        assert_eq!(error.id(), "b");
        assert_eq!(error.reason(), Some(FailureReason::Timeout));
        assert_eq!(error.to_string(), "dependency 'a' of 'b' failed");
        assert_eq!(error.source().map(|s| s.to_string()), Some(inner.to_string()));
    }
}
