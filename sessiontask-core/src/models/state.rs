//! Task state types.
//!
//! A task's progress is tracked on two orthogonal axes:
//! - [`Lifecycle`] - where the request is in its run
//! - [`CachePhase`] - what happened when the local cache was consulted
//!
//! Both are carried together in a [`TaskState`] value.

use serde::{Deserialize, Serialize};

// ============================================================================
// Lifecycle
// ============================================================================

/// Primary progress axis of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Created, or ready to be started again.
    #[default]
    Runnable,
    /// Started and waiting on the transport.
    Running,
    /// Cancelled by the caller before a result was applied.
    Cancelled,
    /// The server answered and the answer passed the success check.
    Success,
    /// The server answered with a business error, or the call failed.
    Fail,
    /// The server could not be reached.
    NoReach,
}

impl Lifecycle {
    /// Returns a short label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Runnable => "runnable",
            Self::Running => "running",
            Self::Cancelled => "cancelled",
            Self::Success => "success",
            Self::Fail => "fail",
            Self::NoReach => "no_reach",
        }
    }

    /// Returns true for the four end states of an attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Success | Self::Fail | Self::NoReach
        )
    }

    /// Returns all lifecycle values.
    pub fn all() -> &'static [Lifecycle] {
        &[
            Self::Runnable,
            Self::Running,
            Self::Cancelled,
            Self::Success,
            Self::Fail,
            Self::NoReach,
        ]
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// Cache Phase
// ============================================================================

/// Outcome of the local cache import for the current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CachePhase {
    /// No import decision has been made yet.
    #[default]
    NotTried,
    /// A cached payload was found and surfaced.
    CacheSuccess,
    /// The cache was consulted and had nothing.
    CacheFail,
    /// The cache was not consulted for this attempt.
    CacheNoTry,
}

impl CachePhase {
    /// Returns a short label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotTried => "not_tried",
            Self::CacheSuccess => "cache_success",
            Self::CacheFail => "cache_fail",
            Self::CacheNoTry => "cache_no_try",
        }
    }

    /// Returns all cache phase values.
    pub fn all() -> &'static [CachePhase] {
        &[
            Self::NotTried,
            Self::CacheSuccess,
            Self::CacheFail,
            Self::CacheNoTry,
        ]
    }
}

impl std::fmt::Display for CachePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// Task State
// ============================================================================

/// Combined task status: one lifecycle value and one cache phase.
///
/// Values are immutable; transitions produce a new `TaskState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct TaskState {
    lifecycle: Lifecycle,
    cache: CachePhase,
}

impl TaskState {
    /// The state of a freshly constructed task.
    pub const fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Runnable,
            cache: CachePhase::NotTried,
        }
    }

    /// Returns the lifecycle axis.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Returns the cache axis.
    pub fn cache(&self) -> CachePhase {
        self.cache
    }

    /// Returns the state of a new attempt: running, cache not yet tried.
    pub fn started(self) -> Self {
        Self {
            lifecycle: Lifecycle::Running,
            cache: CachePhase::NotTried,
        }
    }

    /// Moves the lifecycle axis, keeping the cache phase.
    pub fn with_lifecycle(self, lifecycle: Lifecycle) -> Self {
        Self { lifecycle, ..self }
    }

    /// Moves the cache axis. Cancelled states keep their cache phase.
    pub fn with_cache(self, cache: CachePhase) -> Self {
        if self.is_cancelled() {
            return self;
        }
        Self { cache, ..self }
    }

    /// Returns true if the task has not been started.
    pub fn is_runnable(&self) -> bool {
        self.lifecycle == Lifecycle::Runnable
    }

    /// Returns true while an attempt is in flight.
    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    /// Returns true if the last attempt succeeded.
    pub fn is_succeeded(&self) -> bool {
        self.lifecycle == Lifecycle::Success
    }

    /// Returns true if the last attempt failed.
    pub fn is_failed(&self) -> bool {
        self.lifecycle == Lifecycle::Fail
    }

    /// Returns true if the last attempt was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.lifecycle == Lifecycle::Cancelled
    }

    /// Returns true if the server could not be reached.
    pub fn is_no_reach(&self) -> bool {
        self.lifecycle == Lifecycle::NoReach
    }

    /// Returns true if a cached payload was imported.
    pub fn is_cache_success(&self) -> bool {
        self.cache == CachePhase::CacheSuccess
    }

    /// Returns true if the cache was consulted and missed.
    pub fn is_cache_fail(&self) -> bool {
        self.cache == CachePhase::CacheFail
    }

    /// Returns true if the cache was skipped.
    pub fn is_cache_no_try(&self) -> bool {
        self.cache == CachePhase::CacheNoTry
    }

    /// Returns true once the attempt has reached an end state.
    pub fn is_terminal(&self) -> bool {
        self.lifecycle.is_terminal()
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{}", self.lifecycle, self.cache)
    }
}

// ============================================================================
// Tests
// ============================================================================
