//! Task runner driving one attempt end to end.
//!
//! The runner dispatches the transport call before awaiting the cache
//! import, then waits for whichever comes first: the transport's answer or
//! a cancellation request.

use sessiontask_core::{TaskError, TaskState};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::context::TaskContext;
use crate::task::SessionTask;
use crate::transport::TransportOutcome;

// ============================================================================
// Run Outcome
// ============================================================================

/// Summary of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// State the task ended in.
    pub state: TaskState,
    /// Wall time of the attempt.
    pub duration: Duration,
    /// Whether a cached payload was imported during the attempt.
    pub served_from_cache: bool,
}

impl RunOutcome {
    fn from_task(task: &SessionTask, start: Instant) -> Self {
        Self {
            state: task.state(),
            duration: start.elapsed(),
            served_from_cache: task.is_cache_success(),
        }
    }

    /// Returns true if the attempt succeeded.
    pub fn is_success(&self) -> bool {
        self.state.is_succeeded()
    }
}

// ============================================================================
// Task Runner
// ============================================================================

/// Runs task attempts against a shared context.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    ctx: TaskContext,
}

impl TaskRunner {
    /// Creates a runner over `ctx`.
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx }
    }

    /// Returns the runner's context.
    pub fn context(&self) -> &TaskContext {
        &self.ctx
    }

    /// Performs one attempt of `task`.
    ///
    /// Returns `Err` only for [`TaskError::AlreadyRunning`]. Every other
    /// outcome, including cancellation, is reported through the task's
    /// state and the returned [`RunOutcome`].
    #[instrument(skip(self, task), fields(request_type = %task.request_type(), method = %task.method()))]
    pub async fn run(&self, task: &mut SessionTask) -> Result<RunOutcome, TaskError> {
        let start = Instant::now();

        let request = match task.prepare(&self.ctx) {
            Ok(request) => request,
            Err(TaskError::Cancelled) => {
                debug!("Task cancelled before dispatch");
                return Ok(RunOutcome::from_task(task, start));
            }
            Err(e) => return Err(e),
        };
        let handle = task.cancel_handle();

        info!(url = %request.absolute_url, "Dispatching request");

        // Dispatch first so the cache import never delays the call.
        let transport = self.ctx.transport.clone();
        let mut call = tokio::spawn(async move { transport.execute(&request).await });

        task.import_cache(&self.ctx).await;
        if task.is_cancelled() {
            debug!("Task cancelled during cache import");
            return Ok(RunOutcome::from_task(task, start));
        }

        let joined = tokio::select! {
            biased;
            () = handle.cancelled() => None,
            joined = &mut call => Some(joined),
        };

        let Some(joined) = joined else {
            // The spawned call runs to completion; its result is dropped.
            task.cancel();
            return Ok(RunOutcome::from_task(task, start));
        };

        let outcome = joined.unwrap_or_else(|e| {
            warn!(error = %e, "Transport task did not complete");
            TransportOutcome::Failed(TaskError::Request(e.to_string()))
        });
        debug!(outcome = outcome.label(), "Transport finished");

        match outcome {
            TransportOutcome::Completed(payload) => {
                task.response_session(&self.ctx, Some(payload), None).await;
            }
            TransportOutcome::Failed(error) => {
                task.response_session(&self.ctx, None, Some(error)).await;
            }
            TransportOutcome::Unreachable(reason) => task.no_reach_with_reason(reason),
        }

        let outcome = RunOutcome::from_task(task, start);
        info!(
            state = %outcome.state,
            duration = ?outcome.duration,
            from_cache = outcome.served_from_cache,
            "Attempt finished"
        );
        Ok(outcome)
    }
}

// ============================================================================
// Tests
// ============================================================================
