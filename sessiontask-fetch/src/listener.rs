//! Task notification contract.

use crate::task::SessionTask;

/// Receives a task's state notifications.
///
/// Tasks hold their listener weakly, so a listener that has been dropped
/// simply stops receiving calls. Read the task's state inside the callback
/// to tell the cases apart:
///
/// - `on_sending`: `Running` with any cache phase, or `Cancelled`
/// - `on_connected`: `Success` or `Fail`
/// - `on_lost`: `NoReach` with the attempt's cache phase
pub trait TaskListener: Send + Sync {
    /// The task started (or was cancelled).
    fn on_sending(&self, task: &SessionTask);

    /// The server answered.
    fn on_connected(&self, task: &SessionTask);

    /// The server could not be reached.
    fn on_lost(&self, task: &SessionTask);
}
