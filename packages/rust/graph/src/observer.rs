//! Progress reporting seam for pipeline runs.

use std::time::Duration;

use crate::executor::RunResult;

/// Callbacks fired by the executor as a run progresses.
///
/// Implementations must not assume any scheduling beyond dependency order.
pub trait RunObserver: Send + Sync {
    /// A component is about to execute (`index` of `total` in run order).
    fn component_started(&self, _name: &str, _index: usize, _total: usize) {}

    /// A component finished successfully.
    fn component_finished(&self, _name: &str, _elapsed: Duration) {}

    /// The whole run completed successfully.
    fn run_finished(&self, _result: &RunResult) {}
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl RunObserver for SilentObserver {}
