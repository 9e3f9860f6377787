use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use log::{error, warn};

use crate::Task;

/// Decides what happens to a task the pool cannot accept.
///
/// Invoked exactly once per rejected task: the pool is saturated (every
/// reachable queue full and the worker count at its maximum) or shutting
/// down. Install a replacement through
/// [`Builder::rejection_policy`](crate::Builder::rejection_policy) before
/// the pool begins accepting work.
pub trait RejectionPolicy: Send + Sync + 'static {
    /// Handles one rejected task. The policy owns the task and may run
    /// it, drop it, or hand it elsewhere.
    fn on_rejected(&self, task: Task);
}

/// Default policy: record the rejection and discard the task.
///
/// A future tied to a discarded task resolves as cancelled.
pub struct DiscardPolicy;

impl RejectionPolicy for DiscardPolicy {
    fn on_rejected(&self, task: Task) {
        warn!("task rejected: pool saturated or shut down, discarding");
        drop(task);
    }
}

/// Runs the rejected task on the submitting thread.
///
/// Trades backpressure for completeness: the caller is slowed down
/// instead of losing work. Panics from the task are contained, matching
/// the pool's own worker boundary.
pub struct CallerRunsPolicy;

impl RejectionPolicy for CallerRunsPolicy {
    fn on_rejected(&self, task: Task) {
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!("rejected task panicked on the calling thread");
        }
    }
}

/// Produces the running thread behind a worker.
///
/// Injected so the host controls naming, priority, or instrumentation
/// without the pool depending on it. The body must be invoked on a
/// thread of its own; the pool never joins it.
pub trait ThreadFactory: Send + Sync + 'static {
    /// Spawns a thread named `name` executing `body` to completion.
    fn spawn_worker(&self, name: String, body: Task) -> io::Result<()>;
}

/// Default factory: a `std::thread::Builder` with the given name.
pub struct OsThreadFactory;

impl ThreadFactory for OsThreadFactory {
    fn spawn_worker(&self, name: String, body: Task) -> io::Result<()> {
        thread::Builder::new().name(name).spawn(body).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn caller_runs_executes_on_current_thread() {
        let caller = thread::current().id();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        CallerRunsPolicy.on_rejected(Box::new(move || {
            assert_eq!(thread::current().id(), caller);
            flag.store(true, Ordering::Release);
        }));
        assert!(ran.load(Ordering::Acquire));
    }

    #[test]
    fn caller_runs_contains_panics() {
        CallerRunsPolicy.on_rejected(Box::new(|| panic!("contained")));
    }

    #[test]
    fn os_factory_runs_body_on_named_thread() {
        let (tx, rx) = crossbeam::channel::bounded(1);
        OsThreadFactory
            .spawn_worker(
                "factory-test".to_owned(),
                Box::new(move || {
                    let name = thread::current().name().map(str::to_owned);
                    tx.send(name).unwrap();
                }),
            )
            .unwrap();
        assert_eq!(rx.recv().unwrap().as_deref(), Some("factory-test"));
    }
}
