use log::debug;

/// Lifecycle notification emitted by the pool.
///
/// Events are purely observational; a sink can count or log them but
/// never affects control flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// A worker and its queue were created.
    WorkerCreated {
        /// Stable id of the new worker.
        worker: usize,
    },
    /// A task was accepted onto a worker's queue.
    TaskAccepted {
        /// Id of the worker whose queue received the task.
        worker: usize,
    },
    /// A task could not be placed and was handed to the rejection policy.
    TaskRejected,
    /// A worker exited its loop and left the pool.
    WorkerTerminated {
        /// Id of the departed worker.
        worker: usize,
    },
}

/// Receives pool lifecycle events.
pub trait EventSink: Send + Sync + 'static {
    /// Called once per event, from whichever thread produced it.
    fn emit(&self, event: PoolEvent);
}

/// Default sink: forwards events to the `log` crate at debug level.
///
/// With no logger installed this is a no-op.
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: PoolEvent) {
        debug!("pool event: {:?}", event);
    }
}
