use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crossbeam::channel::{RecvTimeoutError, TryRecvError};
use log::{debug, error};

use super::queue::{QueueConsumer, QueueProducer};
use super::{Mode, Shared};
use crate::events::PoolEvent;
use crate::Task;

/// Lifecycle state of a worker. Written by the owning worker, read by
/// the controller for spare-thread accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerState {
    Idle,
    Busy,
    Terminated,
}

pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        StateCell(AtomicU8::new(WorkerState::Idle as u8))
    }

    pub(crate) fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::Release);
    }

    pub(crate) fn get(&self) -> WorkerState {
        match self.0.load(Ordering::Acquire) {
            0 => WorkerState::Idle,
            1 => WorkerState::Busy,
            _ => WorkerState::Terminated,
        }
    }
}

/// Controller-side view of a live worker: the producer half of its
/// queue plus its state cell. Dropping the handle disconnects the
/// queue, so queue lifetime is tied to worker lifetime.
pub(crate) struct WorkerHandle {
    pub(crate) id: usize,
    pub(crate) queue: QueueProducer,
    pub(crate) state: Arc<StateCell>,
}

/// A worker thread: one exclusively-owned bounded queue and the loop
/// that takes tasks from it.
pub(crate) struct Worker {
    id: usize,
    shared: Arc<Shared>,
    queue: QueueConsumer,
    state: Arc<StateCell>,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        shared: Arc<Shared>,
        queue: QueueConsumer,
        state: Arc<StateCell>,
    ) -> Self {
        Worker {
            id,
            shared,
            queue,
            state,
        }
    }

    /// The worker lifecycle loop: `Idle -> Busy -> Idle -> ... ->
    /// Terminated`.
    pub(crate) fn run(self) {
        debug!("worker {} started", self.id);
        loop {
            match self.shared.mode() {
                Mode::Running => {}
                Mode::Draining => return self.drain(),
                Mode::Stopping => return self.abandon(),
            }
            match self.queue.take(self.shared.config.keep_alive) {
                Ok(task) => {
                    // Immediate shutdown may land between the mode check
                    // and the take; a task pulled after that point was
                    // queued but never started, so it must not run.
                    if self.shared.mode() == Mode::Stopping {
                        drop(task);
                        return self.abandon();
                    }
                    self.run_task(task);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.try_retire() {
                        return;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // Producer handle gone: shutdown is underway and the
                    // next mode check routes to the right exit path.
                }
            }
        }
    }

    /// Runs one task. Failures are caught at this boundary and
    /// reported; they never terminate the worker.
    fn run_task(&self, task: Task) {
        self.state.set(WorkerState::Busy);
        debug!("worker {} executing task", self.id);
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!("worker {}: task panicked, continuing", self.id);
        }
        self.state.set(WorkerState::Idle);
    }

    /// Idle-timeout shrink: leave the pool if it holds more workers
    /// than the core size. Returns whether the worker retired.
    fn try_retire(&self) -> bool {
        {
            let mut workers = self.shared.workers.lock().unwrap();
            if self.shared.mode() != Mode::Running {
                // Shutdown raced the timeout; the main loop handles it.
                return false;
            }
            if workers.len() <= self.shared.config.core_pool_size {
                return false;
            }
            // Dispatch enqueues only under this lock, so an empty queue
            // here cannot gain a task once the handle is removed.
            if !self.queue.is_empty() {
                return false;
            }
            workers.retain(|w| w.id != self.id);
        }
        debug!("worker {} idle past keep-alive, retiring", self.id);
        self.finish();
        true
    }

    /// Graceful shutdown: keep taking and running queued tasks until
    /// the queue is empty, then terminate. Nothing is discarded.
    fn drain(self) {
        loop {
            if self.shared.mode() == Mode::Stopping {
                return self.abandon();
            }
            match self.queue.try_take() {
                Ok(task) => self.run_task(task),
                // No producer can enqueue once draining has begun, so
                // an empty queue is a finished queue.
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        self.finish();
    }

    /// Immediate shutdown: discard queued tasks without running them.
    /// Dropping them resolves any attached futures as cancelled.
    fn abandon(self) {
        let abandoned = self.queue.drain();
        if abandoned > 0 {
            debug!("worker {}: abandoned {} queued task(s)", self.id, abandoned);
        }
        self.finish();
    }

    /// Terminal transition: leave the live set and report.
    fn finish(&self) {
        self.state.set(WorkerState::Terminated);
        {
            let mut workers = self.shared.workers.lock().unwrap();
            workers.retain(|w| w.id != self.id);
        }
        self.shared
            .events
            .emit(PoolEvent::WorkerTerminated { worker: self.id });
        debug!("worker {} terminated", self.id);
    }
}
