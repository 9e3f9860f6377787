use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};

use crate::Task;

/// Creates the fixed-capacity FIFO backing one worker.
///
/// The producer half lives in the worker's handle inside the pool; the
/// consumer half is owned exclusively by the worker thread. Dropping the
/// producer disconnects the channel, which is how shutdown wakes a
/// worker blocked in [`QueueConsumer::take`].
pub(crate) fn bounded(capacity: usize) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = channel::bounded(capacity);
    (QueueProducer { tx }, QueueConsumer { rx })
}

/// Producer half of a worker queue, held by the pool controller.
pub(crate) struct QueueProducer {
    tx: Sender<Task>,
}

impl QueueProducer {
    /// Non-blocking enqueue. Returns the task back if the queue is full
    /// (or its worker is already gone).
    pub(crate) fn offer(&self, task: Task) -> Result<(), Task> {
        match self.tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) | Err(TrySendError::Disconnected(task)) => Err(task),
        }
    }
}

/// Consumer half of a worker queue, owned by exactly one worker.
pub(crate) struct QueueConsumer {
    rx: Receiver<Task>,
}

impl QueueConsumer {
    /// Blocks up to `timeout` for the next task.
    pub(crate) fn take(&self, timeout: Duration) -> Result<Task, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Non-blocking take, used while draining.
    pub(crate) fn try_take(&self) -> Result<Task, TryRecvError> {
        self.rx.try_recv()
    }

    /// Drops every queued task and returns how many were discarded.
    /// Futures tied to the dropped tasks resolve as cancelled.
    pub(crate) fn drain(&self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
