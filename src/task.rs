use std::any::Any;
use std::mem;
use std::sync::{Arc, Condvar, Mutex};

use crate::{PoolError, Result};

/// A unit of work accepted by the pool.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Terminal-state cell shared between a [`TaskFuture`] and its promise.
/// Written exactly once, then only read.
enum State<T> {
    Pending,
    Complete(T),
    Panicked(String),
    Cancelled,
}

struct Cell<T> {
    state: Mutex<State<T>>,
    done: Condvar,
}

/// Handle to the eventual result of a task submitted with
/// [`WorkPool::submit`](crate::WorkPool::submit).
///
/// Resolves once the task completes, panics, or is discarded without
/// running (rejection or immediate shutdown). A discarded task never
/// leaves its future pending forever.
pub struct TaskFuture<T> {
    cell: Arc<Cell<T>>,
}

impl<T> TaskFuture<T> {
    /// Blocks until the task reaches a terminal state and returns its
    /// outcome: the value, [`PoolError::TaskPanicked`], or
    /// [`PoolError::Cancelled`].
    pub fn wait(self) -> Result<T> {
        let mut state = self.cell.state.lock().unwrap();
        while matches!(*state, State::Pending) {
            state = self.cell.done.wait(state).unwrap();
        }
        match mem::replace(&mut *state, State::Cancelled) {
            State::Complete(value) => Ok(value),
            State::Panicked(msg) => Err(PoolError::TaskPanicked(msg)),
            State::Cancelled => Err(PoolError::Cancelled),
            State::Pending => unreachable!(),
        }
    }

    /// Returns whether the task has reached a terminal state.
    pub fn is_done(&self) -> bool {
        !matches!(*self.cell.state.lock().unwrap(), State::Pending)
    }
}

/// Write half of the result cell, captured by the submitted closure.
/// Dropping it before completion marks the task cancelled.
pub(crate) struct Promise<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Promise<T> {
    pub(crate) fn complete(self, value: T) {
        self.resolve(State::Complete(value));
    }

    pub(crate) fn fail(self, panic_msg: String) {
        self.resolve(State::Panicked(panic_msg));
    }

    fn resolve(&self, terminal: State<T>) {
        let mut state = self.cell.state.lock().unwrap();
        if matches!(*state, State::Pending) {
            *state = terminal;
            self.cell.done.notify_all();
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        // Never ran: rejected-and-discarded, or abandoned at shutdown.
        self.resolve(State::Cancelled);
    }
}

/// Creates a linked promise/future pair around a fresh result cell.
pub(crate) fn result_cell<T>() -> (Promise<T>, TaskFuture<T>) {
    let cell = Arc::new(Cell {
        state: Mutex::new(State::Pending),
        done: Condvar::new(),
    });
    (
        Promise {
            cell: Arc::clone(&cell),
        },
        TaskFuture { cell },
    )
}

/// Renders a panic payload into a printable message.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn resolves_with_value() {
        let (promise, future) = result_cell();
        assert!(!future.is_done());
        promise.complete(7);
        assert!(future.is_done());
        assert_eq!(future.wait().unwrap(), 7);
    }

    #[test]
    fn resolves_with_failure() {
        let (promise, future) = result_cell::<u32>();
        promise.fail("boom".to_owned());
        match future.wait() {
            Err(PoolError::TaskPanicked(msg)) => assert_eq!(msg, "boom"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn dropped_promise_cancels() {
        let (promise, future) = result_cell::<u32>();
        drop(promise);
        assert!(matches!(future.wait(), Err(PoolError::Cancelled)));
    }

    #[test]
    fn wait_blocks_until_completed_from_another_thread() {
        let (promise, future) = result_cell();
        let waiter = thread::spawn(move || future.wait().unwrap());
        promise.complete("done");
        assert_eq!(waiter.join().unwrap(), "done");
    }

    #[test]
    fn panic_message_downcasts_common_payloads() {
        assert_eq!(panic_message(Box::new("literal")), "literal");
        assert_eq!(panic_message(Box::new("owned".to_owned())), "owned");
        assert_eq!(panic_message(Box::new(42)), "unknown panic payload");
    }
}
