//! The pool controller: dispatch, growth, spare-thread maintenance,
//! and shutdown.

mod queue;
mod worker;

use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error};

use crate::events::{EventSink, LogSink, PoolEvent};
use crate::policy::{DiscardPolicy, OsThreadFactory, RejectionPolicy, ThreadFactory};
use crate::task::{self, TaskFuture};
use crate::{PoolConfig, Result, Task};

use self::worker::{StateCell, Worker, WorkerHandle, WorkerState};

/// Shutdown mode of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Running = 0,
    Draining = 1,
    Stopping = 2,
}

/// State shared between the pool handle and its worker threads.
///
/// The live-worker collection, the round-robin cursor, and the shutdown
/// mode are the only cross-thread state. Every enqueue and every
/// mutation of the collection happens under the `workers` lock, so
/// dispatch never observes the collection mid-mutation and the cursor
/// never indexes against a stale count.
pub(crate) struct Shared {
    pub(crate) config: PoolConfig,
    pub(crate) workers: Mutex<Vec<WorkerHandle>>,
    cursor: AtomicUsize,
    mode: AtomicU8,
    next_id: AtomicUsize,
    factory: Box<dyn ThreadFactory>,
    rejection: Box<dyn RejectionPolicy>,
    pub(crate) events: Box<dyn EventSink>,
}

impl Shared {
    pub(crate) fn mode(&self) -> Mode {
        match self.mode.load(Ordering::Acquire) {
            0 => Mode::Running,
            1 => Mode::Draining,
            _ => Mode::Stopping,
        }
    }

    fn set_mode(&self, mode: Mode) {
        self.mode.store(mode as u8, Ordering::Release);
    }
}

/// Outcome of a dispatch attempt, resolved under the workers lock and
/// acted on (events, rejection policy) after it is released.
enum Dispatch {
    Queued { worker: usize },
    Rejected(Task),
}

/// Creates a worker (queue, state cell, thread) and adds its handle to
/// the live set. Returns the handle's index. Caller must hold the
/// workers lock.
fn add_worker(shared: &Arc<Shared>, workers: &mut Vec<WorkerHandle>) -> Result<usize> {
    let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
    let (producer, consumer) = queue::bounded(shared.config.queue_capacity);
    let state = Arc::new(StateCell::new());
    let worker = Worker::new(id, Arc::clone(shared), consumer, Arc::clone(&state));
    shared
        .factory
        .spawn_worker(format!("pool-worker-{id}"), Box::new(move || worker.run()))?;
    workers.push(WorkerHandle {
        id,
        queue: producer,
        state,
    });
    Ok(workers.len() - 1)
}

/// Round-robin dispatch with grow-on-full. Caller must hold the
/// workers lock and have checked that the pool is running.
fn dispatch(
    shared: &Arc<Shared>,
    workers: &mut Vec<WorkerHandle>,
    task: Task,
    created: &mut Vec<usize>,
) -> Dispatch {
    // The live count stays within [core, max] while running, so the
    // collection is non-empty here.
    let index = shared.cursor.fetch_add(1, Ordering::Relaxed) % workers.len();
    let target = &workers[index];
    let task = match target.queue.offer(task) {
        Ok(()) => return Dispatch::Queued { worker: target.id },
        Err(task) => task,
    };

    // Target queue full: grow by one worker if the cap allows.
    if workers.len() < shared.config.max_pool_size {
        match add_worker(shared, workers) {
            Ok(new_index) => {
                let handle = &workers[new_index];
                created.push(handle.id);
                debug!(
                    "queue of worker {} full, rerouting task to new worker {}",
                    workers[index].id, handle.id
                );
                // The queue was created empty with capacity >= 1.
                if handle.queue.offer(task).is_err() {
                    unreachable!("freshly created queue rejected a task");
                }
                return Dispatch::Queued { worker: handle.id };
            }
            Err(e) => {
                error!("could not grow pool: {}", e);
                return Dispatch::Rejected(task);
            }
        }
    }
    Dispatch::Rejected(task)
}

/// Spare-thread maintenance: keep at least `min_spare_threads` idle
/// workers available while below the maximum. Runs under the same lock
/// as dispatch and growth.
fn maintain_spares(shared: &Arc<Shared>, workers: &mut Vec<WorkerHandle>, created: &mut Vec<usize>) {
    let idle = workers
        .iter()
        .filter(|w| w.state.get() == WorkerState::Idle)
        .count();
    if idle < shared.config.min_spare_threads && workers.len() < shared.config.max_pool_size {
        match add_worker(shared, workers) {
            Ok(index) => {
                let id = workers[index].id;
                debug!("added spare worker {} ({} idle below minimum)", id, idle);
                created.push(id);
            }
            Err(e) => error!("could not add spare worker: {}", e),
        }
    }
}

/// A bounded, elastic thread pool with one task queue per worker.
///
/// Tasks are placed by round robin onto the queue of a live worker.
/// When the chosen queue is full the pool grows, up to
/// [`max_pool_size`](PoolConfig::max_pool_size); when growth is
/// exhausted too, the task goes to the configured
/// [`RejectionPolicy`]. Workers idle beyond the keep-alive retire until
/// only [`core_pool_size`](PoolConfig::core_pool_size) remain.
///
/// Dropping the pool initiates a graceful [`shutdown`](WorkPool::shutdown).
pub struct WorkPool {
    shared: Arc<Shared>,
}

impl WorkPool {
    /// Creates a pool with the default capabilities (OS threads,
    /// discarding rejection policy, log-backed event sink) and spawns
    /// the core workers.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a core
    /// worker thread cannot be spawned.
    pub fn new(config: PoolConfig) -> Result<WorkPool> {
        Builder::new(config).build()
    }

    /// Starts building a pool with custom capabilities.
    pub fn builder(config: PoolConfig) -> Builder {
        Builder::new(config)
    }

    /// Submits a task for asynchronous execution.
    ///
    /// Never blocks and never fails: a task the pool cannot place (all
    /// reachable queues full with the worker count at its maximum, or
    /// the pool shutting down) is handed to the rejection policy
    /// instead.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute_task(Box::new(job));
    }

    /// Submits a computation and returns a [`TaskFuture`] resolving to
    /// its result.
    ///
    /// Returns immediately. The future resolves with the value, with
    /// [`PoolError::TaskPanicked`](crate::PoolError::TaskPanicked) if
    /// the computation panics, or with
    /// [`PoolError::Cancelled`](crate::PoolError::Cancelled) if the
    /// task is discarded without running.
    pub fn submit<T, F>(&self, job: F) -> TaskFuture<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (promise, future) = task::result_cell();
        self.execute(move || match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(value) => promise.complete(value),
            Err(payload) => promise.fail(task::panic_message(payload)),
        });
        future
    }

    fn execute_task(&self, task: Task) {
        let mut created = Vec::new();
        let outcome = {
            let mut workers = self.shared.workers.lock().unwrap();
            if self.shared.mode() != Mode::Running {
                Dispatch::Rejected(task)
            } else {
                let outcome = dispatch(&self.shared, &mut workers, task, &mut created);
                maintain_spares(&self.shared, &mut workers, &mut created);
                outcome
            }
        };
        // Events and the rejection policy run outside the lock.
        for id in created {
            self.shared.events.emit(PoolEvent::WorkerCreated { worker: id });
        }
        match outcome {
            Dispatch::Queued { worker } => {
                self.shared.events.emit(PoolEvent::TaskAccepted { worker });
            }
            Dispatch::Rejected(task) => {
                self.shared.events.emit(PoolEvent::TaskRejected);
                self.shared.rejection.on_rejected(task);
            }
        }
    }

    /// Initiates a graceful shutdown.
    ///
    /// No new tasks are accepted (they go to the rejection policy);
    /// every task already queued is still executed. Each worker drains
    /// its own queue to empty, then terminates, so the pool eventually
    /// reaches zero live workers. Idempotent.
    pub fn shutdown(&self) {
        {
            let _workers = self.shared.workers.lock().unwrap();
            if self.shared.mode() != Mode::Running {
                return;
            }
            self.shared.set_mode(Mode::Draining);
        }
        debug!("pool draining: workers will finish queued work and terminate");
    }

    /// Initiates an immediate shutdown.
    ///
    /// No new tasks are accepted and queued-but-not-started tasks are
    /// abandoned without running; their futures resolve as cancelled. A
    /// worker blocked waiting for work is woken out of that wait right
    /// away; a worker mid-task finishes its current task and then
    /// exits.
    pub fn shutdown_now(&self) {
        let handles = {
            let mut workers = self.shared.workers.lock().unwrap();
            if self.shared.mode() == Mode::Stopping {
                return;
            }
            self.shared.set_mode(Mode::Stopping);
            mem::take(&mut *workers)
        };
        debug!("pool stopping: releasing {} worker queue(s)", handles.len());
        // Dropping the producer halves disconnects every queue, which
        // interrupts each worker's own blocked take.
        drop(handles);
    }

    /// Number of live workers.
    pub fn worker_count(&self) -> usize {
        self.shared.workers.lock().unwrap().len()
    }

    /// Whether `shutdown` or `shutdown_now` has been called.
    pub fn is_shutdown(&self) -> bool {
        self.shared.mode() != Mode::Running
    }
}

impl Drop for WorkPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Configures the capabilities of a [`WorkPool`] before it starts.
///
/// Replacement policies must be installed here, before the pool begins
/// accepting work; once built, the pool's behavior is fixed.
pub struct Builder {
    config: PoolConfig,
    factory: Box<dyn ThreadFactory>,
    rejection: Box<dyn RejectionPolicy>,
    events: Box<dyn EventSink>,
}

impl Builder {
    /// Starts a builder with the default capabilities.
    pub fn new(config: PoolConfig) -> Builder {
        Builder {
            config,
            factory: Box::new(OsThreadFactory),
            rejection: Box::new(DiscardPolicy),
            events: Box::new(LogSink),
        }
    }

    /// Replaces the thread-creation capability.
    pub fn thread_factory(mut self, factory: impl ThreadFactory) -> Builder {
        self.factory = Box::new(factory);
        self
    }

    /// Replaces the saturation handler.
    pub fn rejection_policy(mut self, policy: impl RejectionPolicy) -> Builder {
        self.rejection = Box::new(policy);
        self
    }

    /// Replaces the lifecycle-event sink.
    pub fn event_sink(mut self, sink: impl EventSink) -> Builder {
        self.events = Box::new(sink);
        self
    }

    /// Validates the configuration and spawns the core workers.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a core
    /// worker thread cannot be spawned.
    pub fn build(self) -> Result<WorkPool> {
        self.config.validate()?;
        let shared = Arc::new(Shared {
            config: self.config,
            workers: Mutex::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            mode: AtomicU8::new(Mode::Running as u8),
            next_id: AtomicUsize::new(1),
            factory: self.factory,
            rejection: self.rejection,
            events: self.events,
        });

        let mut created = Vec::new();
        let spawned = {
            let mut workers = shared.workers.lock().unwrap();
            (0..shared.config.core_pool_size).try_for_each(|_| {
                let index = add_worker(&shared, &mut workers)?;
                created.push(workers[index].id);
                Ok(())
            })
        };
        if let Err(e) = spawned {
            // Stop any workers that did start before reporting failure.
            shared.set_mode(Mode::Stopping);
            shared.workers.lock().unwrap().clear();
            return Err(e);
        }
        for id in created {
            shared.events.emit(PoolEvent::WorkerCreated { worker: id });
        }
        Ok(WorkPool { shared })
    }
}
