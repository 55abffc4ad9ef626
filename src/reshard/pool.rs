//! Bounded worker pools.
//!
//! Plain OS threads fed over a bounded channel; no cooperative scheduling
//! is involved. Submission blocks once the queue is full. Task failures
//! land in a shared first-error slot, and [`WorkerPool::join`] drains the
//! queue, stops the workers, and reports that first error.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;

use crate::{Result, RestripeError};

type Task = Box<dyn FnOnce() -> Result<()> + Send + 'static>;
type ErrorSlot = Arc<Mutex<Option<RestripeError>>>;

/// Records `err` if it is the first failure the pool has seen.
fn record(slot: &ErrorSlot, err: RestripeError) {
    let mut guard = slot.lock();
    if guard.is_none() {
        *guard = Some(err);
    } else {
        log::debug!("dropping follow-up worker error: {}", err);
    }
}

/// Cloneable task entry point for a [`WorkerPool`].
///
/// Every clone keeps the queue alive; workers stop only after the pool and
/// all of its submitters are gone.
#[derive(Clone)]
pub struct TaskSubmitter {
    sender: Sender<Task>,
    errors: ErrorSlot,
    name: &'static str,
}

impl TaskSubmitter {
    /// Queues `task`, blocking while the queue is full.
    ///
    /// Each task is handed to exactly one worker and never resubmitted. If
    /// the pool has already stopped, the task is dropped and the failure
    /// recorded.
    pub fn submit(&self, task: impl FnOnce() -> Result<()> + Send + 'static) {
        if self.sender.send(Box::new(task)).is_err() {
            record(
                &self.errors,
                RestripeError::WorkerPanic(format!("{} pool stopped accepting work", self.name)),
            );
        }
    }
}

/// Fixed-size pool of worker threads consuming one bounded queue.
pub struct WorkerPool {
    tasks: TaskSubmitter,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` named threads behind a queue `queue_depth` deep.
    pub fn new(name: &'static str, workers: usize, queue_depth: usize) -> Result<Self> {
        let (sender, receiver) = bounded::<Task>(queue_depth);
        let errors: ErrorSlot = Arc::new(Mutex::new(None));

        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let receiver = receiver.clone();
            let errors = Arc::clone(&errors);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", name, i))
                .spawn(move || {
                    while let Ok(task) = receiver.recv() {
                        if let Err(e) = task() {
                            record(&errors, e);
                        }
                    }
                })?;
            handles.push(handle);
        }

        Ok(Self {
            tasks: TaskSubmitter {
                sender,
                errors,
                name,
            },
            workers: handles,
        })
    }

    /// Queues `task` on this pool. See [`TaskSubmitter::submit`].
    pub fn execute(&self, task: impl FnOnce() -> Result<()> + Send + 'static) {
        self.tasks.submit(task);
    }

    /// A cloneable handle tasks running in other pools can submit through.
    pub fn submitter(&self) -> TaskSubmitter {
        self.tasks.clone()
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Closes the queue, waits for every queued task, and reports the
    /// first failure. A panicking worker surfaces as an error here, not as
    /// a panic.
    pub fn join(self) -> Result<()> {
        let WorkerPool { tasks, workers } = self;
        let TaskSubmitter { sender, errors, name } = tasks;
        drop(sender);

        let mut panicked = 0usize;
        for handle in workers {
            if handle.join().is_err() {
                panicked += 1;
            }
        }

        if let Some(err) = errors.lock().take() {
            return Err(err);
        }
        if panicked > 0 {
            return Err(RestripeError::WorkerPanic(format!(
                "{} worker(s) in the {} pool panicked",
                panicked, name
            )));
        }
        Ok(())
    }
}
