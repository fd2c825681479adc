//! Serial execution contexts.
//!
//! A [`SerialQueue`] owns one named worker thread and runs submitted jobs
//! on it one at a time, in submission order. Host API calls and timer
//! callbacks are funneled through queues so they never race each other.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use cadenza_core::{Error, Result};
use crossbeam_channel::{bounded, unbounded, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueueInner {
    label: String,
    job_tx: Sender<Job>,
    worker: ThreadId,
}

/// Cloneable handle to a single-threaded job executor.
///
/// The worker exits once every handle is dropped and the pending jobs have
/// run. Jobs that capture a handle to their own queue keep it alive.
#[derive(Clone)]
pub struct SerialQueue {
    inner: Arc<QueueInner>,
}

impl SerialQueue {
    /// Spawn a worker thread named `label`.
    pub fn new(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        let (job_tx, job_rx) = unbounded::<Job>();

        let thread_label = label.clone();
        let handle = thread::Builder::new()
            .name(label.clone())
            .spawn(move || {
                debug!("Serial queue {thread_label} started");
                while let Ok(job) = job_rx.recv() {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!("Job panicked on serial queue {thread_label}");
                    }
                }
                debug!("Serial queue {thread_label} stopped");
            })
            .map_err(|e| Error::Dispatch(format!("Failed to spawn {label}: {e}")))?;

        let worker = handle.thread().id();

        Ok(Self {
            inner: Arc::new(QueueInner {
                label,
                job_tx,
                worker,
            }),
        })
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Whether the calling thread is this queue's worker.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.worker
    }

    /// Submit `job` without waiting for it.
    pub fn async_run<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner
            .job_tx
            .send(Box::new(job))
            .map_err(|_| Error::Dispatch(format!("Serial queue {} is gone", self.inner.label)))
    }

    /// Run `job` on the queue and wait for its result.
    ///
    /// Runs inline when already on the queue, so nested calls don't deadlock.
    pub fn sync_run<R, F>(&self, job: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_current() {
            return Ok(job());
        }

        let (result_tx, result_rx) = bounded(1);
        self.async_run(move || {
            let _ = result_tx.send(job());
        })?;

        result_rx.recv().map_err(|_| {
            Error::Dispatch(format!(
                "Job on serial queue {} did not complete",
                self.inner.label
            ))
        })
    }
}

impl std::fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue")
            .field("label", &self.inner.label)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_jobs_run_in_order_on_worker() {
        let queue = SerialQueue::new("test.order").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..50 {
            let seen = seen.clone();
            let probe = queue.clone();
            queue
                .async_run(move || {
                    assert!(probe.is_current());
                    seen.lock().push(i);
                })
                .unwrap();
        }

        queue.sync_run(|| ()).unwrap();
        assert_eq!(*seen.lock(), (0..50).collect::<Vec<_>>());
        assert!(!queue.is_current());
    }

    #[test]
    fn test_sync_run_returns_value_and_nests() {
        let queue = SerialQueue::new("test.nested").unwrap();
        let inner = queue.clone();
        let value = queue
            .sync_run(move || inner.sync_run(|| 21).unwrap() * 2)
            .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let queue = SerialQueue::new("test.panic").unwrap();
        queue.async_run(|| panic!("boom")).unwrap();
        assert_eq!(queue.sync_run(|| 7).unwrap(), 7);
        assert_eq!(queue.label(), "test.panic");
    }
}
