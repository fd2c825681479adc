//! Repeating callback bound to a serial queue.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crate::dispatch::SerialQueue;
use crossbeam_channel::{bounded, select, tick, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

type Handler = Arc<dyn Fn() + Send + Sync + 'static>;

struct TimerShared {
    handler: Mutex<Option<Handler>>,
    /// Bumped on every activation and suspension; stale fires compare against it.
    generation: AtomicU64,
    /// Set while a fire is queued but not yet run, to coalesce slow handlers.
    fire_pending: AtomicBool,
}

/// Periodic timer whose handler always runs on one [`SerialQueue`].
///
/// Starts suspended. Fires never overlap because they share the queue,
/// and once [`suspend`](Self::suspend) returns no new fire is started.
pub struct PeriodicTimer {
    interval: Duration,
    queue: SerialQueue,
    shared: Arc<TimerShared>,
    /// Dropping the sender stops the ticker thread.
    ticker: Mutex<Option<Sender<()>>>,
}

impl PeriodicTimer {
    pub fn new(interval: Duration, queue: SerialQueue) -> Self {
        Self {
            interval,
            queue,
            shared: Arc::new(TimerShared {
                handler: Mutex::new(None),
                generation: AtomicU64::new(0),
                fire_pending: AtomicBool::new(false),
            }),
            ticker: Mutex::new(None),
        }
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.ticker.lock().is_some()
    }

    /// Install the fire callback, replacing any previous one.
    pub fn add_handler<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.shared.handler.lock() = Some(Arc::new(handler));
    }

    /// Detach the callback without changing the running state.
    pub fn remove_handler(&self) {
        *self.shared.handler.lock() = None;
    }

    /// Start firing. No-op when already active.
    pub fn activate(&self) {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            return;
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let interval = self.interval;
        let queue = self.queue.clone();
        let shared = self.shared.clone();

        let spawned = thread::Builder::new()
            .name(format!("{}.timer", queue.label()))
            .spawn(move || {
                let ticks = tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticks) -> _ => {
                            if !Self::dispatch_fire(&queue, &shared, generation) {
                                break;
                            }
                        }
                    }
                }
                trace!("Timer ticker for generation {generation} exited");
            });

        match spawned {
            Ok(_) => {
                debug!("Timer activated every {:?} on {}", self.interval, self.queue.label());
                *ticker = Some(stop_tx);
            }
            Err(e) => warn!("Failed to start timer thread: {e}"),
        }
    }

    /// Stop firing. Idempotent.
    pub fn suspend(&self) {
        if self.ticker.lock().take().is_some() {
            self.shared.generation.fetch_add(1, Ordering::AcqRel);
            debug!("Timer suspended on {}", self.queue.label());
        }
    }

    /// Queue one fire unless a previous one is still waiting.
    ///
    /// Returns false once the queue is gone.
    fn dispatch_fire(queue: &SerialQueue, shared: &Arc<TimerShared>, generation: u64) -> bool {
        if shared.fire_pending.swap(true, Ordering::AcqRel) {
            return true;
        }

        let shared = shared.clone();
        let queued = queue.async_run(move || {
            shared.fire_pending.store(false, Ordering::Release);
            if shared.generation.load(Ordering::Acquire) != generation {
                return;
            }
            let handler = shared.handler.lock().clone();
            if let Some(handler) = handler {
                handler();
            }
        });
        queued.is_ok()
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.suspend();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn timer(label: &str) -> (PeriodicTimer, SerialQueue) {
        let queue = SerialQueue::new(label).unwrap();
        (PeriodicTimer::new(Duration::from_millis(10), queue.clone()), queue)
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_activate_and_suspend() {
        let (timer, _queue) = timer("test.timer.state");
        assert!(!timer.is_running());

        timer.activate();
        assert!(timer.is_running());
        timer.activate();
        assert!(timer.is_running());

        timer.suspend();
        assert!(!timer.is_running());
        timer.suspend();
        assert!(!timer.is_running());
    }

    #[test]
    fn test_handler_runs_on_bound_queue() {
        let (timer, queue) = timer("test.timer.queue");
        let on_queue = Arc::new(AtomicBool::new(false));

        let flag = on_queue.clone();
        let probe = queue.clone();
        timer.add_handler(move || {
            if probe.is_current() {
                flag.store(true, Ordering::SeqCst);
            }
        });
        timer.activate();

        assert!(wait_until(|| on_queue.load(Ordering::SeqCst)));
        timer.suspend();
    }

    #[test]
    fn test_no_fires_after_suspend() {
        let (timer, queue) = timer("test.timer.suspend");
        let fires = Arc::new(AtomicUsize::new(0));

        let counter = fires.clone();
        timer.add_handler(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        timer.activate();
        assert!(wait_until(|| fires.load(Ordering::SeqCst) > 0));

        timer.suspend();
        queue.sync_run(|| ()).unwrap();
        let after_suspend = fires.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        queue.sync_run(|| ()).unwrap();
        assert_eq!(fires.load(Ordering::SeqCst), after_suspend);
    }

    #[test]
    fn test_latest_handler_wins_and_remove_detaches() {
        let (timer, queue) = timer("test.timer.replace");
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        timer.add_handler(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = second.clone();
        timer.add_handler(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        timer.activate();

        assert!(wait_until(|| second.load(Ordering::SeqCst) > 0));
        assert_eq!(first.load(Ordering::SeqCst), 0);

        timer.remove_handler();
        queue.sync_run(|| ()).unwrap();
        let after_remove = second.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(second.load(Ordering::SeqCst), after_remove);
        assert!(timer.is_running());
    }
}
