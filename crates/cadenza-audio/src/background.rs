//! Reference-counted "keep running while suspended" lease.
//!
//! The host grants at most one background task at a time on our behalf.
//! Nested [`BackgroundLease::begin`] calls share it, and it is handed back
//! when the last [`BackgroundTask`] ends or the host expires it. Every
//! host call goes through one [`SerialQueue`].

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crate::dispatch::SerialQueue;
use cadenza_core::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identifier the host assigns to a granted background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostTaskId(pub u64);

/// Callback the host invokes when it expires a grant on its own.
pub type ExpirationHandler = Box<dyn FnOnce() + Send + 'static>;

/// Host operating system API for background execution.
pub trait BackgroundHost: Send + Sync + 'static {
    /// Request a grant; `None` means the host refused.
    fn begin_task(&self, name: &str, on_expire: ExpirationHandler) -> Option<HostTaskId>;

    /// Hand a grant back.
    fn end_task(&self, id: HostTaskId);

    /// Time left before the host suspends the process.
    fn background_time_remaining(&self) -> Duration;
}

/// Host without background execution; every request is refused.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHost;

impl BackgroundHost for NoopHost {
    fn begin_task(&self, _name: &str, _on_expire: ExpirationHandler) -> Option<HostTaskId> {
        None
    }

    fn end_task(&self, _id: HostTaskId) {}

    fn background_time_remaining(&self) -> Duration {
        Duration::MAX
    }
}

/// Counters for lease activity, split by how grants ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeaseStats {
    pub granted: u64,
    pub refused: u64,
    pub ended: u64,
    pub expired: u64,
}

#[derive(Debug)]
struct Grant {
    lease_id: u64,
    host_id: HostTaskId,
    holders: usize,
}

#[derive(Debug, Default)]
struct LeaseState {
    grant: Option<Grant>,
    suspended: bool,
    stats: LeaseStats,
}

struct LeaseInner {
    host: Arc<dyn BackgroundHost>,
    queue: SerialQueue,
    state: Mutex<LeaseState>,
    next_lease_id: AtomicU64,
}

impl LeaseInner {
    /// Runs on the queue.
    fn acquire(self: &Arc<Self>, reason: &str) -> Option<u64> {
        let mut state = self.state.lock();

        if let Some(grant) = state.grant.as_mut() {
            grant.holders += 1;
            debug!(
                lease = grant.lease_id,
                holders = grant.holders,
                "Reusing background task for [{reason}]"
            );
            return Some(grant.lease_id);
        }

        let lease_id = self.next_lease_id.fetch_add(1, Ordering::Relaxed);
        let weak = Arc::downgrade(self);
        let on_expire: ExpirationHandler = Box::new(move || Self::schedule_expiry(&weak, lease_id));

        let remaining = self.host.background_time_remaining();
        let Some(host_id) = self.host.begin_task(reason, on_expire) else {
            state.stats.refused += 1;
            warn!("Background task refused by host for [{reason}]");
            return None;
        };

        state.grant = Some(Grant {
            lease_id,
            host_id,
            holders: 1,
        });
        state.stats.granted += 1;
        info!(
            lease = lease_id,
            host_task = host_id.0,
            "Begin background task [{reason}], remaining: {remaining:?}"
        );
        Some(lease_id)
    }

    /// Runs on the queue.
    fn release(&self, lease_id: u64) {
        let mut state = self.state.lock();
        let Some(grant) = state.grant.as_mut().filter(|g| g.lease_id == lease_id) else {
            debug!(lease = lease_id, "Ignoring end of stale background task");
            return;
        };

        grant.holders -= 1;
        if grant.holders > 0 {
            debug!(lease = lease_id, holders = grant.holders, "Background task still held");
            return;
        }

        let host_id = grant.host_id;
        state.grant = None;
        state.stats.ended += 1;
        drop(state);

        self.host.end_task(host_id);
        info!(
            lease = lease_id,
            host_task = host_id.0,
            "End background task, remaining: {:?}",
            self.host.background_time_remaining()
        );
    }

    /// Runs on the queue.
    fn expire(&self, lease_id: u64) {
        let mut state = self.state.lock();
        let Some(grant) = state.grant.take_if(|g| g.lease_id == lease_id) else {
            return;
        };
        state.stats.expired += 1;
        drop(state);

        self.host.end_task(grant.host_id);
        warn!(
            lease = lease_id,
            host_task = grant.host_id.0,
            holders = grant.holders,
            expired = true,
            "Background task expired by host"
        );
    }

    fn schedule_expiry(weak: &Weak<Self>, lease_id: u64) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let target = inner.clone();
        if let Err(e) = inner.queue.async_run(move || target.expire(lease_id)) {
            warn!("Could not process background expiry: {e}");
        }
    }
}

impl Drop for LeaseInner {
    fn drop(&mut self) {
        if let Some(grant) = self.state.get_mut().grant.take() {
            warn!(lease = grant.lease_id, "Lease registry dropped with an active grant");
            let host = self.host.clone();
            if let Err(e) = self.queue.async_run(move || host.end_task(grant.host_id)) {
                warn!("Could not hand back background task: {e}");
            }
        }
    }
}

/// Registry of the shared background grant.
#[derive(Clone)]
pub struct BackgroundLease {
    inner: Arc<LeaseInner>,
}

impl BackgroundLease {
    pub fn new(host: Arc<dyn BackgroundHost>, queue: SerialQueue) -> Self {
        Self {
            inner: Arc::new(LeaseInner {
                host,
                queue,
                state: Mutex::new(LeaseState::default()),
                next_lease_id: AtomicU64::new(1),
            }),
        }
    }

    /// Request (or join) the background grant.
    ///
    /// `Ok(None)` means the host refused; playback can continue in the
    /// foreground only.
    pub fn begin(&self, reason: &str) -> Result<Option<BackgroundTask>> {
        let inner = self.inner.clone();
        let reason = reason.to_string();
        let lease_id = self.inner.queue.sync_run(move || inner.acquire(&reason))?;

        Ok(lease_id.map(|lease_id| BackgroundTask {
            lease_id,
            registry: Arc::downgrade(&self.inner),
            ended: false,
        }))
    }

    /// Whether a host grant is currently held.
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().grant.is_some()
    }

    /// Outstanding tokens sharing the current grant.
    pub fn holders(&self) -> usize {
        self.inner
            .state
            .lock()
            .grant
            .as_ref()
            .map_or(0, |grant| grant.holders)
    }

    pub fn stats(&self) -> LeaseStats {
        self.inner.state.lock().stats
    }

    pub fn is_suspended(&self) -> bool {
        self.inner.state.lock().suspended
    }

    /// Host notification: the application is about to be suspended.
    pub fn application_will_suspend(&self) {
        let inner = self.inner.clone();
        let recorded = self.inner.queue.sync_run(move || {
            let remaining = inner.host.background_time_remaining();
            let mut state = inner.state.lock();
            state.suspended = true;
            info!(
                active = state.grant.is_some(),
                "Application suspending, remaining: {remaining:?}"
            );
        });
        if let Err(e) = recorded {
            warn!("Could not record application suspend: {e}");
        }
    }

    /// Host notification: the application returned to the foreground.
    pub fn application_did_resume(&self) {
        self.inner.state.lock().suspended = false;
        info!("Application resumed");
    }
}

impl std::fmt::Debug for BackgroundLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundLease")
            .field("state", &*self.inner.state.lock())
            .finish_non_exhaustive()
    }
}

/// One holder's share of the background grant.
///
/// Ends explicitly through [`end`](Self::end) or when dropped.
#[derive(Debug)]
pub struct BackgroundTask {
    lease_id: u64,
    registry: Weak<LeaseInner>,
    ended: bool,
}

impl BackgroundTask {
    pub const fn lease_id(&self) -> u64 {
        self.lease_id
    }

    /// Give up this share. Later calls do nothing.
    pub fn end(&mut self) {
        if std::mem::replace(&mut self.ended, true) {
            return;
        }
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        let lease_id = self.lease_id;
        let target = inner.clone();
        if let Err(e) = inner.queue.sync_run(move || target.release(lease_id)) {
            warn!("Could not end background task: {e}");
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.end();
    }
}
