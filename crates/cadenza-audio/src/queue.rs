//! Dual-lane playback entry scheduler.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use cadenza_core::{AudioEntry, AudioEntryId, QueueLane};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::trace;

#[derive(Debug, Default)]
struct Lanes {
    buffering: VecDeque<AudioEntry>,
    upcoming: VecDeque<AudioEntry>,
}

impl Lanes {
    fn lane(&self, lane: QueueLane) -> &VecDeque<AudioEntry> {
        match lane {
            QueueLane::Buffering => &self.buffering,
            QueueLane::Upcoming => &self.upcoming,
        }
    }

    fn lane_mut(&mut self, lane: QueueLane) -> &mut VecDeque<AudioEntry> {
        match lane {
            QueueLane::Buffering => &mut self.buffering,
            QueueLane::Upcoming => &mut self.upcoming,
        }
    }

    fn ids(&self) -> Vec<AudioEntryId> {
        QueueLane::ALL
            .iter()
            .flat_map(|&lane| self.lane(lane).iter().map(|entry| entry.id.clone()))
            .collect()
    }
}

/// Two independent FIFO lanes of entries behind one lock.
///
/// Every operation is safe to call from any thread without external
/// locking, and none of them block waiting for entries to appear.
/// Within a lane, `enqueue` is FIFO while `skip` pushes to the head, so
/// the most recently skipped batch always comes out first.
#[derive(Debug, Default)]
pub struct EntryScheduler {
    lanes: Mutex<Lanes>,
}

impl EntryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry` to the tail of `lane`.
    pub fn enqueue(&self, entry: AudioEntry, lane: QueueLane) {
        trace!("Enqueue {} on {lane:?}", entry.id);
        self.lanes.lock().lane_mut(lane).push_back(entry);
    }

    /// Insert `entry` at the head of `lane`.
    pub fn skip(&self, entry: AudioEntry, lane: QueueLane) {
        trace!("Skip {} onto {lane:?}", entry.id);
        self.lanes.lock().lane_mut(lane).push_front(entry);
    }

    /// Insert `entries` at the head of `lane`, keeping their relative order.
    pub fn skip_all(&self, entries: Vec<AudioEntry>, lane: QueueLane) {
        let mut lanes = self.lanes.lock();
        let queue = lanes.lane_mut(lane);
        for entry in entries.into_iter().rev() {
            queue.push_front(entry);
        }
    }

    /// Pop the head of `lane`.
    pub fn dequeue(&self, lane: QueueLane) -> Option<AudioEntry> {
        self.lanes.lock().lane_mut(lane).pop_front()
    }

    /// Move the head of `from` to the tail of `to` in one step.
    pub fn promote(&self, from: QueueLane, to: QueueLane) -> Option<AudioEntryId> {
        let mut lanes = self.lanes.lock();
        let entry = lanes.lane_mut(from).pop_front()?;
        let id = entry.id.clone();
        lanes.lane_mut(to).push_back(entry);
        Some(id)
    }

    /// Id of the head of `lane` without removing it.
    pub fn peek_id(&self, lane: QueueLane) -> Option<AudioEntryId> {
        self.lanes.lock().lane(lane).front().map(|entry| entry.id.clone())
    }

    /// Clear exactly `lane`.
    pub fn remove_all(&self, lane: QueueLane) {
        self.lanes.lock().lane_mut(lane).clear();
    }

    /// Clear both lanes, returning the ids that were pending.
    pub fn drain_all(&self) -> Vec<AudioEntryId> {
        let mut lanes = self.lanes.lock();
        let ids = lanes.ids();
        lanes.buffering.clear();
        lanes.upcoming.clear();
        ids
    }

    /// Total entries across both lanes.
    pub fn count(&self) -> usize {
        let lanes = self.lanes.lock();
        lanes.buffering.len() + lanes.upcoming.len()
    }

    pub fn count_for(&self, lane: QueueLane) -> usize {
        self.lanes.lock().lane(lane).len()
    }

    /// Ids of every pending entry: the upcoming lane in queue order, then
    /// the buffering lane in queue order.
    pub fn pending_entries_id(&self) -> Vec<AudioEntryId> {
        self.lanes.lock().ids()
    }

    pub fn is_empty(&self) -> bool {
        let lanes = self.lanes.lock();
        lanes.buffering.is_empty() && lanes.upcoming.is_empty()
    }
}
