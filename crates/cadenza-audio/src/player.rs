//! Player controller coordinating the scheduler, state machine, and timers.

use crate::background::{BackgroundHost, BackgroundLease, BackgroundTask, NoopHost};
use crate::buffer::ByteCursorBuffer;
use crate::dispatch::SerialQueue;
use crate::events::{Interruption, ParserEvent, PlayerNotification, RenderEvent, RouteChangeReason};
use crate::queue::EntryScheduler;
use crate::state::{project, transition, InternalState, StateEvent};
use crate::sync::{BiMap, ProtectedValue};
use crate::timer::PeriodicTimer;
use bytes::Bytes;
use cadenza_core::{
    AudioEntry, AudioEntryId, AudioSystemError, BufferError, FileStreamError, OutputFormat,
    PlayerConfig, PlayerError, PublicState, QueueLane, Result, StopReason,
};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Opaque handle the decoder collaborator uses for one decode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecoderHandle(pub u64);

/// The entry currently handed to the decoder.
#[derive(Debug, Clone)]
struct Playback {
    id: AudioEntryId,
    format: OutputFormat,
    frames_rendered: u64,
    duration: Option<f64>,
}

impl Playback {
    fn progress(&self) -> f64 {
        self.format.frames_to_seconds(self.frames_rendered)
    }
}

/// State shared with the progress timer.
struct PlayerShared {
    entries: EntryScheduler,
    state: ProtectedValue<InternalState>,
    stop_reason: ProtectedValue<StopReason>,
    current: ProtectedValue<Option<Playback>>,
    decoders: ProtectedValue<BiMap<DecoderHandle, AudioEntryId>>,
    landing: ProtectedValue<ByteCursorBuffer>,
    event_tx: Sender<PlayerNotification>,
}

impl PlayerShared {
    fn notify(&self, notification: PlayerNotification) {
        let _ = self.event_tx.send(notification);
    }

    /// Run `event` through the transition table and report public changes.
    fn apply(&self, event: &StateEvent) -> InternalState {
        self.state.update(|state| {
            let old = *state;
            let new = transition(old, event);
            *state = new;

            if old != new {
                debug!("State changed: {old:?} -> {new:?}");
                let (previous, _) = project(old);
                let (current, _) = project(new);
                if previous != current {
                    self.notify(PlayerNotification::StateChanged { previous, current });
                }
            } else {
                trace!("Ignoring {event:?} in {old:?}");
            }
            new
        })
    }

    /// Clear the current entry and report how it ended.
    fn finish_current(&self, stop_reason: StopReason) -> Option<AudioEntryId> {
        let playback = self.current.replace(None)?;
        if let Some(handle) = self
            .decoders
            .update(|decoders| decoders.remove_right(&playback.id))
        {
            debug!("Detached decoder {handle:?} from {}", playback.id);
        }
        self.notify(PlayerNotification::DidFinishPlaying {
            id: playback.id.clone(),
            stop_reason,
            progress: playback.progress(),
            duration: playback.duration.unwrap_or(0.0),
        });
        Some(playback.id)
    }

    fn cancel_pending(&self) {
        let cancelled = self.entries.drain_all();
        if !cancelled.is_empty() {
            info!("Cancelled {} pending entries", cancelled.len());
            self.notify(PlayerNotification::DidCancel(cancelled));
        }
    }

    fn report_progress(&self) {
        if self.state.read() != InternalState::Playing {
            return;
        }
        let progress = self
            .current
            .with(|current| current.as_ref().map(|p| (p.id.clone(), p.progress())));
        if let Some((id, seconds)) = progress {
            self.notify(PlayerNotification::Progress { id, seconds });
        }
    }
}

/// Control plane of the streaming player.
///
/// All methods take `&self` and may be called from any collaborator
/// thread. Observers read [`PlayerNotification`]s from the event channel.
pub struct AudioPlayer {
    config: PlayerConfig,
    shared: Arc<PlayerShared>,
    event_rx: Receiver<PlayerNotification>,
    progress_timer: PeriodicTimer,
    background: BackgroundLease,
    lease: Mutex<Option<BackgroundTask>>,
}

impl AudioPlayer {
    /// Create a player without background execution support.
    pub fn new(config: PlayerConfig) -> Result<Self> {
        Self::with_host(config, Arc::new(NoopHost))
    }

    /// Create a player that requests background time from `host`.
    pub fn with_host(config: PlayerConfig, host: Arc<dyn BackgroundHost>) -> Result<Self> {
        config.validate()?;

        let (event_tx, event_rx) = unbounded();
        let shared = Arc::new(PlayerShared {
            entries: EntryScheduler::new(),
            state: ProtectedValue::new(InternalState::Initial),
            stop_reason: ProtectedValue::new(StopReason::None),
            current: ProtectedValue::new(None),
            decoders: ProtectedValue::new(BiMap::new()),
            landing: ProtectedValue::new(ByteCursorBuffer::new(config.buffer_capacity)),
            event_tx,
        });

        let player_queue = SerialQueue::new("cadenza.player")?;
        let host_queue = SerialQueue::new("cadenza.background")?;

        let progress_timer = PeriodicTimer::new(config.progress_interval(), player_queue);
        let timer_shared = shared.clone();
        progress_timer.add_handler(move || timer_shared.report_progress());

        info!(
            "Player created, progress every {:?}",
            config.progress_interval()
        );

        Ok(Self {
            background: BackgroundLease::new(host, host_queue),
            config,
            shared,
            event_rx,
            progress_timer,
            lease: Mutex::new(None),
        })
    }

    pub const fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn internal_state(&self) -> InternalState {
        self.shared.state.read()
    }

    /// Current public state.
    pub fn state(&self) -> PublicState {
        project(self.internal_state()).0
    }

    /// Why playback last stopped.
    ///
    /// States with an inherent reason report it; stopped states report the
    /// reason recorded when playback ended.
    pub fn stop_reason(&self) -> StopReason {
        project(self.internal_state())
            .1
            .unwrap_or_else(|| self.shared.stop_reason.read())
    }

    pub fn entries(&self) -> &EntryScheduler {
        &self.shared.entries
    }

    pub const fn background(&self) -> &BackgroundLease {
        &self.background
    }

    /// Id of the entry handed to the decoder, if any.
    pub fn current_entry(&self) -> Option<AudioEntryId> {
        self.shared
            .current
            .with(|current| current.as_ref().map(|p| p.id.clone()))
    }

    /// Seconds rendered of the current entry.
    pub fn progress(&self) -> Option<f64> {
        self.shared
            .current
            .with(|current| current.as_ref().map(Playback::progress))
    }

    // Observer channel

    /// Try to receive a notification without blocking.
    pub fn try_recv_notification(&self) -> Option<PlayerNotification> {
        self.event_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next notification.
    pub fn recv_notification_timeout(&self, timeout: Duration) -> Option<PlayerNotification> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(notification) => Some(notification),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Another handle to the notification channel.
    pub fn notifications(&self) -> Receiver<PlayerNotification> {
        self.event_rx.clone()
    }

    // User actions

    /// Replace everything with `entry` and start it.
    pub fn play(&self, entry: AudioEntry) {
        if self.is_disposed() {
            warn!("Ignoring play of {} on a disposed player", entry.id);
            return;
        }
        info!("Play {}", entry.source.describe());
        self.shared.cancel_pending();
        self.shared.finish_current(StopReason::UserAction);
        self.shared.entries.enqueue(entry, QueueLane::Upcoming);
        self.start_session();
    }

    /// Append `entry` after everything already queued.
    pub fn queue(&self, entry: AudioEntry) {
        if self.is_disposed() {
            warn!("Ignoring queue of {} on a disposed player", entry.id);
            return;
        }
        debug!("Queue {}", entry.id);
        self.shared.entries.enqueue(entry, QueueLane::Upcoming);
        if matches!(
            self.internal_state(),
            InternalState::Initial | InternalState::Stopped | InternalState::Error
        ) {
            self.start_session();
        }
    }

    /// Put `entries` ahead of everything already queued, in order.
    pub fn queue_next(&self, entries: Vec<AudioEntry>) {
        if self.is_disposed() {
            warn!("Ignoring {} entries on a disposed player", entries.len());
            return;
        }
        debug!("Queue {} entries next", entries.len());
        self.shared.entries.skip_all(entries, QueueLane::Upcoming);
    }

    pub fn pause(&self) {
        self.shared.apply(&StateEvent::Pause);
    }

    pub fn resume(&self) {
        if self.shared.apply(&StateEvent::Resume) == InternalState::Playing {
            self.progress_timer.activate();
        }
    }

    /// Jump within the current entry.
    pub fn seek(&self, seconds: f64) {
        let moved = self.shared.current.update(|current| {
            let Some(playback) = current.as_mut() else {
                return false;
            };
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let frames = (seconds.max(0.0) * f64::from(playback.format.sample_rate)) as u64;
            playback.frames_rendered = frames;
            true
        });
        if moved {
            debug!("Seeking to {seconds:.2} seconds");
            self.shared.apply(&StateEvent::SeekRequested);
        }
    }

    /// Stop playback and drop every queued entry.
    pub fn stop(&self) {
        self.end_session(StopReason::UserAction, &StateEvent::Stop);
    }

    /// Stop and refuse every later event.
    pub fn dispose(&self) {
        self.end_session(StopReason::Disposed, &StateEvent::Dispose);
        self.shared.decoders.write(BiMap::clear);
        self.progress_timer.remove_handler();
        info!("Player disposed");
    }

    // Scheduling

    /// Move the next upcoming entry into the buffering lane.
    pub fn advance(&self) -> Option<AudioEntryId> {
        let id = self
            .shared
            .entries
            .promote(QueueLane::Upcoming, QueueLane::Buffering)?;
        self.shared
            .notify(PlayerNotification::WillStartPlaying(id.clone()));
        Some(id)
    }

    /// Hand the head of the buffering lane to the decoder.
    pub fn take_for_decode(&self) -> Option<AudioEntry> {
        let entry = self.shared.entries.dequeue(QueueLane::Buffering)?;
        self.shared.current.write(|current| {
            *current = Some(Playback {
                id: entry.id.clone(),
                format: entry.output_format,
                frames_rendered: 0,
                duration: None,
            });
        });
        self.shared.landing.write(ByteCursorBuffer::clear);
        Some(entry)
    }

    /// The decoder has all data for `id`.
    pub fn finish_buffering(&self, id: &AudioEntryId) {
        self.shared
            .notify(PlayerNotification::DidFinishBuffering(id.clone()));
        self.shared.apply(&StateEvent::BufferingFinished);
    }

    /// The current entry ended on its own.
    pub fn finish_playing(&self, stop_reason: StopReason) {
        let state = self.internal_state();
        if !state.is_active() {
            debug!("Ignoring finish ({stop_reason:?}) in {state:?}");
            return;
        }
        self.shared.finish_current(stop_reason);

        if self.shared.entries.is_empty() {
            self.shared.stop_reason.write(|reason| *reason = stop_reason);
            self.shared.apply(&StateEvent::EntryFinished);
            self.pause_services();
        } else {
            self.shared.apply(&StateEvent::PendingNext);
        }
    }

    // Collaborator input

    /// Land raw bytes from the network or file reader.
    pub fn push_bytes(&self, data: &[u8]) -> std::result::Result<(), BufferError> {
        self.shared.landing.update(|buffer| buffer.write_bytes(data))
    }

    /// Take every landed byte for the bitstream parser.
    pub fn drain_bytes(&self) -> Bytes {
        self.shared.landing.update(|buffer| {
            let len = buffer.len();
            buffer.rewind();
            let data = buffer.read_bytes(len).unwrap_or_default();
            buffer.clear();
            data
        })
    }

    pub fn handle_parser_event(&self, event: ParserEvent) {
        match event {
            ParserEvent::ReadyToProducePackets => debug!("Parser ready to produce packets"),
            ParserEvent::FormatKnown(format) => {
                debug!("Stream format: {format:?}");
                self.shared.current.write(|current| {
                    if let Some(playback) = current.as_mut() {
                        playback.format = format;
                    }
                });
            }
            ParserEvent::PacketsAvailable(0) => {}
            ParserEvent::PacketsAvailable(count) => {
                trace!("{count} packets available");
                match self.internal_state() {
                    InternalState::WaitingForDataAfterSeek => {
                        self.shared.apply(&StateEvent::SeekCompleted);
                    }
                    state if state.is_waiting() => {
                        self.shared.apply(&StateEvent::BufferingFinished);
                    }
                    _ => {}
                }
            }
            ParserEvent::ParseError(status) => {
                self.report_error(PlayerError::StreamParse(FileStreamError::from_status(status)));
            }
        }
    }

    pub fn handle_render_event(&self, event: RenderEvent) {
        match event {
            RenderEvent::Started => {
                if self.shared.apply(&StateEvent::RenderStarted) == InternalState::Playing {
                    if let Some(id) = self.current_entry() {
                        self.shared.notify(PlayerNotification::DidStartPlaying(id));
                    }
                    self.progress_timer.activate();
                }
            }
            RenderEvent::Stalled => {
                warn!("Renderer stalled, rebuffering");
                self.shared.apply(&StateEvent::RenderStalled);
            }
            RenderEvent::Finished(reason) => self.finish_playing(reason),
            RenderEvent::EngineFailure => {
                self.report_error(PlayerError::AudioSystem(AudioSystemError::EngineFailure));
            }
        }
    }

    /// Record frames the renderer consumed.
    pub fn report_rendered_frames(&self, frames: u64) {
        self.shared.current.write(|current| {
            if let Some(playback) = current.as_mut() {
                playback.frames_rendered += frames;
            }
        });
    }

    /// Record the total duration of the current entry.
    pub fn set_duration(&self, seconds: f64) {
        self.shared.current.write(|current| {
            if let Some(playback) = current.as_mut() {
                playback.duration = Some(seconds);
            }
        });
    }

    /// Surface a subsystem failure and end the current entry.
    ///
    /// Queued entries stay; the host decides whether to advance.
    pub fn report_error(&self, err: PlayerError) {
        error!("Playback error: {err}");
        self.shared
            .notify(PlayerNotification::UnexpectedError(err.clone()));
        self.shared.stop_reason.write(|reason| *reason = StopReason::Error);
        self.shared.finish_current(StopReason::Error);
        self.shared.apply(&StateEvent::Failure(err));
        self.pause_services();
    }

    /// Pass decoded stream metadata through to observers.
    pub fn metadata(&self, metadata: HashMap<String, String>) {
        self.shared.notify(PlayerNotification::Metadata(metadata));
    }

    // Host signals

    pub fn handle_interruption(&self, interruption: Interruption) {
        match interruption {
            Interruption::Began => {
                info!("Audio interruption began");
                self.shared.apply(&StateEvent::InterruptionBegan);
            }
            Interruption::Ended { should_resume } => {
                info!(should_resume, "Audio interruption ended");
                if self.config.resume_after_interruption {
                    self.shared
                        .apply(&StateEvent::InterruptionEnded { should_resume });
                }
            }
        }
    }

    pub fn handle_route_change(&self, reason: RouteChangeReason) {
        debug!("Audio route changed: {reason:?}");
        if reason == RouteChangeReason::OldDeviceUnavailable && self.config.pause_on_route_loss {
            self.shared.apply(&StateEvent::RouteLost);
        }
    }

    pub fn application_will_suspend(&self) {
        self.background.application_will_suspend();
    }

    pub fn application_did_resume(&self) {
        self.background.application_did_resume();
    }

    // Decoder bookkeeping

    pub fn attach_decoder(&self, handle: DecoderHandle, id: AudioEntryId) {
        self.shared.decoders.write(|decoders| decoders.insert(handle, id));
    }

    pub fn detach_decoder(&self, handle: DecoderHandle) -> Option<AudioEntryId> {
        self.shared
            .decoders
            .update(|decoders| decoders.remove_left(&handle))
    }

    pub fn entry_for_decoder(&self, handle: DecoderHandle) -> Option<AudioEntryId> {
        self.shared
            .decoders
            .with(|decoders| decoders.get_left(&handle).cloned())
    }

    pub fn decoder_for_entry(&self, id: &AudioEntryId) -> Option<DecoderHandle> {
        self.shared
            .decoders
            .with(|decoders| decoders.get_right(id).copied())
    }

    fn is_disposed(&self) -> bool {
        self.internal_state() == InternalState::Disposed
    }

    fn start_session(&self) {
        if self.is_disposed() {
            return;
        }
        self.shared.stop_reason.write(|reason| *reason = StopReason::None);
        self.shared.apply(&StateEvent::Play);
        self.begin_background("playback");
    }

    fn end_session(&self, reason: StopReason, event: &StateEvent) {
        self.shared.cancel_pending();
        self.shared.stop_reason.write(|r| *r = reason);
        self.shared.finish_current(reason);
        self.shared.apply(event);
        self.pause_services();
    }

    fn pause_services(&self) {
        self.progress_timer.suspend();
        self.end_background();
    }

    fn begin_background(&self, reason: &str) {
        let mut lease = self.lease.lock();
        if lease.is_some() {
            return;
        }
        match self.background.begin(reason) {
            Ok(Some(task)) => *lease = Some(task),
            Ok(None) => debug!("No background time granted, continuing in foreground only"),
            Err(e) => warn!("Failed to request background time: {e}"),
        }
    }

    fn end_background(&self) {
        if let Some(mut task) = self.lease.lock().take() {
            task.end();
        }
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.pause_services();
    }
}
