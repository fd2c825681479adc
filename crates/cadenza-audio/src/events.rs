//! Collaborator inputs and observer notifications.

use cadenza_core::{AudioEntryId, OutputFormat, PlayerError, PublicState, StopReason};
use std::collections::HashMap;

/// Signals from the bitstream parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserEvent {
    ReadyToProducePackets,
    /// The stream's format has been determined.
    FormatKnown(OutputFormat),
    /// Parsed packets are ready for the decoder.
    PacketsAvailable(usize),
    /// Raw parser status code.
    ParseError(i32),
}

/// Signals from the hardware decode/render path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderEvent {
    Started,
    Stalled,
    Finished(StopReason),
    EngineFailure,
}

/// Audio session interruption notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Began,
    Ended { should_resume: bool },
}

/// Why the audio output route changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteChangeReason {
    /// Headphones unplugged or the output device went away.
    OldDeviceUnavailable,
    NewDeviceAvailable,
    Other,
}

/// Events emitted to player observers.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerNotification {
    /// Public state changed. Only sent when the state actually differs.
    StateChanged {
        previous: PublicState,
        current: PublicState,
    },
    WillStartPlaying(AudioEntryId),
    DidStartPlaying(AudioEntryId),
    DidFinishBuffering(AudioEntryId),
    DidFinishPlaying {
        id: AudioEntryId,
        stop_reason: StopReason,
        progress: f64,
        duration: f64,
    },
    /// Entries dropped from the queue before they played.
    DidCancel(Vec<AudioEntryId>),
    UnexpectedError(PlayerError),
    /// Stream metadata passed through unchanged.
    Metadata(HashMap<String, String>),
    /// Periodic progress of the current entry, in seconds.
    Progress { id: AudioEntryId, seconds: f64 },
}
