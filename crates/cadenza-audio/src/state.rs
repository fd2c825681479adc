//! Internal playback state, its transition table, and the public projection.

use cadenza_core::{PlayerError, PublicState, StopReason};

/// Fine-grained playback status owned by the player.
///
/// Variants mirror an additive bitmask (see [`InternalState::bits`]) where
/// several states imply `Running`. Keeping them as variants means callers
/// can never assemble an arbitrary bit combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InternalState {
    #[default]
    Initial,
    Running,
    Playing,
    Rebuffering,
    WaitingForData,
    WaitingForDataAfterSeek,
    Paused,
    Stopped,
    PendingNext,
    Disposed,
    Error,
}

const RUNNING: u32 = 1;
const PLAYING: u32 = (1 << 1) | RUNNING;
const REBUFFERING: u32 = (1 << 2) | RUNNING;
const WAITING_FOR_DATA: u32 = (1 << 3) | RUNNING;
const WAITING_FOR_DATA_AFTER_SEEK: u32 = (1 << 4) | RUNNING;
const PAUSED: u32 = (1 << 5) | RUNNING;
const STOPPED: u32 = 1 << 9;
const PENDING_NEXT: u32 = 1 << 10;
const DISPOSED: u32 = 1 << 30;
const ERROR: u32 = 1 << 31;

impl InternalState {
    /// States in which the player is waiting on data to continue.
    pub const WAITING: [Self; 3] = [
        Self::WaitingForData,
        Self::WaitingForDataAfterSeek,
        Self::Rebuffering,
    ];

    pub fn is_waiting(self) -> bool {
        Self::WAITING.contains(&self)
    }

    /// States that count as an ongoing playback session.
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Running
                | Self::Playing
                | Self::Rebuffering
                | Self::WaitingForData
                | Self::WaitingForDataAfterSeek
                | Self::PendingNext
        )
    }

    /// Bitmask encoding of this state.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Initial => 0,
            Self::Running => RUNNING,
            Self::Playing => PLAYING,
            Self::Rebuffering => REBUFFERING,
            Self::WaitingForData => WAITING_FOR_DATA,
            Self::WaitingForDataAfterSeek => WAITING_FOR_DATA_AFTER_SEEK,
            Self::Paused => PAUSED,
            Self::Stopped => STOPPED,
            Self::PendingNext => PENDING_NEXT,
            Self::Disposed => DISPOSED,
            Self::Error => ERROR,
        }
    }

    /// Exact-match decode of a bitmask; other combinations are `None`.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        Some(match bits {
            0 => Self::Initial,
            RUNNING => Self::Running,
            PLAYING => Self::Playing,
            REBUFFERING => Self::Rebuffering,
            WAITING_FOR_DATA => Self::WaitingForData,
            WAITING_FOR_DATA_AFTER_SEEK => Self::WaitingForDataAfterSeek,
            PAUSED => Self::Paused,
            STOPPED => Self::Stopped,
            PENDING_NEXT => Self::PendingNext,
            DISPOSED => Self::Disposed,
            ERROR => Self::Error,
            _ => return None,
        })
    }
}

/// Inputs that drive [`transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    /// A new entry was requested; wait for its data.
    Play,
    /// Enough data arrived to start or continue rendering.
    BufferingFinished,
    SeekRequested,
    SeekCompleted,
    /// The renderer began producing audio.
    RenderStarted,
    /// The renderer ran dry.
    RenderStalled,
    Pause,
    Resume,
    Stop,
    /// The last queued entry played to the end.
    EntryFinished,
    /// An entry ended and another one is queued behind it.
    PendingNext,
    InterruptionBegan,
    InterruptionEnded { should_resume: bool },
    /// The output route used for playback disappeared.
    RouteLost,
    Failure(PlayerError),
    Dispose,
}

/// Apply `event` to `state`.
///
/// Pairs with no meaning (for instance `BufferingFinished` while stopped)
/// leave the state unchanged. `Disposed` absorbs every event.
pub fn transition(state: InternalState, event: &StateEvent) -> InternalState {
    use InternalState as S;

    if state == S::Disposed {
        return state;
    }

    match event {
        StateEvent::Dispose => S::Disposed,
        StateEvent::Failure(_) => S::Error,
        StateEvent::Stop => S::Stopped,
        StateEvent::Play => S::WaitingForData,

        StateEvent::BufferingFinished => match state {
            S::WaitingForData | S::Rebuffering => S::Running,
            _ => state,
        },
        StateEvent::SeekRequested => match state {
            S::Running | S::Playing | S::Rebuffering | S::WaitingForData | S::PendingNext => {
                S::WaitingForDataAfterSeek
            }
            _ => state,
        },
        StateEvent::SeekCompleted => match state {
            S::WaitingForDataAfterSeek => S::Playing,
            _ => state,
        },
        StateEvent::RenderStarted => match state {
            S::Running
            | S::WaitingForData
            | S::WaitingForDataAfterSeek
            | S::Rebuffering
            | S::PendingNext => S::Playing,
            _ => state,
        },
        StateEvent::RenderStalled => match state {
            S::Running | S::Playing => S::Rebuffering,
            _ => state,
        },
        StateEvent::Pause | StateEvent::InterruptionBegan | StateEvent::RouteLost => {
            if state.is_active() {
                S::Paused
            } else {
                state
            }
        }
        StateEvent::Resume => match state {
            S::Paused => S::Playing,
            _ => state,
        },
        StateEvent::InterruptionEnded { should_resume } => match state {
            S::Paused if *should_resume => S::Playing,
            _ => state,
        },
        StateEvent::EntryFinished => {
            if state.is_active() {
                S::Stopped
            } else {
                state
            }
        }
        StateEvent::PendingNext => {
            if state.is_active() {
                S::PendingNext
            } else {
                state
            }
        }
    }
}

/// Public state and stop reason for an internal state.
///
/// A `None` reason means none applies (stopped states carry the reason the
/// player recorded separately).
pub const fn project(state: InternalState) -> (PublicState, Option<StopReason>) {
    use InternalState as S;

    match state {
        S::Initial => (PublicState::Ready, Some(StopReason::None)),
        S::Running | S::Playing | S::WaitingForDataAfterSeek => {
            (PublicState::Playing, Some(StopReason::None))
        }
        S::PendingNext | S::Rebuffering | S::WaitingForData => {
            (PublicState::Bufferring, Some(StopReason::None))
        }
        S::Stopped => (PublicState::Stopped, None),
        S::Paused => (PublicState::Paused, Some(StopReason::None)),
        S::Disposed => (PublicState::Disposed, Some(StopReason::UserAction)),
        S::Error => (PublicState::Error, Some(StopReason::Error)),
    }
}

/// [`project`] over a raw bitmask; unmatched combinations are `(Ready, StopReason::None)`.
pub const fn project_bits(bits: u32) -> (PublicState, Option<StopReason>) {
    match InternalState::from_bits(bits) {
        Some(state) => project(state),
        None => (PublicState::Ready, Some(StopReason::None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::InternalState as S;
    use cadenza_core::NetworkError;

    const ALL: [S; 11] = [
        S::Initial,
        S::Running,
        S::Playing,
        S::Rebuffering,
        S::WaitingForData,
        S::WaitingForDataAfterSeek,
        S::Paused,
        S::Stopped,
        S::PendingNext,
        S::Disposed,
        S::Error,
    ];

    #[test]
    fn test_projection_table() {
        assert_eq!(project(S::Initial), (PublicState::Ready, Some(StopReason::None)));
        assert_eq!(project(S::Running), (PublicState::Playing, Some(StopReason::None)));
        assert_eq!(project(S::Playing), (PublicState::Playing, Some(StopReason::None)));
        assert_eq!(
            project(S::WaitingForDataAfterSeek),
            (PublicState::Playing, Some(StopReason::None))
        );
        assert_eq!(project(S::PendingNext), (PublicState::Bufferring, Some(StopReason::None)));
        assert_eq!(project(S::Rebuffering), (PublicState::Bufferring, Some(StopReason::None)));
        assert_eq!(project(S::WaitingForData), (PublicState::Bufferring, Some(StopReason::None)));
        assert_eq!(project(S::Stopped), (PublicState::Stopped, None));
        assert_eq!(project(S::Paused), (PublicState::Paused, Some(StopReason::None)));
        assert_eq!(project(S::Disposed), (PublicState::Disposed, Some(StopReason::UserAction)));
        assert_eq!(project(S::Error), (PublicState::Error, Some(StopReason::Error)));
    }

    #[test]
    fn test_bitmask_values() {
        assert_eq!(S::Playing.bits(), 0b11);
        assert_eq!(S::Paused.bits(), (1 << 5) | 1);
        assert_eq!(S::Error.bits(), 1 << 31);
        for state in ALL {
            assert_eq!(S::from_bits(state.bits()), Some(state));
        }
    }

    #[test]
    fn test_unmatched_bits_fall_back_to_ready() {
        assert_eq!(project_bits(PLAYING | PAUSED), (PublicState::Ready, Some(StopReason::None)));
        assert_eq!(project_bits(STOPPED | ERROR), (PublicState::Ready, Some(StopReason::None)));
        assert_eq!(project_bits(RUNNING), (PublicState::Playing, Some(StopReason::None)));
        assert_eq!(project_bits(ERROR), (PublicState::Error, Some(StopReason::Error)));
    }

    #[test]
    fn test_waiting_group() {
        assert!(S::WaitingForData.is_waiting());
        assert!(S::WaitingForDataAfterSeek.is_waiting());
        assert!(S::Rebuffering.is_waiting());
        assert!(!S::Running.is_waiting());
        assert!(!S::Playing.is_waiting());
    }

    #[test]
    fn test_happy_path() {
        let mut state = S::Initial;
        for (event, expected) in [
            (StateEvent::Play, S::WaitingForData),
            (StateEvent::BufferingFinished, S::Running),
            (StateEvent::RenderStarted, S::Playing),
            (StateEvent::RenderStalled, S::Rebuffering),
            (StateEvent::RenderStarted, S::Playing),
            (StateEvent::SeekRequested, S::WaitingForDataAfterSeek),
            (StateEvent::SeekCompleted, S::Playing),
            (StateEvent::PendingNext, S::PendingNext),
            (StateEvent::RenderStarted, S::Playing),
            (StateEvent::EntryFinished, S::Stopped),
        ] {
            state = transition(state, &event);
            assert_eq!(state, expected, "after {event:?}");
        }
    }

    #[test]
    fn test_malformed_events_are_noops() {
        assert_eq!(transition(S::Stopped, &StateEvent::BufferingFinished), S::Stopped);
        assert_eq!(transition(S::Initial, &StateEvent::Resume), S::Initial);
        assert_eq!(transition(S::Stopped, &StateEvent::Pause), S::Stopped);
        assert_eq!(transition(S::Paused, &StateEvent::RenderStalled), S::Paused);
        assert_eq!(transition(S::Error, &StateEvent::EntryFinished), S::Error);
    }

    #[test]
    fn test_interruptions_and_route_loss() {
        assert_eq!(transition(S::Playing, &StateEvent::InterruptionBegan), S::Paused);
        assert_eq!(
            transition(S::Paused, &StateEvent::InterruptionEnded { should_resume: true }),
            S::Playing
        );
        assert_eq!(
            transition(S::Paused, &StateEvent::InterruptionEnded { should_resume: false }),
            S::Paused
        );
        assert_eq!(transition(S::Rebuffering, &StateEvent::RouteLost), S::Paused);
    }

    #[test]
    fn test_failure_and_dispose() {
        let failure = StateEvent::Failure(PlayerError::Network(NetworkError::Timeout));
        assert_eq!(transition(S::Playing, &failure), S::Error);
        assert_eq!(transition(S::Error, &StateEvent::Play), S::WaitingForData);

        for state in ALL {
            assert_eq!(transition(state, &StateEvent::Dispose), S::Disposed);
            assert_eq!(transition(S::Disposed, &StateEvent::Play), S::Disposed);
        }
    }
}
