//! # cadenza-audio
//!
//! Playback control plane for Cadenza.
//!
//! Features:
//! - Dual-lane entry scheduler shared by network, parser, and render threads
//! - Playback state machine with an exact-match public projection
//! - Big-endian cursor buffer for wire-format fields
//! - Serial execution contexts, periodic timers, and background leases

pub mod background;
pub mod buffer;
pub mod dispatch;
pub mod events;
pub mod player;
pub mod queue;
pub mod state;
pub mod sync;
pub mod timer;

pub use background::{BackgroundHost, BackgroundLease, BackgroundTask, HostTaskId, NoopHost};
pub use buffer::ByteCursorBuffer;
pub use dispatch::SerialQueue;
pub use events::{Interruption, ParserEvent, PlayerNotification, RenderEvent, RouteChangeReason};
pub use player::{AudioPlayer, DecoderHandle};
pub use queue::EntryScheduler;
pub use state::{project, project_bits, transition, InternalState, StateEvent};
pub use sync::{BiMap, MapError, ProtectedValue};
pub use timer::PeriodicTimer;
