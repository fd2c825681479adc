//! Core domain types for Cadenza.

pub mod entry;
pub mod format;
pub mod state;

pub use entry::{AudioEntry, AudioEntryId, AudioSource, QueueLane};
pub use format::{OutputFormat, SampleFormat};
pub use state::{PublicState, StopReason};
