//! Services driving the player.
//!
//! Stands in for the network reader, bitstream parser, and renderer so the
//! control plane can run headless.

pub mod playback;

pub use playback::PlaybackService;
