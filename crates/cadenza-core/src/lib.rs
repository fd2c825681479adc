//! # cadenza-core
//!
//! Core types, configuration, and error handling for the Cadenza streaming
//! audio player.

pub mod config;
pub mod error;
pub mod types;

pub use config::PlayerConfig;
pub use error::{
    AudioSystemError, BufferError, ConverterError, Error, FileStreamError, NetworkError,
    PlayerError, Result,
};
pub use types::*;
