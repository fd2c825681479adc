//! Byte buffers for incoming network and file data.

pub mod cursor;

pub use cursor::{ByteCursorBuffer, WireValue};
