//! Shared-state utilities.

pub mod bimap;
pub mod protected;

pub use bimap::{BiMap, MapError};
pub use protected::ProtectedValue;
