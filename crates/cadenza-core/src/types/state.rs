//! Observer-facing playback state.

use serde::{Deserialize, Serialize};

/// Coarse playback status reported to observers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublicState {
    #[default]
    Ready,
    Running,
    Playing,
    Bufferring,
    Paused,
    Stopped,
    Error,
    Disposed,
}

impl PublicState {
    /// Whether audio is (or is about to be) coming out of the speakers.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Playing | Self::Bufferring)
    }
}

/// Why playback stopped.
///
/// `Option<StopReason>` is used where a reason may not apply at all;
/// `None` there is distinct from [`StopReason::None`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    #[default]
    None,
    Eof,
    UserAction,
    Error,
    Disposed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(PublicState::Playing.is_active());
        assert!(PublicState::Bufferring.is_active());
        assert!(!PublicState::Paused.is_active());
        assert!(!PublicState::Stopped.is_active());
        assert!(!PublicState::Disposed.is_active());
    }
}
