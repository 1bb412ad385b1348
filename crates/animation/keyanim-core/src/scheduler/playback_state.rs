use serde::{Deserialize, Serialize};

/// Playback state of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing advances; controllers hold their pose
    #[default]
    Stopped,
    /// Play-time advances every update
    Playing,
    /// Controllers are catching up with a scrubbed pose
    Interpolating,
}

impl PlaybackState {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Playing => "playing",
            Self::Interpolating => "interpolating",
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// A play request made in this state is deferred
    #[inline]
    pub fn defers_play(&self) -> bool {
        matches!(self, Self::Interpolating)
    }
}

impl From<&str> for PlaybackState {
    fn from(s: &str) -> Self {
        match s {
            "playing" => Self::Playing,
            "interpolating" => Self::Interpolating,
            _ => Self::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for state in [
            PlaybackState::Stopped,
            PlaybackState::Playing,
            PlaybackState::Interpolating,
        ] {
            assert_eq!(PlaybackState::from(state.name()), state);
        }
        assert_eq!(PlaybackState::from("bogus"), PlaybackState::Stopped);
    }
}
