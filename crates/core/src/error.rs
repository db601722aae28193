use crate::PlaybackState;

/// Result alias that carries the custom [`BeatsVizError`] type.
pub type Result<T> = std::result::Result<T, BeatsVizError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum BeatsVizError {
    /// Fetching or decoding a clip failed. Terminal for that clip; the host
    /// decides whether to offer a reload.
    #[error("failed to load clip: {0}")]
    LoadFailure(String),
    /// A transport action was requested from a state that forbids it.
    #[error("cannot {action} while {state:?}")]
    InvalidTransition {
        state: PlaybackState,
        action: &'static str,
    },
    /// Playback sources are single-use and cannot be restarted.
    #[error("playback source has already been started")]
    SourceReused,
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Free-form message for host-level failures that have no dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl BeatsVizError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn load<T: Into<String>>(reason: T) -> Self {
        Self::LoadFailure(reason.into())
    }

    /// Returns true for caller contract violations rather than runtime faults.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

impl From<&str> for BeatsVizError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for BeatsVizError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
