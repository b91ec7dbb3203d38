//! Error types for model sessions

use meshview_io::LoadError;
use thiserror::Error;

/// Failures reported by session operations
#[derive(Error, Debug)]
pub enum SessionError {
    /// Fetching or decoding the model failed; the session is now `Failed`
    #[error("Model failed to load: {0}")]
    LoadFailure(#[from] LoadError),

    /// Toggle or camera reset before the model finished loading
    #[error("Model is not loaded")]
    NotReady,

    /// Playback requested on a model without animation clips
    #[error("Model has no animation clips")]
    AnimationUnavailable,

    /// One persisted field could not be re-applied after load
    #[error("Replaying setting `{field}` failed: {source}")]
    ReplayFailure {
        field: &'static str,
        source: Box<SessionError>,
    },

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    /// Operation on a session after `dispose`
    #[error("Session has been disposed")]
    Disposed,

    #[error("Scene error: {0}")]
    Scene(#[from] meshview_core::Error),
}

impl SessionError {
    /// True for the readiness failures callers typically show as "please wait"
    pub fn is_not_ready(&self) -> bool {
        matches!(self, SessionError::NotReady)
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
