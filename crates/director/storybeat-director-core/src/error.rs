use storybeat_camera::CameraError;
use storybeat_dialogue::Rejected;
use storybeat_signals::SignalError;
use thiserror::Error;

/// Why a beat stopped before its last step. Never propagated to the host; the
/// director logs it and records it in the finished-beat list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BeatError {
    #[error("beat cancelled")]
    Cancelled,
    #[error("beat skipped: {0}")]
    Skipped(Rejected),
    #[error("camera step failed: {0}")]
    Camera(CameraError),
    #[error("suspension abandoned: {0}")]
    Signal(SignalError),
    #[error("unknown beat '{0}'")]
    UnknownBeat(String),
}

impl From<SignalError> for BeatError {
    fn from(err: SignalError) -> Self {
        match err {
            SignalError::Cancelled => BeatError::Cancelled,
            other => BeatError::Signal(other),
        }
    }
}

impl From<CameraError> for BeatError {
    fn from(err: CameraError) -> Self {
        match err {
            CameraError::Interrupted(signal) => signal.into(),
            other => BeatError::Camera(other),
        }
    }
}
