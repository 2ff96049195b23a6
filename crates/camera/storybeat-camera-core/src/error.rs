use storybeat_signals::SignalError;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CameraError {
    #[error("no live camera coordinator")]
    Offline,
    #[error("camera wait interrupted: {0}")]
    Interrupted(#[from] SignalError),
}
