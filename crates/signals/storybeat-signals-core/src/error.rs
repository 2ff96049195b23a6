use thiserror::Error;

/// Why a suspension point resolved without its notification.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SignalError {
    #[error("suspension cancelled by its owning scope")]
    Cancelled,
    #[error("event bus dropped before the signal arrived")]
    BusDropped,
}
