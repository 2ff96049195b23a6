use thiserror::Error;

/// Why a sequence did not start. Always local: the caller treats it as "skipped".
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    #[error("a sequence is already playing")]
    Busy,
    #[error("no requested line resolved to text")]
    Empty,
    #[error("no typewriter port installed")]
    Misconfigured,
}
