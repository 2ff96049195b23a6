//! storybeat-director
//!
//! Runs hand-authored beats: short scripts that mix dialogue, camera moves, timed waits
//! and bus signals. A [`Stage`] owns the one sequencer, camera, bus and clock of a scene
//! and advances everything from the host's per-frame [`Stage::tick`].

pub mod beat;
pub mod config;
pub mod director;
pub mod error;
pub mod runner;
pub mod scheduler;
pub mod stage;

pub use crate::beat::{Beat, BeatLibrary, BeatStep};
pub use crate::config::StageConfig;
pub use crate::director::{BeatId, BeatStatus, Director, FinishedBeat};
pub use crate::error::BeatError;
pub use crate::runner::{run_beat, BeatContext};
pub use crate::stage::{Stage, StageFrame};
