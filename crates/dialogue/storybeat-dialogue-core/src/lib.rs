//! storybeat-dialogue-core
//!
//! The line sequencer: a single dialogue state machine that shows a queue of lines one
//! at a time through a [`TypewriterPort`](storybeat_api::TypewriterPort), advancing on
//! display-completion notifications or on an explicit "proceed".
//!
//! [`SequencerCore`](sequencer::SequencerCore) is the pure state machine: every
//! operation returns the side effects it wants performed. [`Dialogue`] is the shared
//! handle that commits state first and then performs those effects with no borrow
//! held, which is what lets ports and callbacks call back into it.

pub mod config;
pub mod dialogue;
pub mod error;
pub mod sequencer;

pub use config::DialogueConfig;
pub use dialogue::Dialogue;
pub use error::Rejected;
pub use sequencer::{AdvanceMode, CompletionCallback, SequenceRequest, SequencerState};
