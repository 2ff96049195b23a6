//! storybeat-api-core: shared vocabulary for the narrative stack (engine-agnostic)
//!
//! Everything the sequencing crates exchange with the host lives here: entity handles,
//! positions, authored lines, the generic signal payload, and the narrow ports through
//! which the host renders text, resolves entity positions and serves content.

pub mod entity;
pub mod line;
pub mod math;
pub mod ports;
pub mod signal;

pub use entity::{EntityRef, StaticEntities};
pub use line::{ContentError, LineRecord, LineTable};
pub use math::{distance, smooth_toward, Position};
pub use ports::{ContentTable, DisplayRequest, EntityPort, RecordingTypewriter, TypewriterPort};
pub use signal::Signal;
