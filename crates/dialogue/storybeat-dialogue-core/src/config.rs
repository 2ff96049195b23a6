use serde::{Deserialize, Serialize};
use storybeat_api::signal::names;
use storybeat_api::Position;

/// Sequencer settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Where text goes when neither the line nor the sequence anchor resolves.
    pub default_anchor: Position,
    /// Bus signal published after every finished sequence.
    pub finished_signal: String,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            default_anchor: [0.0, 0.0, 0.0],
            finished_signal: names::DIALOGUE_FINISHED.to_string(),
        }
    }
}
