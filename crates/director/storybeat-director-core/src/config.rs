use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use storybeat_camera::CameraConfig;
use storybeat_dialogue::DialogueConfig;

/// Scene-wide settings for a [`crate::Stage`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub camera: CameraConfig,
    pub dialogue: DialogueConfig,
    /// Emit a debug summary of every frame.
    pub log_frames: bool,
}

impl StageConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("failed to parse stage config json")
    }
}
