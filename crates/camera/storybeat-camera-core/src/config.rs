use serde::{Deserialize, Serialize};
use storybeat_api::Position;

/// Camera smoothing and arrival settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Exponential smoothing rate (per second).
    pub follow_rate: f32,
    /// Distance under which an override target counts as reached.
    pub arrival_threshold: f32,
    pub initial_position: Position,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            follow_rate: 5.0,
            arrival_threshold: 0.05,
            initial_position: [0.0, 0.0, 0.0],
        }
    }
}
