//! storybeat-camera-core
//!
//! Tracks the entity the camera follows by default, lets scripted beats swap in a
//! temporary override target, and announces exactly one `camera.arrived` signal per
//! override assignment once the smoothed camera position converges on it.

pub mod camera;
pub mod config;
pub mod error;
pub mod rig;

pub use camera::{Camera, CameraSlot};
pub use config::CameraConfig;
pub use error::CameraError;
pub use rig::{CameraEvent, CameraRig, CameraTrackState, OverrideChange};
