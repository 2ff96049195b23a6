//! Pure camera tracking state: no bus, no clock, driven by `update(dt)`.

use serde::{Deserialize, Serialize};
use storybeat_api::{distance, smooth_toward, EntityPort, EntityRef, Position};
use tracing::{debug, trace};

use crate::config::CameraConfig;

/// What the camera is following right now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraTrackState {
    pub default_subject: Option<EntityRef>,
    pub override_target: Option<EntityRef>,
    /// Whether arrival has already been announced for the current override.
    pub arrival_fired: bool,
}

/// Emitted by [`CameraRig::update`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CameraEvent {
    Arrived { target: EntityRef, position: Position },
}

/// Result of [`CameraRig::set_override_target`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverrideChange {
    /// A new target was assigned and arrival is armed.
    Armed,
    /// The target was already the override; nothing changed.
    Unchanged { arrived: bool },
    /// The override was cleared; the camera follows the default subject again.
    Cleared,
}

#[derive(Clone, Debug)]
pub struct CameraRig {
    cfg: CameraConfig,
    position: Position,
    track: CameraTrackState,
}

impl CameraRig {
    pub fn new(cfg: CameraConfig) -> Self {
        Self {
            position: cfg.initial_position,
            cfg,
            track: CameraTrackState {
                arrival_fired: true,
                ..CameraTrackState::default()
            },
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.cfg
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn track_state(&self) -> CameraTrackState {
        self.track
    }

    /// Make `entity` the subject followed whenever no override is active.
    pub fn set_default_subject(&mut self, entity: EntityRef) {
        self.track.default_subject = Some(entity);
        if self.track.override_target.is_none() {
            self.track.arrival_fired = true;
        }
    }

    /// Assign, re-assign or clear (`None`) the override target.
    ///
    /// Assigning the target that is already the override is a no-op, so calling
    /// this every tick neither resets nor re-fires arrival.
    pub fn set_override_target(&mut self, target: Option<EntityRef>) -> OverrideChange {
        match target {
            None => {
                if let Some(prev) = self.track.override_target.take() {
                    debug!(target = %prev, "camera override cleared");
                }
                self.track.arrival_fired = true;
                OverrideChange::Cleared
            }
            Some(t) if self.track.override_target == Some(t) => OverrideChange::Unchanged {
                arrived: self.track.arrival_fired,
            },
            Some(t) => {
                debug!(target = %t, "camera override armed");
                self.track.override_target = Some(t);
                self.track.arrival_fired = false;
                OverrideChange::Armed
            }
        }
    }

    /// Teleport the camera without touching the tracking state.
    pub fn snap_to(&mut self, position: Position) {
        self.position = position;
    }

    /// Advance smoothing by `dt` seconds.
    ///
    /// Arrival is checked against the post-move distance and fires at most once per
    /// override assignment. If the override entity has vanished the camera follows
    /// the default subject for this step and arrival stays armed.
    pub fn update(&mut self, dt: f32, entities: &dyn EntityPort) -> Option<CameraEvent> {
        let override_pos = self
            .track
            .override_target
            .and_then(|t| entities.position(t).map(|p| (t, p)));

        if let (Some(t), None) = (self.track.override_target, override_pos) {
            trace!(target = %t, "override target unavailable; following default subject");
        }

        let (desired, target) = match override_pos {
            Some((t, p)) => (p, Some(t)),
            None => {
                let subject = self.track.default_subject.and_then(|s| entities.position(s));
                (subject?, None)
            }
        };

        self.position = smooth_toward(self.position, desired, self.cfg.follow_rate, dt);

        let target = target?;
        if self.track.arrival_fired {
            return None;
        }
        if distance(self.position, desired) < self.cfg.arrival_threshold {
            self.track.arrival_fired = true;
            debug!(target = %target, "camera arrived");
            return Some(CameraEvent::Arrived {
                target,
                position: self.position,
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use storybeat_api::StaticEntities;

    fn rig(rate: f32, threshold: f32) -> CameraRig {
        CameraRig::new(CameraConfig {
            follow_rate: rate,
            arrival_threshold: threshold,
            initial_position: [0.0, 0.0, 0.0],
        })
    }

    #[test]
    fn follows_default_subject_without_arrival() {
        let world = StaticEntities::new().with(EntityRef(1), [4.0, 0.0, 0.0]);
        let mut rig = rig(1.0, 0.5);
        rig.set_default_subject(EntityRef(1));
        for _ in 0..20 {
            assert_eq!(rig.update(0.5, &world), None);
        }
        assert_relative_eq!(rig.position()[0], 4.0, epsilon = 1e-4);
    }

    #[test]
    fn no_subject_holds_position() {
        let world = StaticEntities::new();
        let mut rig = rig(1.0, 0.5);
        rig.snap_to([1.0, 2.0, 3.0]);
        assert_eq!(rig.update(0.5, &world), None);
        assert_eq!(rig.position(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn same_target_does_not_rearm() {
        let world = StaticEntities::new().with(EntityRef(7), [0.01, 0.0, 0.0]);
        let mut rig = rig(1.0, 0.05);
        assert_eq!(rig.set_override_target(Some(EntityRef(7))), OverrideChange::Armed);
        assert!(rig.update(0.5, &world).is_some());
        assert_eq!(
            rig.set_override_target(Some(EntityRef(7))),
            OverrideChange::Unchanged { arrived: true }
        );
        assert_eq!(rig.update(0.5, &world), None);
        assert!(rig.track_state().arrival_fired);
    }

    #[test]
    fn vanished_override_falls_back_to_default() {
        let world = StaticEntities::new().with(EntityRef(1), [2.0, 0.0, 0.0]);
        let mut rig = rig(1.0, 0.05);
        rig.set_default_subject(EntityRef(1));
        rig.set_override_target(Some(EntityRef(9)));
        assert_eq!(rig.update(0.5, &world), None);
        assert_relative_eq!(rig.position()[0], 1.0);
        let track = rig.track_state();
        assert_eq!(track.override_target, Some(EntityRef(9)));
        assert!(!track.arrival_fired);
    }

    #[test]
    fn clearing_override_restores_default_tracking() {
        let mut rig = rig(1.0, 0.05);
        rig.set_default_subject(EntityRef(1));
        rig.set_override_target(Some(EntityRef(2)));
        assert!(!rig.track_state().arrival_fired);
        assert_eq!(rig.set_override_target(None), OverrideChange::Cleared);
        let track = rig.track_state();
        assert_eq!(track.override_target, None);
        assert_eq!(track.default_subject, Some(EntityRef(1)));
        assert!(track.arrival_fired);
    }
}
