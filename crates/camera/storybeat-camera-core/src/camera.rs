//! Shared camera coordinator handle wired to the event bus and scene clock.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::json;
use storybeat_api::{signal::names, EntityPort, EntityRef, Position};
use storybeat_signals::{next_signal_matching, CancelToken, EventBus, SceneClock, SignalFuture};
use tracing::{debug, error, warn};

use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::rig::{CameraEvent, CameraRig, CameraTrackState, OverrideChange};

/// Cheaply cloneable handle around a [`CameraRig`].
///
/// [`Camera::tick`] advances smoothing and publishes `camera.arrived` with payload
/// `{"target": <entity id>, "position": [x, y, z]}`.
#[derive(Clone)]
pub struct Camera {
    rig: Rc<RefCell<CameraRig>>,
    entities: Rc<dyn EntityPort>,
    bus: EventBus,
    clock: SceneClock,
    /// Targets that a pending `focus` is waiting to reach, one entry per waiter.
    awaiting: Rc<RefCell<Vec<EntityRef>>>,
}

impl Camera {
    pub fn new(
        cfg: CameraConfig,
        entities: Rc<dyn EntityPort>,
        bus: EventBus,
        clock: SceneClock,
    ) -> Self {
        Self {
            rig: Rc::new(RefCell::new(CameraRig::new(cfg))),
            entities,
            bus,
            clock,
            awaiting: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn position(&self) -> Position {
        self.rig.borrow().position()
    }

    pub fn track_state(&self) -> CameraTrackState {
        self.rig.borrow().track_state()
    }

    pub fn set_default_subject(&self, entity: EntityRef) {
        self.rig.borrow_mut().set_default_subject(entity);
    }

    /// Replacing an override that has not arrived yet strands any `focus` still
    /// waiting on it; that is logged as a warning.
    pub fn set_override_target(&self, target: Option<EntityRef>) -> OverrideChange {
        let track = self.rig.borrow().track_state();
        if let Some(current) = track.override_target {
            if Some(current) != target && !track.arrival_fired && self.is_awaiting(current) {
                warn!(
                    %current,
                    replacement = ?target,
                    "override replaced before arrival; a pending focus on it will only end on cancellation"
                );
            }
        }
        self.rig.borrow_mut().set_override_target(target)
    }

    /// True while some `focus` call is suspended waiting for `target` to arrive.
    pub fn is_awaiting(&self, target: EntityRef) -> bool {
        self.awaiting.borrow().contains(&target)
    }

    pub fn snap_to(&self, position: Position) {
        self.rig.borrow_mut().snap_to(position);
    }

    /// Advance smoothing by `dt` and publish arrival if it happened this step.
    pub fn tick(&self, dt: f32) -> Option<CameraEvent> {
        let event = self.rig.borrow_mut().update(dt, self.entities.as_ref());
        if let Some(CameraEvent::Arrived { target, position }) = &event {
            self.bus.emit(
                names::CAMERA_ARRIVED,
                json!({ "target": target, "position": position }),
            );
        }
        event
    }

    /// The next `camera.arrived` for `target`. Arrivals for other targets are ignored.
    pub fn next_arrival(&self, target: EntityRef, token: &CancelToken) -> SignalFuture {
        next_signal_matching(&self.bus, names::CAMERA_ARRIVED, token, move |signal| {
            signal.field("target").and_then(|v| v.as_u64()) == Some(target.0)
        })
    }

    /// Point the camera at `target`, optionally suspending until it arrives.
    ///
    /// The arrival wait is registered before the override is assigned so an arrival
    /// on the very next tick is never missed. Re-focusing a target that has already
    /// arrived returns immediately.
    ///
    /// Arrival fires once per override assignment. If something else retargets the
    /// override before `target` is reached, this call stays suspended until `token`
    /// is cancelled.
    pub async fn focus(
        &self,
        target: EntityRef,
        await_arrival: bool,
        token: &CancelToken,
    ) -> Result<(), CameraError> {
        let arrival = await_arrival.then(|| self.next_arrival(target, token));
        let change = self.set_override_target(Some(target));
        let Some(arrival) = arrival else {
            return Ok(());
        };
        if change == (OverrideChange::Unchanged { arrived: true }) {
            return Ok(());
        }
        let _waiting = AwaitingArrival::new(&self.awaiting, target);
        arrival.await?;
        Ok(())
    }

    /// Return to the default subject.
    pub fn release(&self) {
        self.set_override_target(None);
    }

    /// Focus `target`, wait for arrival, hold for `hold` seconds of scene time, then
    /// release back to the default subject.
    ///
    /// Cancelling `token` at any point stops the sequence where it is; the override
    /// is left as it was and the restore step never runs.
    pub async fn pan_and_return(
        &self,
        target: EntityRef,
        hold: f32,
        token: &CancelToken,
    ) -> Result<(), CameraError> {
        self.focus(target, true, token).await?;
        self.clock.delay(hold, token).await?;
        debug!(target = %target, "pan finished; returning to default subject");
        self.release();
        Ok(())
    }
}

/// Marks `target` as awaited for as long as a `focus` call is suspended on it.
struct AwaitingArrival {
    awaiting: Rc<RefCell<Vec<EntityRef>>>,
    target: EntityRef,
}

impl AwaitingArrival {
    fn new(awaiting: &Rc<RefCell<Vec<EntityRef>>>, target: EntityRef) -> Self {
        awaiting.borrow_mut().push(target);
        Self {
            awaiting: Rc::clone(awaiting),
            target,
        }
    }
}

impl Drop for AwaitingArrival {
    fn drop(&mut self) {
        let mut awaiting = self.awaiting.borrow_mut();
        if let Some(pos) = awaiting.iter().position(|t| *t == self.target) {
            awaiting.swap_remove(pos);
        }
    }
}

impl fmt::Debug for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rig = self.rig.borrow();
        f.debug_struct("Camera")
            .field("position", &rig.position())
            .field("track", &rig.track_state())
            .finish()
    }
}

/// Optional camera reference held by consumers.
///
/// Hosts may start without a camera or tear it down mid-scene; consumers go
/// through the slot and treat an empty one as a logged no-op.
#[derive(Clone, Debug, Default)]
pub struct CameraSlot {
    inner: Rc<RefCell<Option<Camera>>>,
}

impl CameraSlot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(camera: Camera) -> Self {
        let slot = Self::default();
        slot.install(camera);
        slot
    }

    pub fn install(&self, camera: Camera) -> Option<Camera> {
        self.inner.borrow_mut().replace(camera)
    }

    pub fn remove(&self) -> Option<Camera> {
        self.inner.borrow_mut().take()
    }

    pub fn is_live(&self) -> bool {
        self.inner.borrow().is_some()
    }

    /// The live camera, or [`CameraError::Offline`] with an error logged.
    pub fn get(&self) -> Result<Camera, CameraError> {
        match self.inner.borrow().as_ref() {
            Some(camera) => Ok(camera.clone()),
            None => {
                error!("camera coordinator is not available");
                Err(CameraError::Offline)
            }
        }
    }

    /// Tick the camera if one is installed.
    pub fn tick(&self, dt: f32) -> Option<CameraEvent> {
        let camera = self.inner.borrow().clone();
        camera.and_then(|c| c.tick(dt))
    }

    pub fn position(&self) -> Option<Position> {
        self.inner.borrow().as_ref().map(Camera::position)
    }
}
