//! The scene context: one sequencer, one camera, one bus, one clock.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use storybeat_api::{ContentTable, EntityPort, Position, Signal, TypewriterPort};
use storybeat_camera::{Camera, CameraSlot};
use storybeat_dialogue::{Dialogue, SequencerState};
use storybeat_signals::{CancelScope, CancelToken, EventBus, SceneClock};

use crate::beat::{Beat, BeatLibrary};
use crate::config::StageConfig;
use crate::director::{BeatId, Director, FinishedBeat};
use crate::error::BeatError;
use crate::runner::BeatContext;

/// Everything observable about one [`Stage::tick`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageFrame {
    pub epoch: u64,
    pub dt: f32,
    /// Scene time after this tick, in seconds.
    pub time: f64,
    pub camera_position: Option<Position>,
    pub sequencer_state: SequencerState,
    /// Whether an inline pause is holding the current line.
    #[serde(default)]
    pub dialogue_paused: bool,
    /// Signals published since the previous frame, in publish order.
    pub signals: Vec<Signal>,
    pub finished_beats: Vec<FinishedBeat>,
}

/// Owns the per-scene singletons and hands them to beats by handle.
///
/// Dropping the stage cancels every beat started under its own scope.
pub struct Stage {
    pub(crate) cfg: StageConfig,
    pub(crate) epoch: u64,
    pub(crate) bus: EventBus,
    pub(crate) clock: SceneClock,
    pub(crate) dialogue: Dialogue,
    pub(crate) camera: CameraSlot,
    pub(crate) director: Director,
    content: Rc<dyn ContentTable>,
    library: BeatLibrary,
    scope: CancelScope,
}

impl Stage {
    /// Build a stage with a live camera. Passing `None` for the typewriter leaves the
    /// sequencer disabled; dialogue steps are then skipped.
    pub fn new(
        cfg: StageConfig,
        typewriter: Option<Box<dyn TypewriterPort>>,
        entities: Rc<dyn EntityPort>,
        content: Rc<dyn ContentTable>,
    ) -> Self {
        let bus = EventBus::with_journal();
        let clock = SceneClock::new();
        let dialogue = Dialogue::new(
            cfg.dialogue.clone(),
            typewriter,
            Rc::clone(&entities),
            bus.clone(),
        );
        let camera = CameraSlot::with(Camera::new(
            cfg.camera.clone(),
            entities,
            bus.clone(),
            clock.clone(),
        ));
        Self {
            cfg,
            epoch: 0,
            bus,
            clock,
            dialogue,
            camera,
            director: Director::new(),
            content,
            library: BeatLibrary::new(),
            scope: CancelScope::new(),
        }
    }

    /// Same stage without a camera; camera steps become logged no-ops.
    pub fn without_camera(self) -> Self {
        self.camera.remove();
        self
    }

    pub fn with_library(mut self, library: BeatLibrary) -> Self {
        self.library = library;
        self
    }

    pub fn config(&self) -> &StageConfig {
        &self.cfg
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn clock(&self) -> &SceneClock {
        &self.clock
    }

    pub fn dialogue(&self) -> &Dialogue {
        &self.dialogue
    }

    pub fn camera(&self) -> &CameraSlot {
        &self.camera
    }

    pub fn library(&self) -> &BeatLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut BeatLibrary {
        &mut self.library
    }

    /// Token of the stage-wide scope. Beats started with [`Stage::run`] hang off it.
    pub fn scope(&self) -> &CancelToken {
        self.scope.token()
    }

    pub fn context(&self) -> BeatContext {
        BeatContext {
            dialogue: self.dialogue.clone(),
            camera: self.camera.clone(),
            bus: self.bus.clone(),
            clock: self.clock.clone(),
            content: Rc::clone(&self.content),
        }
    }

    /// Start `beat` under the stage scope and run it up to its first suspension.
    pub fn run(&mut self, beat: Beat) -> BeatId {
        let scope = self.scope.token().clone();
        self.run_scoped(beat, &scope)
    }

    /// Start `beat` under `scope` (usually owned by the scene object that triggered it)
    /// and run it up to its first suspension.
    pub fn run_scoped(&mut self, beat: Beat, scope: &CancelToken) -> BeatId {
        let ctx = self.context();
        let id = self.director.run(beat, ctx, scope);
        self.director.poll();
        id
    }

    /// Start a beat from the library by name.
    pub fn play(&mut self, name: &str, scope: &CancelToken) -> Result<BeatId, BeatError> {
        let beat = self
            .library
            .get(name)
            .cloned()
            .ok_or_else(|| BeatError::UnknownBeat(name.to_string()))?;
        Ok(self.run_scoped(beat, scope))
    }

    pub fn cancel(&mut self, id: BeatId) -> bool {
        self.director.cancel(id)
    }

    pub fn is_running(&self, id: BeatId) -> bool {
        self.director.is_running(id)
    }

    pub fn running(&self) -> Vec<BeatId> {
        self.director.running()
    }

    /// Let beats react to host calls made since the last tick without moving time.
    pub fn pump(&mut self) {
        self.director.poll();
    }

    /// Advance the scene by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> StageFrame {
        crate::scheduler::run_tick(self, dt)
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("epoch", &self.epoch)
            .field("clock", &self.clock)
            .field("dialogue", &self.dialogue)
            .field("camera", &self.camera)
            .field("director", &self.director)
            .field("library", &self.library.len())
            .finish()
    }
}
