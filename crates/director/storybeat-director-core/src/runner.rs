//! Step-by-step execution of one beat.

use std::fmt;
use std::rc::Rc;

use storybeat_api::{ContentTable, EntityRef};
use storybeat_camera::{CameraError, CameraSlot};
use storybeat_dialogue::{AdvanceMode, Dialogue, SequenceRequest, SequencerState};
use storybeat_signals::{next_signal, CancelToken, EventBus, SceneClock};
use tracing::{debug, warn};

use crate::beat::{Beat, BeatStep};
use crate::error::BeatError;

/// Collaborators a beat talks to. Cloning shares them.
#[derive(Clone)]
pub struct BeatContext {
    pub dialogue: Dialogue,
    pub camera: CameraSlot,
    pub bus: EventBus,
    pub clock: SceneClock,
    pub content: Rc<dyn ContentTable>,
}

impl fmt::Debug for BeatContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeatContext")
            .field("dialogue", &self.dialogue)
            .field("camera", &self.camera)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

/// Run every step of `beat` in order.
///
/// Returns early with [`BeatError::Cancelled`] once `token` is cancelled; no later step
/// starts after that.
pub async fn run_beat(beat: Beat, ctx: BeatContext, token: CancelToken) -> Result<(), BeatError> {
    for (index, step) in beat.steps.iter().enumerate() {
        if token.is_cancelled() {
            return Err(BeatError::Cancelled);
        }
        debug!(beat = %beat.name, step = index, kind = step.kind(), "beat step");
        run_step(&beat, step, &ctx, &token).await?;
    }
    Ok(())
}

async fn run_step(
    beat: &Beat,
    step: &BeatStep,
    ctx: &BeatContext,
    token: &CancelToken,
) -> Result<(), BeatError> {
    match step {
        BeatStep::ShowLines {
            ids,
            anchor,
            advance,
            await_finish,
        } => show_lines(beat, ctx, token, ids, *anchor, *advance, *await_finish).await,
        BeatStep::FocusCamera {
            target,
            await_arrival,
        } => match ctx.camera.get() {
            Ok(camera) => Ok(camera.focus(*target, *await_arrival, token).await?),
            Err(err) => camera_offline(beat, step, err),
        },
        BeatStep::ReleaseCamera => match ctx.camera.get() {
            Ok(camera) => {
                camera.release();
                Ok(())
            }
            Err(err) => camera_offline(beat, step, err),
        },
        BeatStep::Wait { seconds } => Ok(ctx.clock.delay(*seconds, token).await?),
        BeatStep::PublishSignal { name, payload } => {
            ctx.bus.emit(name.clone(), payload.clone());
            Ok(())
        }
        BeatStep::AwaitSignal { name } => {
            next_signal(&ctx.bus, name.clone(), token).await?;
            Ok(())
        }
        BeatStep::PanAndReturn { target, hold } => match ctx.camera.get() {
            Ok(camera) => Ok(camera.pan_and_return(*target, *hold, token).await?),
            Err(err) => camera_offline(beat, step, err),
        },
        BeatStep::FollowSubject { entity } => match ctx.camera.get() {
            Ok(camera) => {
                camera.set_default_subject(*entity);
                Ok(())
            }
            Err(err) => camera_offline(beat, step, err),
        },
    }
}

/// Camera steps degrade to no-ops when no camera is live.
fn camera_offline(beat: &Beat, step: &BeatStep, err: CameraError) -> Result<(), BeatError> {
    warn!(beat = %beat.name, kind = step.kind(), %err, "camera step skipped");
    Ok(())
}

async fn show_lines(
    beat: &Beat,
    ctx: &BeatContext,
    token: &CancelToken,
    ids: &[String],
    anchor: Option<EntityRef>,
    advance: AdvanceMode,
    await_finish: bool,
) -> Result<(), BeatError> {
    // Subscribe first: an instant typewriter can finish the whole sequence inside
    // `start_sequence`.
    let finished = await_finish.then(|| ctx.dialogue.next_finished(token));

    let mut request = SequenceRequest::new(ids.iter().cloned())
        .advance(advance)
        .tag(beat.tag());
    if let Some(anchor) = anchor {
        request = request.anchor(anchor);
    }

    if let Err(rejected) = ctx.dialogue.start_sequence(request, ctx.content.as_ref()) {
        warn!(beat = %beat.name, %rejected, "sequencer rejected lines; skipping beat");
        return Err(BeatError::Skipped(rejected));
    }

    let Some(finished) = finished else {
        return Ok(());
    };
    let guard = SequenceGuard {
        dialogue: &ctx.dialogue,
        source_tag: beat.tag(),
        armed: true,
    };
    finished.await?;
    guard.disarm();
    Ok(())
}

/// Aborts the sequence this beat started if the beat is dropped while waiting on it.
struct SequenceGuard<'a> {
    dialogue: &'a Dialogue,
    source_tag: &'a str,
    armed: bool,
}

impl SequenceGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SequenceGuard<'_> {
    fn drop(&mut self) {
        if !self.armed || self.dialogue.state() == SequencerState::Idle {
            return;
        }
        if self.dialogue.source_tag().as_deref() == Some(self.source_tag) {
            debug!(source_tag = %self.source_tag, "beat abandoned mid-sequence; aborting it");
            self.dialogue.abort();
        }
    }
}
