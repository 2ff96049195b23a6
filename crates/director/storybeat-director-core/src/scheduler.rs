use tracing::debug;

use crate::stage::{Stage, StageFrame};

/// One scene tick:
///   clock -> camera (may publish arrival) -> beats until stalled -> frame
///
/// Timers and arrivals resolved in this tick are observed by the beats in the same tick.
pub fn run_tick(stage: &mut Stage, dt: f32) -> StageFrame {
    stage.epoch = stage.epoch.wrapping_add(1);

    stage.clock.advance(dt);
    stage.camera.tick(dt);
    stage.director.poll();

    let frame = StageFrame {
        epoch: stage.epoch,
        dt,
        time: stage.clock.now(),
        camera_position: stage.camera.position(),
        sequencer_state: stage.dialogue.state(),
        dialogue_paused: stage.dialogue.is_paused(),
        signals: stage.bus.drain_journal(),
        finished_beats: stage.director.drain_finished(),
    };

    if stage.cfg.log_frames {
        debug!(
            epoch = frame.epoch,
            time = frame.time,
            state = ?frame.sequencer_state,
            paused = frame.dialogue_paused,
            signals = frame.signals.len(),
            finished = frame.finished_beats.len(),
            "stage frame"
        );
    }
    frame
}
