use std::rc::Rc;

use approx::assert_relative_eq;
use serde_json::json;
use storybeat_api::{signal::names, EntityRef, LineTable, RecordingTypewriter, StaticEntities};
use storybeat_dialogue::{AdvanceMode, SequenceRequest, SequencerState};
use storybeat_director::{
    Beat, BeatError, BeatLibrary, BeatStatus, BeatStep, Stage, StageConfig, StageFrame,
};
use storybeat_signals::CancelScope;
use storybeat_test_fixtures as fixtures;

const HERO: EntityRef = EntityRef(1);
const KEEPER: EntityRef = EntityRef(2);
const LIGHTHOUSE: EntityRef = EntityRef(3);

fn init_tracing() {
    let default_filter = "storybeat_director=debug,storybeat_camera=debug,storybeat_dialogue=debug";
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

struct Scene {
    stage: Stage,
    port: RecordingTypewriter,
}

/// The camera closes half of the remaining gap every 0.5 s tick.
fn scene() -> Scene {
    init_tracing();
    let cfg = StageConfig::from_json(&fixtures::stages::json("half-step").expect("stage fixture"))
        .expect("stage config");
    let table = LineTable::from_json(&fixtures::lines::json("harbor").expect("lines fixture"))
        .expect("line table");
    let library = BeatLibrary::from_json(&fixtures::beats::json("harbor").expect("beats fixture"))
        .expect("beat library");
    let world = StaticEntities::new()
        .with(HERO, [0.0, 0.0, 0.0])
        .with(KEEPER, [1.0, 0.0, 0.0])
        .with(LIGHTHOUSE, [0.0, 2.0, 0.0]);

    let port = RecordingTypewriter::new();
    let stage = Stage::new(
        cfg,
        Some(Box::new(port.clone())),
        Rc::new(world),
        Rc::new(table),
    )
    .with_library(library);
    stage
        .camera()
        .get()
        .expect("camera installed")
        .set_default_subject(HERO);
    Scene { stage, port }
}

fn signal_names(frame: &StageFrame) -> Vec<&str> {
    frame.signals.iter().map(|s| s.name.as_str()).collect()
}

#[test]
fn first_encounter_runs_camera_then_lines_then_release() {
    let mut s = scene();
    let scope = CancelScope::new();
    let id = s.stage.play("first_encounter", scope.token()).unwrap();
    assert!(s.stage.is_running(id));

    let camera = s.stage.camera().get().unwrap();
    assert_eq!(camera.track_state().override_target, Some(KEEPER));

    for _ in 0..5 {
        s.stage.tick(0.5);
    }
    assert_eq!(s.port.count(), 0, "lines wait for the camera");

    let frame = s.stage.tick(0.5);
    assert_eq!(signal_names(&frame), vec![names::CAMERA_ARRIVED]);
    assert_eq!(frame.sequencer_state, SequencerState::PlayingText);
    assert_eq!(s.port.shown_ids(), vec!["harbor.greet"]);
    let first = s.port.last().unwrap();
    assert_eq!(first.anchor, [1.0, 0.0, 0.0]);
    assert_eq!(first.source_tag, "harbor.keeper");

    s.stage.dialogue().on_display_complete();
    assert_eq!(s.port.shown_ids(), vec!["harbor.greet", "harbor.letter"]);
    s.stage.dialogue().on_display_complete();
    assert_eq!(s.stage.dialogue().state(), SequencerState::Idle);

    s.stage.pump();
    assert!(!s.stage.is_running(id));
    assert_eq!(camera.track_state().override_target, None);

    let frame = s.stage.tick(0.5);
    assert_eq!(
        signal_names(&frame),
        vec![names::DIALOGUE_FINISHED, "quest.started", names::BEAT_FINISHED]
    );
    assert_eq!(frame.signals[1].field("quest"), Some(&json!("letter")));
    assert_eq!(
        frame.signals[2].payload,
        json!({ "beat": "first_encounter", "source_tag": "harbor.keeper", "status": "completed" })
    );
    assert_eq!(frame.finished_beats.len(), 1);
    assert_eq!(frame.finished_beats[0].id, id);
    assert_eq!(frame.finished_beats[0].status, BeatStatus::Completed);
}

#[test]
fn deliver_letter_waits_for_signal_and_player() {
    let mut s = scene();
    let scope = CancelScope::new();
    let id = s.stage.play("deliver_letter", scope.token()).unwrap();
    s.stage.tick(0.5);
    assert_eq!(s.port.count(), 0);
    assert_eq!(s.stage.bus().handler_count("letter.delivered"), 1);

    s.stage.bus().emit("letter.delivered", json!(null));
    assert_eq!(s.stage.bus().handler_count("letter.delivered"), 0);
    s.stage.pump();
    assert_eq!(s.port.shown_ids(), vec!["harbor.directions"]);

    s.stage.dialogue().on_display_complete();
    assert_eq!(
        s.stage.dialogue().state(),
        SequencerState::WaitingForContinuation
    );
    s.stage.tick(0.5);
    assert!(s.stage.is_running(id), "manual lines wait for the player");

    s.stage.dialogue().proceed_to_next_line();
    s.stage.dialogue().on_display_complete();
    let frame = s.stage.tick(0.5);
    assert!(!s.stage.is_running(id));
    assert!(signal_names(&frame).contains(&"quest.completed"));
    assert_eq!(frame.finished_beats[0].status, BeatStatus::Completed);
}

#[test]
fn lighthouse_pan_holds_then_returns() {
    let mut s = scene();
    let scope = CancelScope::new();
    s.stage.play("lighthouse_pan", scope.token()).unwrap();

    let mut arrivals = Vec::new();
    let mut done_at = None;
    for tick in 1..=20 {
        let frame = s.stage.tick(0.5);
        for signal in &frame.signals {
            match signal.name.as_str() {
                names::CAMERA_ARRIVED => arrivals.push(tick),
                "pan.done" => done_at = Some(tick),
                _ => {}
            }
        }
        if !frame.finished_beats.is_empty() {
            break;
        }
    }

    // 2 * 0.5^7 < 0.02: arrival on tick 7, hold until 4.5 s, then half a second more.
    assert_eq!(arrivals, vec![7]);
    assert_eq!(done_at, Some(10));
    let track = s.stage.camera().get().unwrap().track_state();
    assert_eq!(track.override_target, None);
    assert_eq!(track.default_subject, Some(HERO));
}

#[test]
fn empty_lines_skip_the_rest_of_the_beat() {
    let mut s = scene();
    let scope = CancelScope::new();
    let id = s.stage.play("silent_dock", scope.token()).unwrap();
    assert!(!s.stage.is_running(id));

    let frame = s.stage.tick(0.5);
    assert_eq!(s.port.count(), 0);
    assert_eq!(signal_names(&frame), vec![names::BEAT_FINISHED]);
    assert_eq!(frame.signals[0].field("status"), Some(&json!("skipped")));
    let finished = &frame.finished_beats[0];
    assert_eq!(finished.status, BeatStatus::Skipped);
    assert!(finished.error.as_deref().unwrap_or("").contains("resolved to text"));
    // silent_dock carries no tag of its own
    assert_eq!(finished.source_tag, "silent_dock");
    // follow_subject after the lines never ran
    let track = s.stage.camera().get().unwrap().track_state();
    assert_eq!(track.default_subject, Some(HERO));
}

#[test]
fn busy_sequencer_skips_the_rest_of_the_beat() {
    let mut s = scene();
    let table = LineTable::from_json(&fixtures::lines::json("harbor").unwrap()).unwrap();
    s.stage
        .dialogue()
        .start_sequence(
            SequenceRequest::new(["harbor.farewell"]).tag("npc.sailor"),
            &table,
        )
        .unwrap();

    let beat = Beat::new("interrupt")
        .step(BeatStep::show_lines(["harbor.greet"], AdvanceMode::Auto))
        .step(BeatStep::publish("interrupt.after", json!(null)));
    let id = s.stage.run(beat);
    assert!(!s.stage.is_running(id));

    let frame = s.stage.tick(0.5);
    assert!(!signal_names(&frame).contains(&"interrupt.after"));
    let finished = &frame.finished_beats[0];
    assert_eq!(finished.status, BeatStatus::Skipped);
    assert!(finished.error.as_deref().unwrap_or("").contains("already playing"));
    assert_eq!(s.port.shown_ids(), vec!["harbor.farewell"]);
    assert_eq!(
        s.stage.dialogue().source_tag().as_deref(),
        Some("npc.sailor")
    );
}

#[test]
fn cancelling_mid_sequence_aborts_it_and_runs_nothing_after() {
    let mut s = scene();
    let scope = CancelScope::new();
    let id = s.stage.play("first_encounter", scope.token()).unwrap();
    for _ in 0..6 {
        s.stage.tick(0.5);
    }
    assert_eq!(s.stage.dialogue().state(), SequencerState::PlayingText);
    assert_eq!(s.stage.bus().handler_count(names::DIALOGUE_FINISHED), 1);

    drop(scope);
    assert_eq!(s.stage.bus().handler_count(names::DIALOGUE_FINISHED), 0);
    assert!(!s.stage.is_running(id));

    let frame = s.stage.tick(0.5);
    assert_eq!(s.stage.dialogue().state(), SequencerState::Idle);
    assert_eq!(signal_names(&frame), vec![names::DIALOGUE_FINISHED]);
    assert_eq!(frame.signals[0].field("aborted"), Some(&json!(true)));
    assert_eq!(frame.finished_beats[0].status, BeatStatus::Cancelled);

    // The release step never ran.
    let camera = s.stage.camera().get().unwrap();
    assert_eq!(camera.track_state().override_target, Some(KEEPER));

    // The typewriter still owes a completion for the aborted greeting. It arrives
    // after the next sequence starts and must not advance it.
    let table = LineTable::from_json(&fixtures::lines::json("harbor").unwrap()).unwrap();
    s.stage
        .dialogue()
        .start_sequence(
            SequenceRequest::new(["harbor.directions", "harbor.farewell"])
                .advance(AdvanceMode::Auto),
            &table,
        )
        .unwrap();
    s.stage.dialogue().on_display_complete();
    let frame = s.stage.tick(0.5);
    assert!(frame.signals.is_empty());
    assert_eq!(
        s.port.shown_ids(),
        vec!["harbor.greet", "harbor.directions"]
    );

    s.stage.dialogue().on_display_complete();
    assert_eq!(
        s.port.shown_ids(),
        vec!["harbor.greet", "harbor.directions", "harbor.farewell"]
    );
}

#[test]
fn cancelled_beat_leaves_no_signal_handlers() {
    let mut s = scene();
    let scope = CancelScope::new();
    let id = s.stage.play("deliver_letter", scope.token()).unwrap();
    assert_eq!(s.stage.bus().handler_count("letter.delivered"), 1);

    assert!(s.stage.cancel(id));
    assert!(!s.stage.cancel(id));
    assert_eq!(s.stage.bus().handler_count("letter.delivered"), 0);

    s.stage.bus().emit("letter.delivered", json!(null));
    s.stage.tick(0.5);
    assert_eq!(s.port.count(), 0);
}

#[test]
fn beats_run_concurrently() {
    let mut s = scene();
    let scope = CancelScope::new();
    let a = s.stage.play("deliver_letter", scope.token()).unwrap();
    let b = s
        .stage
        .run(Beat::new("lamp").step(BeatStep::await_signal("lamp.lit")));
    assert_eq!(s.stage.running(), vec![a, b]);

    s.stage.bus().emit("lamp.lit", json!(null));
    let frame = s.stage.tick(0.5);
    assert_eq!(s.stage.running(), vec![a]);
    assert_eq!(frame.finished_beats[0].name, "lamp");
}

#[test]
fn camera_steps_degrade_without_a_camera() {
    let mut s = scene();
    s.stage = {
        let cfg = s.stage.config().clone();
        let table = LineTable::from_json(&fixtures::lines::json("harbor").unwrap()).unwrap();
        let library = BeatLibrary::from_json(&fixtures::beats::json("harbor").unwrap()).unwrap();
        Stage::new(
            cfg,
            Some(Box::new(s.port.clone())),
            Rc::new(StaticEntities::new()),
            Rc::new(table),
        )
        .without_camera()
        .with_library(library)
    };
    assert!(!s.stage.camera().is_live());

    let scope = CancelScope::new();
    s.stage.play("first_encounter", scope.token()).unwrap();
    // focus is skipped, so the first line is up right away
    assert_eq!(s.port.shown_ids(), vec!["harbor.greet"]);
    // and with no live entities the default anchor is used
    assert_eq!(s.port.last().unwrap().anchor, [0.0, 1.5, 0.0]);

    let frame = s.stage.tick(0.5);
    assert_eq!(frame.camera_position, None);
}

#[test]
fn missing_typewriter_skips_dialogue_beats() {
    init_tracing();
    let table = LineTable::from_json(&fixtures::lines::json("harbor").unwrap()).unwrap();
    let mut stage = Stage::new(
        StageConfig::default(),
        None,
        Rc::new(StaticEntities::new()),
        Rc::new(table),
    );
    stage.run(Beat::new("mute").step(BeatStep::show_lines(["harbor.greet"], AdvanceMode::Auto)));
    let frame = stage.tick(0.016);
    assert_eq!(frame.finished_beats[0].status, BeatStatus::Skipped);
}

#[test]
fn unknown_beat_is_reported() {
    let mut s = scene();
    let scope = CancelScope::new();
    assert_eq!(
        s.stage.play("shipwreck", scope.token()),
        Err(BeatError::UnknownBeat("shipwreck".into()))
    );
}

#[test]
fn frame_serializes_for_hosts() {
    let mut s = scene();
    s.stage.run(Beat::new("hello").step(BeatStep::show_lines(
        ["harbor.greet"],
        AdvanceMode::Manual,
    )));
    let frame = s.stage.tick(0.25);
    assert_relative_eq!(frame.time, 0.25);
    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(value["epoch"], json!(1));
    assert_eq!(value["sequencer_state"], json!("playing_text"));
    assert!(value["camera_position"].is_array());
    assert_eq!(value["dialogue_paused"], json!(false));

    assert!(s.stage.dialogue().pause());
    assert!(s.stage.tick(0.25).dialogue_paused);
}
