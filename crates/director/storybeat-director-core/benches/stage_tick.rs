//! Stage tick benchmarks.
//!
//! Run: cargo bench -p storybeat-director-core -- stage_tick

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use storybeat_api::{EntityRef, LineRecord, LineTable, RecordingTypewriter, StaticEntities};
use storybeat_dialogue::AdvanceMode;
use storybeat_director::{Beat, BeatStep, Stage, StageConfig};

fn stage() -> Stage {
    let mut table = LineTable::new();
    table.insert(LineRecord::new("bench.a", "Steady as she goes."));
    let world = StaticEntities::new()
        .with(EntityRef(1), [0.0, 0.0, 0.0])
        .with(EntityRef(2), [50.0, 0.0, 0.0]);
    Stage::new(
        StageConfig::default(),
        Some(Box::new(RecordingTypewriter::new())),
        Rc::new(world),
        Rc::new(table),
    )
}

/// Idle scene: clock, camera following its subject, no beats.
fn bench_idle_tick(c: &mut Criterion) {
    let mut stage = stage();
    if let Ok(camera) = stage.camera().get() {
        camera.set_default_subject(EntityRef(1));
    }
    c.bench_function("stage_tick_idle", |b| {
        b.iter(|| black_box(stage.tick(black_box(1.0 / 60.0))))
    });
}

/// A beat parked on manual dialogue while the camera chases an override target.
fn bench_tick_with_running_beat(c: &mut Criterion) {
    let mut stage = stage();
    stage.run(
        Beat::new("bench")
            .step(BeatStep::FocusCamera {
                target: EntityRef(2),
                await_arrival: false,
            })
            .step(BeatStep::show_lines(["bench.a"], AdvanceMode::Manual)),
    );
    c.bench_function("stage_tick_running_beat", |b| {
        b.iter(|| black_box(stage.tick(black_box(1.0 / 60.0))))
    });
}

criterion_group!(benches, bench_idle_tick, bench_tick_with_running_beat);
criterion_main!(benches);
