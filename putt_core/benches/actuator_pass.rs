use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use putt_core::mocks::{MemoryStore, RecordingDriver};
use putt_core::{ActuatorCfg, ActuatorControl, AtomicErrorCodes, NUM_ACTUATORS, RolloutPlan};
use putt_traits::ManualClock;

fn control(step: u8) -> ActuatorControl<RecordingDriver, MemoryStore> {
    let cfg = ActuatorCfg {
        rollout_delay_ms: 0,
        step,
        ..ActuatorCfg::default()
    };
    let mut ctl = ActuatorControl::new(
        cfg,
        RecordingDriver::new(),
        MemoryStore::new(),
        Arc::new(AtomicErrorCodes::new()),
        Arc::new(ManualClock::new()),
    )
    .expect("config");
    ctl.init().expect("init");
    ctl
}

pub fn bench_passes(c: &mut Criterion) {
    // Settled course: the common case, nothing to roll out.
    let mut idle = control(5);
    c.bench_function("actuator_pass_idle", |b| b.iter(|| idle.run()));

    // Every actuator moves: full 45-write rollout per pass.
    c.bench_function("actuator_pass_full_rollout", |b| {
        b.iter_batched(
            || {
                let ctl = control(90);
                ctl.handle()
                    .update_desired_positions(&[90; NUM_ACTUATORS])
                    .expect("update");
                ctl
            },
            |mut ctl| {
                ctl.run();
                black_box(ctl.current_positions()[0]);
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("rollout_plan_build", |b| {
        b.iter(|| RolloutPlan::new(black_box(45), 5, 15, &[0x40, 0x41, 0x42]))
    });
}

criterion_group!(benches, bench_passes);
criterion_main!(benches);
