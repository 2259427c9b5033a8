mod common;

use std::time::Duration;

use common::{rig, test_config};
use putt_core::mocks::{MemoryStore, RecordingDriver, ScriptedInput, SpyMotor};
use putt_core::payload::{COURSE_STATE_LEN, decode_course_state, decode_dispense, decode_settings};
use putt_core::{BuildError, Command, CourseSystem, CourseSystemBuilder, NUM_ACTUATORS, SensorId};
use rstest::rstest;

fn complete_builder() -> CourseSystemBuilder {
    let mut b = CourseSystem::builder()
        .with_config(test_config())
        .with_driver(RecordingDriver::new())
        .with_store(MemoryStore::new())
        .with_ball_in_hole_motor(SpyMotor::new())
        .with_player_motor(SpyMotor::new());
    for id in SensorId::ALL {
        b = b.with_input(id, ScriptedInput::new());
    }
    b
}

#[test]
fn missing_pieces_are_reported() {
    let err = CourseSystem::builder().build().err().unwrap();
    assert!(matches!(err, BuildError::MissingDriver));

    let err = CourseSystem::builder()
        .with_driver(RecordingDriver::new())
        .with_store(MemoryStore::new())
        .with_ball_in_hole_motor(SpyMotor::new())
        .build()
        .err()
        .unwrap();
    assert_eq!(err.to_string(), "missing player motor");

    let err = CourseSystem::builder()
        .with_driver(RecordingDriver::new())
        .with_store(MemoryStore::new())
        .with_ball_in_hole_motor(SpyMotor::new())
        .with_player_motor(SpyMotor::new())
        .with_input(SensorId::BallInHole, ScriptedInput::new())
        .build()
        .err()
        .unwrap();
    assert_eq!(err.to_string(), "missing ball_in_gutter input");
}

#[rstest]
#[case::groups(|c: &mut putt_core::CoreConfig| c.actuators.rollout_groups = 4, "rollout groups")]
#[case::chips(|c: &mut putt_core::CoreConfig| c.actuators.chips.truncate(2), "cannot hold 45")]
#[case::period(|c: &mut putt_core::CoreConfig| c.scheduler.queue_period_ms = 0, "periods")]
fn bad_config_is_rejected(
    #[case] tweak: fn(&mut putt_core::CoreConfig),
    #[case] needle: &str,
) {
    let mut cfg = test_config();
    tweak(&mut cfg);
    let err = complete_builder().with_config(cfg).build().err().unwrap();
    assert!(matches!(err, BuildError::InvalidConfig(_)));
    assert!(err.to_string().contains(needle), "{err}");
}

#[test]
fn course_payload_drives_the_course_flat_to_ninety() {
    let mut r = rig(test_config());
    assert_eq!(r.ctl.actuators().current_positions(), [0; NUM_ACTUATORS]);

    let mut body = vec![90u8; COURSE_STATE_LEN];
    body[0] = 0;
    let cmd = decode_course_state(&body).unwrap();
    r.ctl.apply(&cmd).unwrap();

    r.control_ticks(18);
    assert_eq!(r.ctl.actuators().current_positions(), [90; NUM_ACTUATORS]);
    assert_eq!(r.store.blob(), Some(vec![90; NUM_ACTUATORS]));
    assert_eq!(r.ctl.course_payload(), {
        let mut expect = [90u8; COURSE_STATE_LEN];
        expect[0] = 0;
        expect
    });
}

#[test]
fn dispense_and_clear_commands_reach_their_machines() {
    let mut r = rig(test_config());
    r.ctl.apply(&decode_dispense(&[3]).unwrap()).unwrap();
    r.queue_tick();
    assert!(r.player_motor.running());
    assert_eq!(r.ctl.queue().remaining_player_balls(), 3);

    r.ctl.apply(&Command::ClearSequence).unwrap();
    r.control_tick();
    assert!(r.ctl.actuators().clear_active());
}

#[rstest]
#[case(&[11][..])]
#[case(&[][..])]
#[case(&[1, 2][..])]
fn bad_dispense_bodies(#[case] body: &[u8]) {
    assert!(decode_dispense(body).is_err());
}

#[rstest]
#[case(&[2][..])]
#[case(&[][..])]
fn bad_settings_bodies(#[case] body: &[u8]) {
    assert!(decode_settings(body).is_err());
}

#[test]
fn non_static_mode_byte_is_rejected() {
    let mut body = vec![0u8; COURSE_STATE_LEN];
    body[0] = 1;
    let err = decode_course_state(&body).unwrap_err();
    assert!(err.to_string().contains("mode"));
    assert!(decode_course_state(&body[..NUM_ACTUATORS]).is_err());
}

#[test]
fn error_payload_tracks_flags() {
    let mut r = rig(test_config());
    assert_eq!(r.ctl.error_payload(), [0, 0, 0, 0]);
    r.store.fail_writes(true);
    r.ctl
        .apply(&Command::SetCourse {
            mode: putt_core::Mode::Static,
            positions: [1; NUM_ACTUATORS],
        })
        .unwrap();
    r.control_tick();
    assert_eq!(r.ctl.error_payload(), [0, 0, 0, 1]);
}

#[test]
fn running_system_ticks_and_shuts_down() {
    let driver = RecordingDriver::new();
    let mut b = CourseSystem::builder()
        .with_driver(driver.clone())
        .with_store(MemoryStore::new())
        .with_ball_in_hole_motor(SpyMotor::new())
        .with_player_motor(SpyMotor::new());
    for id in SensorId::ALL {
        b = b.with_input(id, ScriptedInput::new());
    }
    let mut cfg = test_config();
    cfg.actuators.step = 90;
    let running = b.with_config(cfg).build().unwrap().start().unwrap();

    let ctl = running.controller();
    ctl.apply(&Command::SetCourse {
        mode: putt_core::Mode::Static,
        positions: [45; NUM_ACTUATORS],
    })
    .unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while ctl.actuators().current_positions() != [45; NUM_ACTUATORS] {
        assert!(std::time::Instant::now() < deadline, "course never moved");
        std::thread::sleep(Duration::from_millis(5));
    }

    let stats = running.shutdown();
    let names: Vec<_> = stats.iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["sensors", "control", "queue"]);
    assert!(stats.iter().all(|s| s.ticks >= 1));
    assert_eq!(driver.initialized_chips().len(), 3);
}
