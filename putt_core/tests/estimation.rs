mod common;

use common::{rig, test_config};
use proptest::prelude::*;
use putt_core::{Command, ErrorCode, EstimationState, SensorId};
use rstest::rstest;

fn auto_rig() -> common::Rig {
    let mut cfg = test_config();
    cfg.estimation.auto_dispense = true;
    rig(cfg)
}

fn state(r: &common::Rig) -> EstimationState {
    r.sys.estimation().state()
}

#[test]
fn departure_then_hole_counts_one_of_each_and_returns_once() {
    let mut r = auto_rig();
    r.control_tick();
    assert_eq!(state(&r), EstimationState::ReadyToHit);
    r.sys.tick_queue();
    assert!(r.player_motor.running(), "first ball dispensed on start");

    r.pulse(SensorId::BallDeparture);
    r.control_tick();
    assert!(matches!(state(&r), EstimationState::InTransitOnEnter { .. }));
    r.control_tick();
    assert!(matches!(state(&r), EstimationState::InTransit { .. }));

    r.pulse(SensorId::BallInHole);
    r.control_tick();
    assert_eq!(state(&r), EstimationState::InHole);
    r.control_tick();
    assert!(matches!(state(&r), EstimationState::InGutter { .. }));

    let est = r.ctl.estimation();
    assert_eq!(est.balls_hit(), 1);
    assert_eq!(est.balls_in_hole(), 1);
    assert_eq!(r.ctl.queue().ball_in_hole_requests(), 1);

    r.control_ticks(20);
    assert_eq!(r.ctl.queue().ball_in_hole_requests(), 1);
    assert_eq!(r.ctl.stats_payload(), [1, 1]);
}

#[test]
fn gutter_without_hole_keeps_the_event_for_in_gutter() {
    let mut r = auto_rig();
    r.control_tick();
    r.pulse(SensorId::BallDeparture);
    r.control_ticks(2);

    r.pulse(SensorId::BallInGutter);
    r.control_tick();
    assert!(matches!(state(&r), EstimationState::InGutter { .. }));
    assert!(r.sys.sensors().get(SensorId::BallInGutter));

    r.control_tick();
    assert_eq!(state(&r), EstimationState::ReadyToHitOnEnter);
    assert!(!r.sys.sensors().get(SensorId::BallInGutter));
    r.control_tick();
    assert_eq!(state(&r), EstimationState::ReadyToHit);

    let stats = r.ctl.estimation().stats();
    assert_eq!((stats.balls_hit, stats.balls_in_hole), (1, 0));
    assert_eq!(r.ctl.queue().ball_in_hole_requests(), 0);
    assert!(!r.ctl.errors().is_set(ErrorCode::BallInHoleFeed));
}

#[test]
fn lost_ball_goes_stuck_and_asks_for_another() {
    let mut r = auto_rig();
    r.control_tick();
    r.pulse(SensorId::BallDeparture);
    r.control_ticks(2);

    let mut ticks = 0;
    while matches!(state(&r), EstimationState::InTransit { .. }) {
        r.control_tick();
        ticks += 1;
        assert!(ticks <= 600, "never timed out");
    }
    // Stuck hands over to a fresh ball on the next tick.
    assert_eq!(state(&r), EstimationState::Stuck);
    r.control_tick();
    assert_eq!(state(&r), EstimationState::ReadyToHit);

    r.sys.tick_queue();
    assert_eq!(r.ctl.queue().remaining_player_balls(), 2);
}

#[test]
fn ball_that_never_reaches_gutter_raises_feed_error() {
    let mut r = auto_rig();
    r.control_tick();
    r.pulse(SensorId::BallDeparture);
    r.control_ticks(2);
    r.pulse(SensorId::BallInHole);
    r.control_ticks(2);
    assert!(matches!(state(&r), EstimationState::InGutter { .. }));

    r.control_ticks(699);
    assert!(matches!(state(&r), EstimationState::InGutter { .. }));
    assert!(!r.ctl.errors().is_set(ErrorCode::BallInHoleFeed));
    r.control_tick();
    assert_eq!(state(&r), EstimationState::ReadyToHitOnEnter);
    assert!(r.ctl.errors().is_set(ErrorCode::BallInHoleFeed));
}

#[test]
fn stray_departure_from_last_cycle_is_ignored() {
    let mut r = auto_rig();
    r.control_tick();
    r.pulse(SensorId::BallDeparture);
    r.control_ticks(2);
    r.pulse(SensorId::BallInGutter);
    r.control_tick();

    // Bounce on the tee while the ball is still in the gutter.
    r.pulse(SensorId::BallDeparture);
    r.control_ticks(3);
    assert_eq!(state(&r), EstimationState::ReadyToHit);
    assert_eq!(r.ctl.estimation().balls_hit(), 1);
}

#[test]
fn without_auto_dispense_only_counts() {
    let mut r = rig(test_config());
    r.control_tick();
    assert_eq!(state(&r), EstimationState::NoTracking);

    r.pulse(SensorId::BallDeparture);
    r.control_tick();
    r.pulse(SensorId::BallInHole);
    r.control_tick();

    assert_eq!(r.ctl.estimation().balls_hit(), 1);
    assert_eq!(r.ctl.estimation().balls_in_hole(), 1);
    assert_eq!(r.ctl.queue().ball_in_hole_requests(), 1);
    assert_eq!(state(&r), EstimationState::NoTracking);
    r.sys.tick_queue();
    assert!(!r.player_motor.running());
}

#[test]
fn sunk_ball_without_hit_is_clamped_and_flagged() {
    let mut r = rig(test_config());
    r.control_tick();
    r.pulse(SensorId::BallInHole);
    r.control_tick();
    assert_eq!(r.ctl.estimation().balls_in_hole(), 0);
    assert!(r.ctl.errors().is_set(ErrorCode::BallMath));
    // The ball still has to go back.
    assert_eq!(r.ctl.queue().ball_in_hole_requests(), 1);
}

#[test]
fn glitch_is_not_counted() {
    let mut r = rig(test_config());
    r.control_tick();
    r.glitch(SensorId::BallDeparture);
    r.control_ticks(3);
    assert_eq!(r.ctl.estimation().balls_hit(), 0);
}

#[test]
fn enabling_auto_dispense_starts_tracking() {
    let mut r = rig(test_config());
    r.control_tick();
    r.ctl
        .apply(&Command::Settings {
            auto_dispense: true,
        })
        .unwrap();
    r.control_tick();
    assert_eq!(state(&r), EstimationState::ReadyToHit);
}

#[rstest]
#[case(true)]
#[case(false)]
fn reset_applies_on_next_tick(#[case] auto: bool) {
    let mut cfg = test_config();
    cfg.estimation.auto_dispense = auto;
    let mut r = rig(cfg);
    r.control_tick();
    r.pulse(SensorId::BallDeparture);
    r.control_tick();
    assert_eq!(r.ctl.estimation().balls_hit(), 1);

    r.ctl.apply(&Command::ResetStats).unwrap();
    assert_eq!(r.ctl.estimation().balls_hit(), 1);
    r.control_tick();
    assert_eq!(r.ctl.estimation().balls_hit(), 0);
    assert_eq!(r.ctl.stats_payload(), [0, 0]);
}

#[derive(Debug, Clone)]
enum Event {
    Sensor(SensorId),
    Wait(u64),
    Auto(bool),
    Reset,
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        prop::sample::select(SensorId::ALL.to_vec()).prop_map(Event::Sensor),
        (10u64..8_000).prop_map(Event::Wait),
        any::<bool>().prop_map(Event::Auto),
        Just(Event::Reset),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn in_hole_never_exceeds_hit(events in prop::collection::vec(event(), 1..40)) {
        let mut r = rig(test_config());
        for ev in events {
            match ev {
                Event::Sensor(id) => r.pulse(id),
                Event::Wait(ms) => r.clock.advance_ms(ms),
                Event::Auto(on) => r.ctl.estimation().set_auto_dispense(on),
                Event::Reset => r.ctl.estimation().reset_stats(),
            }
            r.control_tick();
            let s = r.ctl.estimation().stats();
            prop_assert!(s.balls_in_hole <= s.balls_hit, "{s:?}");
        }
    }
}
