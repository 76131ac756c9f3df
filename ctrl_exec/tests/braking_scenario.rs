//! Closed-loop braking scenario
//!
//! Drives the speed control module against a simple point-mass vehicle
//! model: 120 kph with an 80 kph limit announced 500 m ahead. The
//! controller must transition from cruise to braking before the limit point
//! and arrive at it at or below the limit (plus a small epsilon).

use ctrl_lib::speed_ctrl::{HysteresisParams, InputData, Params, SpeedCtrl};
use util::maths::{kph_to_mps, mps_to_kph};
use util::module::State;
use veh_if::ctrl::{CtrlMode, Phase};
use veh_if::telem::{LimitEvent, TelemSample};

/// Simulation step.
const DT_S: f64 = 0.2;

/// Peak acceleration at full throttle.
const THROTTLE_ACCEL_MPS2: f64 = 0.3;

/// Peak deceleration at full brake, deliberately stronger than the 0.7
/// m/s^2 the braking rule assumes.
const BRAKE_DECEL_MPS2: f64 = 2.0;

fn scenario_params() -> Params {
    let mut params = Params {
        mode: CtrlMode::Full,
        startup_gate_s: 0.0,
        kp_brake: 0.2,
        ..Params::default()
    };
    params.braking.margin_kph = 2.0;
    params.braking.max_service_decel_mps2 = 0.7;
    params.hysteresis = HysteresisParams::default();
    params
}

#[test]
fn approach_brakes_before_the_limit_point() {
    let mut ctrl = SpeedCtrl::with_params(scenario_params());

    let mut t_wall = 1000.0;
    let mut odom_m = 0.0;
    let mut v_mps = kph_to_mps(120.0);

    let mut first_phase = None;
    let mut braked_before_limit = false;

    let mut step = 0;
    while odom_m < 500.0 {
        step += 1;
        assert!(step < 2000, "vehicle never reached the limit point");

        let input = InputData {
            sample: TelemSample {
                t_wall,
                odom_m,
                speed_kph: mps_to_kph(v_mps),
                next_limit_kph: None,
                dist_next_limit_m: None,
            },
            limit_events: if step == 1 {
                vec![LimitEvent {
                    t_wall,
                    limit_kph: 80.0,
                    dist_m: 500.0,
                }]
            } else {
                vec![]
            },
        };

        let (output, _) = ctrl.proc(&input).unwrap();

        if first_phase.is_none() {
            first_phase = Some(output.phase);
        }
        if output.phase == Phase::Brake {
            braked_before_limit = true;
        }

        // Point-mass vehicle response to the dispatched command
        let throttle = output.send.throttle.unwrap_or(0.0);
        let brake = output.send.brake.unwrap_or(0.0);
        let accel = THROTTLE_ACCEL_MPS2 * throttle - BRAKE_DECEL_MPS2 * brake;

        v_mps = f64::max(0.0, v_mps + accel * DT_S);
        odom_m += v_mps * DT_S;
        t_wall += DT_S;
    }

    // Far from the limit the controller cruises
    assert_eq!(first_phase, Some(Phase::Cruise));

    // The phase transition happened before the distance ran out
    assert!(braked_before_limit);

    // At the limit point the speed is at or below the limit plus epsilon
    let final_kph = mps_to_kph(v_mps);
    assert!(
        final_kph <= 80.5,
        "arrived at the limit point at {:.2} kph",
        final_kph
    );
}

#[test]
fn active_limit_keeps_the_speed_down_after_the_limit_point() {
    let mut ctrl = SpeedCtrl::with_params(scenario_params());

    let mut t_wall = 1000.0;
    let mut odom_m = 0.0;
    let mut v_mps = kph_to_mps(120.0);

    // Run 90 simulated seconds, 500 m approach plus cruise beyond it
    for step in 0..450 {
        let input = InputData {
            sample: TelemSample {
                t_wall,
                odom_m,
                speed_kph: mps_to_kph(v_mps),
                next_limit_kph: None,
                dist_next_limit_m: None,
            },
            limit_events: if step == 0 {
                vec![LimitEvent {
                    t_wall,
                    limit_kph: 80.0,
                    dist_m: 500.0,
                }]
            } else {
                vec![]
            },
        };

        let (output, _) = ctrl.proc(&input).unwrap();

        let throttle = output.send.throttle.unwrap_or(0.0);
        let brake = output.send.brake.unwrap_or(0.0);
        let accel = THROTTLE_ACCEL_MPS2 * throttle - BRAKE_DECEL_MPS2 * brake;

        v_mps = f64::max(0.0, v_mps + accel * DT_S);
        odom_m += v_mps * DT_S;
        t_wall += DT_S;
    }

    // Well past the limit point the limit is in force
    assert!(odom_m > 500.0);
    assert_eq!(ctrl.active_limit_kph(), Some(80.0));

    // And the vehicle holds at or below it
    assert!(
        mps_to_kph(v_mps) <= 80.5,
        "speed {:.2} kph above the active limit",
        mps_to_kph(v_mps)
    );
}
