//! Brake hysteresis and ramp
//!
//! A two-state Schmitt trigger with a minimum hold time, plus a bounded-rate
//! ramp of the continuous brake output. The dual thresholds stop the brake
//! chattering around a single threshold, the hold window stops a transient
//! error dip releasing a brake application that has only just begun.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use util::maths::clamp_unit;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Bounds applied to the per-step elapsed time.
///
/// Protects the ramp against pauses and out-of-order samples.
const MIN_STEP_S: f64 = 1e-3;
const MAX_STEP_S: f64 = 0.5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the brake hysteresis.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HysteresisParams {
    /// Overspeed error above which the brake switches on.
    ///
    /// Units: kilometers/hour
    pub on_threshold_kph: f64,

    /// Overspeed error below which the brake may switch off.
    ///
    /// Units: kilometers/hour
    pub off_threshold_kph: f64,

    /// Minimum time the brake stays on once activated.
    ///
    /// Units: seconds
    pub hold_s: f64,

    /// Maximum rate of increase of the brake output.
    ///
    /// Units: 1/second
    pub rise_per_s: f64,

    /// Maximum rate of decrease of the brake output.
    ///
    /// Units: 1/second
    pub fall_per_s: f64,
}

/// The brake on/off state machine and output ramp.
#[derive(Debug, Clone)]
pub struct BrakeHysteresis {
    params: HysteresisParams,

    on: bool,

    /// Time the brake has been on since the last activation.
    ///
    /// Units: seconds
    held_s: f64,

    output: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for HysteresisParams {
    fn default() -> Self {
        Self {
            on_threshold_kph: 3.0,
            off_threshold_kph: 1.0,
            hold_s: 0.5,
            rise_per_s: 2.0,
            fall_per_s: 1.0,
        }
    }
}

impl BrakeHysteresis {
    pub fn new(params: HysteresisParams) -> Self {
        Self {
            params,
            on: false,
            held_s: 0.0,
            output: 0.0,
        }
    }

    /// True if the brake state machine is currently on.
    pub fn is_on(&self) -> bool {
        self.on
    }

    /// The current ramped output in [0, 1].
    pub fn output(&self) -> f64 {
        self.output
    }

    /// Advance the state machine and ramp by one step.
    ///
    /// # Inputs
    /// - `overspeed_kph`: how far the current speed is above the target
    ///   (positive means braking is wanted).
    /// - `guard_floor`: the minimum brake demanded by the guards, a nonzero
    ///   floor forces and holds the on state.
    /// - `desired`: the brake level the controller wants while on.
    /// - `dt_s`: elapsed wall time since the previous step, clamped to a
    ///   sane range internally.
    pub fn step(&mut self, overspeed_kph: f64, guard_floor: f64, desired: f64, dt_s: f64) -> f64 {
        let dt_s = dt_s.clamp(MIN_STEP_S, MAX_STEP_S);

        if self.on {
            self.held_s += dt_s;

            // Off only below the lower threshold, with no guard demanding
            // brake, once the hold window has elapsed
            if overspeed_kph < self.params.off_threshold_kph
                && guard_floor <= 0.0
                && self.held_s >= self.params.hold_s
            {
                self.on = false;
            }
        } else if overspeed_kph > self.params.on_threshold_kph || guard_floor > 0.0 {
            self.on = true;
            self.held_s = 0.0;
        }

        // Ramp towards the desired level (or zero when off) with independent
        // rise and fall rates
        let target = if self.on {
            clamp_unit(f64::max(desired, guard_floor))
        } else {
            0.0
        };

        if target > self.output {
            self.output = f64::min(target, self.output + self.params.rise_per_s * dt_s);
        } else {
            self.output = f64::max(target, self.output - self.params.fall_per_s * dt_s);
        }
        self.output = clamp_unit(self.output);

        self.output
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn hyst() -> BrakeHysteresis {
        BrakeHysteresis::new(HysteresisParams::default())
    }

    #[test]
    fn switches_on_above_upper_threshold() {
        let mut h = hyst();
        h.step(5.0, 0.0, 0.5, 0.1);
        assert!(h.is_on());
    }

    #[test]
    fn stays_off_below_upper_threshold() {
        let mut h = hyst();
        h.step(2.0, 0.0, 0.5, 0.1);
        assert!(!h.is_on());
        assert_eq!(h.output(), 0.0);
    }

    #[test]
    fn guard_floor_forces_on() {
        let mut h = hyst();
        h.step(0.0, 0.3, 0.0, 0.1);
        assert!(h.is_on());
        assert!(h.output() > 0.0);
    }

    #[test]
    fn hold_window_blocks_release() {
        let mut h = hyst();
        h.step(5.0, 0.0, 0.5, 0.1);
        assert!(h.is_on());

        // Error collapses immediately, but the 0.5 s hold has not elapsed
        h.step(0.0, 0.0, 0.5, 0.1);
        h.step(0.0, 0.0, 0.5, 0.1);
        assert!(h.is_on());

        // After the hold window the release goes through
        h.step(0.0, 0.0, 0.5, 0.2);
        h.step(0.0, 0.0, 0.5, 0.2);
        assert!(!h.is_on());
    }

    #[test]
    fn release_blocked_while_guard_demands_brake() {
        let mut h = hyst();
        h.step(5.0, 0.1, 0.5, 0.1);

        // Hold window elapsed but the guard still wants brake
        for _ in 0..10 {
            h.step(0.0, 0.1, 0.5, 0.2);
        }
        assert!(h.is_on());
    }

    #[test]
    fn output_ramps_at_bounded_rates() {
        let mut h = BrakeHysteresis::new(HysteresisParams {
            rise_per_s: 1.0,
            fall_per_s: 0.5,
            ..HysteresisParams::default()
        });

        // Rise bounded at rise_per_s * dt
        let out = h.step(10.0, 0.0, 1.0, 0.1);
        assert!((out - 0.1).abs() < 1e-9);

        // Run the ramp up to full
        for _ in 0..20 {
            h.step(10.0, 0.0, 1.0, 0.1);
        }
        assert!((h.output() - 1.0).abs() < 1e-9);

        // Fall bounded at fall_per_s * dt once off
        for _ in 0..10 {
            h.step(0.0, 0.0, 0.0, 0.1);
        }
        let before = h.output();
        let after = h.step(0.0, 0.0, 0.0, 0.1);
        assert!(before - after <= 0.5 * 0.1 + 1e-9);
    }

    #[test]
    fn step_time_is_clamped() {
        let mut h = hyst();

        // A huge dt (pause) must not ramp further than the clamped maximum
        let out = h.step(10.0, 0.0, 1.0, 60.0);
        assert!(out <= h.params.rise_per_s * 0.5 + 1e-9);
    }
}
