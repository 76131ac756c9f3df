//! Output guards for the speed control module
//!
//! Each guard is an independent bounded-output filter or floor. They are
//! deliberately free of any knowledge of the rest of the control loop so
//! their behaviour can be verified in isolation.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use util::maths::clamp_unit;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Bounds the rate of change of an output.
///
/// The output may move at most `max_delta_per_s * dt` away from its own
/// previous output each step.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Maximum absolute output change per second.
    pub max_delta_per_s: f64,

    last: f64,
}

/// Bounds both the rate and the rate-of-change-of-rate of an output.
///
/// The limiter integrates an internal rate each step and clamps the output
/// into [0, 1].
#[derive(Debug, Clone)]
pub struct JerkLimiter {
    /// Maximum absolute output rate.
    ///
    /// Units: 1/second
    pub max_rate_per_s: f64,

    /// Maximum absolute change of the output rate.
    ///
    /// Units: 1/second^2
    pub max_jerk_per_s2: f64,

    rate: f64,
    output: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RateLimiter {
    pub fn new(max_delta_per_s: f64) -> Self {
        Self {
            max_delta_per_s,
            last: 0.0,
        }
    }

    /// Reset the limiter to a known output value.
    pub fn reset(&mut self, value: f64) {
        self.last = clamp_unit(value);
    }

    /// Advance the limiter by `dt` towards `desired`.
    pub fn step(&mut self, desired: f64, dt: f64) -> f64 {
        let desired = clamp_unit(desired);
        let max_delta = f64::max(1e-6, self.max_delta_per_s) * f64::max(1e-3, dt);

        let lo = self.last - max_delta;
        let hi = self.last + max_delta;
        let out = f64::min(hi, f64::max(lo, desired));

        self.last = out;
        out
    }
}

impl JerkLimiter {
    pub fn new(max_rate_per_s: f64, max_jerk_per_s2: f64) -> Self {
        Self {
            max_rate_per_s,
            max_jerk_per_s2,
            rate: 0.0,
            output: 0.0,
        }
    }

    /// Reset the limiter to a known output value with zero rate.
    pub fn reset(&mut self, output: f64) {
        self.output = clamp_unit(output);
        self.rate = 0.0;
    }

    /// Advance the limiter by `dt` towards `target`.
    pub fn step(&mut self, target: f64, dt: f64) -> f64 {
        let dt = f64::max(1e-3, dt);

        // Rate that would reach the target this step, capped to max rate
        let rate_target =
            ((target - self.output) / dt).clamp(-self.max_rate_per_s, self.max_rate_per_s);

        // Limit the change of rate
        let max_rate_delta = self.max_jerk_per_s2 * dt;
        let rate_delta = (rate_target - self.rate).clamp(-max_rate_delta, max_rate_delta);
        self.rate += rate_delta;

        // Integrate the output
        self.output = clamp_unit(self.output + self.rate * dt);
        self.output
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Minimum brake level demanded when the speed exceeds the limit.
///
/// Returns 0 while the speed is within `tolerance_kph` of the limit, and a
/// floor which grows with the excess otherwise. The floor is always a lower
/// bound on the final brake command and is never overridden downwards.
pub fn overspeed_guard(speed_kph: f64, limit_kph: Option<f64>, tolerance_kph: f64) -> f64 {
    let limit_kph = match limit_kph {
        Some(l) if l.is_finite() => l,
        _ => return 0.0,
    };

    if speed_kph <= limit_kph + tolerance_kph {
        return 0.0;
    }

    let excess_kph = speed_kph - (limit_kph + tolerance_kph);
    clamp_unit(0.2 + 0.1 * excess_kph)
}
