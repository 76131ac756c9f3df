//! Target speed computation
//!
//! Combines the deceleration profile with the current limit context to give
//! the highest speed that is currently safe, and the control phase that
//! speed implies.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use veh_if::ctrl::Phase;

// Internal
use super::{BrakingParams, DecelProfile};
use util::maths::{clamp, kph_to_mps};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The braking engine's answer for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrakingDemand {
    /// Maximum speed that is currently safe.
    ///
    /// Units: kilometers/hour
    pub v_safe_kph: f64,

    /// The control phase implied by the safe speed.
    pub phase: Phase,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the safe speed and phase for the current limit context.
///
/// The remaining distance is first discounted by the distance covered during
/// the reaction time. An unknown distance with a known limit is treated as
/// zero remaining distance, which is the conservative choice. If no limit is
/// known the current speed is safe by definition and the phase is `Cruise`.
pub fn compute_demand(
    speed_kph: f64,
    next_limit_kph: Option<f64>,
    dist_next_limit_m: Option<f64>,
    profile: &DecelProfile,
    params: &BrakingParams,
) -> BrakingDemand {
    let limit_kph = match next_limit_kph {
        Some(l) if l.is_finite() => l,
        _ => {
            return BrakingDemand {
                v_safe_kph: speed_kph,
                phase: Phase::Cruise,
            }
        }
    };

    // Adjusted target: margin below the limit, never negative
    let v_lim_adj_kph = f64::max(0.0, limit_kph - params.margin_kph);

    // Effective distance net of the reaction-time coast
    let dist_m = match dist_next_limit_m {
        Some(d) if d.is_finite() => f64::max(0.0, d),
        _ => 0.0,
    };
    let d_eff_m = f64::max(0.0, dist_m - kph_to_mps(speed_kph.max(0.0)) * params.reaction_time_s);

    let v_safe_raw = profile.max_speed_for_distance_kph(d_eff_m, v_lim_adj_kph, params);

    // Failsafe: a poisoned result must not drive the control loop
    if !v_safe_raw.is_finite() {
        return BrakingDemand {
            v_safe_kph: speed_kph,
            phase: Phase::Cruise,
        };
    }

    let v_safe_kph = clamp(&v_safe_raw, &params.min_target_kph, &params.max_speed_kph);

    let phase = if v_safe_kph < speed_kph - params.coast_band_kph {
        Phase::Brake
    } else if v_safe_kph <= speed_kph + params.coast_band_kph {
        Phase::Coast
    } else {
        Phase::Cruise
    };

    BrakingDemand { v_safe_kph, phase }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_limit_is_cruise_at_current_speed() {
        let profile = DecelProfile::constant(0.7);
        let params = BrakingParams::default();

        let demand = compute_demand(97.0, None, None, &profile, &params);
        assert_eq!(demand.v_safe_kph, 97.0);
        assert_eq!(demand.phase, Phase::Cruise);
    }

    #[test]
    fn close_limit_demands_braking() {
        let profile = DecelProfile::constant(0.7);
        let params = BrakingParams::default();

        // 120 kph with 80 kph limit only 100 m ahead: far too fast
        let demand = compute_demand(120.0, Some(80.0), Some(100.0), &profile, &params);
        assert_eq!(demand.phase, Phase::Brake);
        assert!(demand.v_safe_kph < 120.0);
    }

    #[test]
    fn distant_limit_is_cruise() {
        let profile = DecelProfile::constant(0.7);
        let params = BrakingParams::default();

        let demand = compute_demand(120.0, Some(80.0), Some(10_000.0), &profile, &params);
        assert_eq!(demand.phase, Phase::Cruise);
        assert!(demand.v_safe_kph > 120.0);
    }

    #[test]
    fn unknown_distance_with_limit_is_conservative() {
        let profile = DecelProfile::constant(0.7);
        let params = BrakingParams::default();

        // Limit known but no distance: treated as already at the limit point
        let demand = compute_demand(120.0, Some(80.0), None, &profile, &params);
        assert!(demand.v_safe_kph <= 80.0);
        assert_eq!(demand.phase, Phase::Brake);
    }

    #[test]
    fn safe_speed_monotonic_in_distance() {
        let profile = DecelProfile::constant(0.7);
        let params = BrakingParams::default();

        let mut prev = 0.0;
        for d in &[0.0, 100.0, 200.0, 400.0, 800.0] {
            let demand = compute_demand(120.0, Some(80.0), Some(*d), &profile, &params);
            assert!(demand.v_safe_kph >= prev);
            prev = demand.v_safe_kph;
        }
    }

    #[test]
    fn nan_fields_fall_back_to_cruise() {
        let profile = DecelProfile::constant(0.7);
        let params = BrakingParams::default();

        let demand = compute_demand(
            100.0,
            Some(std::f64::NAN),
            Some(std::f64::NAN),
            &profile,
            &params,
        );
        assert_eq!(demand.v_safe_kph, 100.0);
        assert_eq!(demand.phase, Phase::Cruise);
    }
}
