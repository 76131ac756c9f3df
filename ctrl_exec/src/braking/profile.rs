//! Deceleration profile implementations
//!
//! A profile answers two questions: how far does the vehicle need to brake
//! from one speed down to another, and (the inverse) what is the highest
//! speed from which the target can still be reached within a given distance.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::path::Path;

// Internal
use super::{BrakingParams, ProfileError};
use util::maths::{kph_to_mps, lin_interp, mps_to_kph};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Speed step used when integrating a braking distance over a curve.
///
/// Units: meters/second
const INTEGRATION_STEP_MPS: f64 = 0.2;

/// Number of bisection iterations used to invert a curve profile.
const BISECTION_ITERATIONS: usize = 40;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The deceleration assumption used by the braking engine.
#[derive(Debug, Clone)]
pub enum DecelProfile {
    /// A single service deceleration, independent of speed.
    Constant {
        /// Units: meters/second^2
        decel_mps2: f64,
    },

    /// A speed-dependent deceleration curve, linearly interpolated.
    Curve {
        /// Ascending `(speed_mps, decel_mps2)` points.
        points: Vec<(f64, f64)>,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DecelProfile {
    /// Create a constant-deceleration profile.
    pub fn constant(decel_mps2: f64) -> Self {
        DecelProfile::Constant { decel_mps2 }
    }

    /// Load a speed-dependent curve from a CSV profile file.
    ///
    /// Expected columns are `speed_kph` and `decel_mps2` (the legacy column
    /// name `decel_service_mps2` is also accepted). Rows which fail to parse
    /// are skipped rather than aborting the load.
    pub fn from_curve_csv<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path.as_ref())
            .map_err(ProfileError::CsvError)?;

        // Locate the speed and decel columns in the header
        let headers = reader.headers().map_err(ProfileError::CsvError)?.clone();
        let speed_col = headers.iter().position(|h| h.trim() == "speed_kph");
        let decel_col = headers
            .iter()
            .position(|h| h.trim() == "decel_mps2" || h.trim() == "decel_service_mps2");

        let (speed_col, decel_col) = match (speed_col, decel_col) {
            (Some(s), Some(d)) => (s, d),
            _ => return Err(ProfileError::EmptyCurve),
        };

        let mut points: Vec<(f64, f64)> = Vec::new();

        for record in reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(_) => continue,
            };

            let speed_kph: f64 = match record.get(speed_col).map(|s| s.trim().parse()) {
                Some(Ok(v)) => v,
                _ => continue,
            };
            let decel: f64 = match record.get(decel_col).map(|s| s.trim().parse()) {
                Some(Ok(v)) => v,
                _ => continue,
            };

            points.push((kph_to_mps(speed_kph), f64::max(decel, 0.0)));
        }

        if points.is_empty() {
            return Err(ProfileError::EmptyCurve);
        }

        // Sort ascending in speed so interpolation is well defined
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(DecelProfile::Curve { points })
    }

    /// Get the deceleration assumed at a given speed, floored so that the
    /// braking distance is always bounded.
    ///
    /// Units: meters/second^2
    pub fn decel_at(&self, v_mps: f64, params: &BrakingParams) -> f64 {
        let a = match self {
            DecelProfile::Constant { decel_mps2 } => *decel_mps2,
            DecelProfile::Curve { points } => lin_interp(v_mps, points),
        };

        f64::max(a, params.min_decel_mps2)
    }

    /// Distance needed to brake from `v0_kph` down to `v_lim_kph`.
    ///
    /// For a curve profile the distance is integrated over small downward
    /// speed steps as `d += (v_mid / a(v_mid)) * dv`.
    ///
    /// Units: meters
    pub fn braking_distance_m(&self, v0_kph: f64, v_lim_kph: f64, params: &BrakingParams) -> f64 {
        let v0 = kph_to_mps(f64::max(v0_kph, v_lim_kph));
        let v_lim = kph_to_mps(f64::max(v_lim_kph, 0.0));

        // Already at or below the target
        if v0 <= v_lim + 1e-6 {
            return 0.0;
        }

        match self {
            DecelProfile::Constant { .. } => {
                let a = self.decel_at(v0, params);
                (v0 * v0 - v_lim * v_lim) / (2.0 * a)
            }
            DecelProfile::Curve { .. } => {
                let steps = ((v0 - v_lim) / INTEGRATION_STEP_MPS).ceil() as usize;
                let mut dist_m = 0.0;
                let mut v_hi = v0;

                for _ in 0..steps {
                    let v_lo = f64::max(v_lim, v_hi - INTEGRATION_STEP_MPS);
                    let v_mid = 0.5 * (v_hi + v_lo);
                    let a = self.decel_at(v_mid, params);
                    dist_m += (v_hi - v_lo) * (v_mid / a);
                    v_hi = v_lo;
                }

                dist_m
            }
        }
    }

    /// The highest speed from which `v_lim_kph` can be reached within
    /// `dist_m`.
    ///
    /// The constant profile is inverted in closed form, a curve profile by a
    /// fixed-iteration bisection over `[v_lim_kph, max_speed_kph]`.
    ///
    /// Units: kilometers/hour
    pub fn max_speed_for_distance_kph(
        &self,
        dist_m: f64,
        v_lim_kph: f64,
        params: &BrakingParams,
    ) -> f64 {
        let dist_m = f64::max(dist_m, 0.0);

        match self {
            DecelProfile::Constant { .. } => {
                let v_lim = kph_to_mps(f64::max(v_lim_kph, 0.0));
                let a = self.decel_at(v_lim, params);
                mps_to_kph((v_lim * v_lim + 2.0 * a * dist_m).max(0.0).sqrt())
            }
            DecelProfile::Curve { .. } => {
                let mut lo = f64::max(v_lim_kph, 0.0);
                let mut hi = f64::max(lo + 0.5, params.max_speed_kph);

                for _ in 0..BISECTION_ITERATIONS {
                    let mid = 0.5 * (lo + hi);
                    if self.braking_distance_m(mid, v_lim_kph, params) <= dist_m {
                        lo = mid;
                    } else {
                        hi = mid;
                    }
                }

                lo
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn flat_curve(decel: f64) -> DecelProfile {
        DecelProfile::Curve {
            points: vec![(0.0, decel), (kph_to_mps(200.0), decel)],
        }
    }

    #[test]
    fn braking_distance_zero_at_or_below_target() {
        let profile = DecelProfile::constant(0.7);
        let params = BrakingParams::default();

        assert_eq!(profile.braking_distance_m(80.0, 80.0, &params), 0.0);
        assert_eq!(profile.braking_distance_m(60.0, 80.0, &params), 0.0);
    }

    #[test]
    fn constant_distance_matches_kinematics() {
        let profile = DecelProfile::constant(0.7);
        let params = BrakingParams::default();

        // v0 = 120 kph, vlim = 80 kph, a = 0.7: d = (v0^2 - vlim^2) / 2a
        let v0 = kph_to_mps(120.0);
        let vl = kph_to_mps(80.0);
        let expected = (v0 * v0 - vl * vl) / (2.0 * 0.7);

        let d = profile.braking_distance_m(120.0, 80.0, &params);
        assert!((d - expected).abs() < 1e-9);
    }

    #[test]
    fn curve_integration_close_to_closed_form() {
        let params = BrakingParams::default();
        let constant = DecelProfile::constant(0.7);
        let curve = flat_curve(0.7);

        let d_const = constant.braking_distance_m(120.0, 80.0, &params);
        let d_curve = curve.braking_distance_m(120.0, 80.0, &params);

        // Within 1% of the closed form for a flat curve
        assert!((d_const - d_curve).abs() / d_const < 0.01);
    }

    #[test]
    fn max_speed_monotonic_in_distance() {
        let params = BrakingParams::default();

        for profile in &[DecelProfile::constant(0.7), flat_curve(0.7)] {
            let mut prev = 0.0;
            for d in &[0.0, 50.0, 100.0, 250.0, 500.0, 1000.0] {
                let v = profile.max_speed_for_distance_kph(*d, 80.0, &params);
                assert!(
                    v >= prev,
                    "allowed speed decreased with distance ({} < {})",
                    v,
                    prev
                );
                prev = v;
            }
        }
    }

    #[test]
    fn max_speed_lower_for_weaker_braking() {
        let params = BrakingParams::default();

        let strong = DecelProfile::constant(1.0);
        let weak = DecelProfile::constant(0.4);

        let v_strong = strong.max_speed_for_distance_kph(400.0, 80.0, &params);
        let v_weak = weak.max_speed_for_distance_kph(400.0, 80.0, &params);

        assert!(v_weak < v_strong);
    }

    #[test]
    fn max_speed_at_zero_distance_is_target() {
        let params = BrakingParams::default();

        let v = DecelProfile::constant(0.7).max_speed_for_distance_kph(0.0, 80.0, &params);
        assert!((v - 80.0).abs() < 1e-9);

        let v = flat_curve(0.7).max_speed_for_distance_kph(0.0, 80.0, &params);
        assert!(v <= 80.0 + 0.01);
    }

    #[test]
    fn decel_is_floored_above_zero() {
        let params = BrakingParams::default();

        let profile = DecelProfile::constant(0.0);
        assert!(profile.decel_at(10.0, &params) >= params.min_decel_mps2);

        let profile = flat_curve(0.0);
        assert!(profile.decel_at(10.0, &params) >= params.min_decel_mps2);
    }
}
