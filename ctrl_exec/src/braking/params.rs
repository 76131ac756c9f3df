//! Braking engine parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the braking rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrakingParams {
    /// Margin kept below the target limit.
    ///
    /// Units: kilometers/hour
    pub margin_kph: f64,

    /// Service deceleration assumed when no speed-dependent curve is loaded.
    ///
    /// Units: meters/second^2
    pub max_service_decel_mps2: f64,

    /// Reaction time, discounted from the effective braking distance.
    ///
    /// Units: seconds
    pub reaction_time_s: f64,

    /// Dead band around the target within which the speed is held.
    ///
    /// Units: kilometers/hour
    pub coast_band_kph: f64,

    /// Minimum target speed, prevents noise driving the target to zero.
    ///
    /// Units: kilometers/hour
    pub min_target_kph: f64,

    /// Floor applied to any deceleration value to keep results bounded.
    ///
    /// Units: meters/second^2
    pub min_decel_mps2: f64,

    /// Upper bound on any speed the engine will ever return.
    ///
    /// Units: kilometers/hour
    pub max_speed_kph: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for BrakingParams {
    fn default() -> Self {
        Self {
            margin_kph: 3.0,
            max_service_decel_mps2: 0.7,
            reaction_time_s: 0.6,
            coast_band_kph: 1.0,
            min_target_kph: 5.0,
            min_decel_mps2: 0.1,
            max_speed_kph: 400.0,
        }
    }
}
