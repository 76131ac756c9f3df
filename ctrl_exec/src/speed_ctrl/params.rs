//! Parameters structure for SpeedCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use veh_if::ctrl::CtrlMode;

// Internal
use super::HysteresisParams;
use crate::braking::BrakingParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for speed control.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {
    // ---- OPERATING MODE ----
    /// Which computed commands are dispatched to the actuators.
    pub mode: CtrlMode,

    // ---- SPLIT CONTROLLER ----
    /// Proportional gain mapping positive speed error to throttle.
    ///
    /// Units: 1/(kilometers/hour)
    pub kp_throttle: f64,

    /// Proportional gain mapping negative speed error to brake.
    ///
    /// Units: 1/(kilometers/hour)
    pub kp_brake: f64,

    // ---- GUARDS ----
    /// Maximum rate of change of the throttle output.
    ///
    /// Units: 1/second
    pub throttle_rate_per_s: f64,

    /// Maximum rate of change of the brake output before the ramp.
    ///
    /// Units: 1/second
    pub brake_max_rate_per_s: f64,

    /// Maximum rate-of-change-of-rate of the brake output.
    ///
    /// Units: 1/second^2
    pub brake_max_jerk_per_s2: f64,

    /// Speed excess over the active limit tolerated before the overspeed
    /// guard demands brake.
    ///
    /// Units: kilometers/hour
    pub overspeed_tolerance_kph: f64,

    // ---- STARTUP GATE ----
    /// Minimum elapsed run time before error-driven braking is allowed.
    ///
    /// The physical guards are never gated.
    ///
    /// Units: seconds
    pub startup_gate_s: f64,

    // ---- APPROACH/CRUISE HYSTERESIS ----
    /// Safe-speed headroom above the current speed required to leave the
    /// approach phase once entered.
    ///
    /// Units: kilometers/hour
    pub approach_exit_band_kph: f64,

    // ---- SUB-MODULE PARAMETERS ----
    /// Braking rule parameters.
    pub braking: BrakingParams,

    /// Brake hysteresis and ramp parameters.
    pub hysteresis: HysteresisParams,

    /// Optional speed-dependent deceleration curve, as a path relative to the
    /// software root. When unset the constant service deceleration from
    /// `braking` is assumed.
    pub decel_curve_csv: Option<String>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            mode: CtrlMode::Advisory,
            kp_throttle: 0.03,
            kp_brake: 0.04,
            throttle_rate_per_s: 0.8,
            brake_max_rate_per_s: 1.8,
            brake_max_jerk_per_s2: 6.0,
            overspeed_tolerance_kph: 0.5,
            startup_gate_s: 1.0,
            approach_exit_band_kph: 2.0,
            braking: BrakingParams::default(),
            hysteresis: HysteresisParams::default(),
            decel_curve_csv: None,
        }
    }
}
