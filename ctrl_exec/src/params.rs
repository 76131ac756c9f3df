//! # Control Executable Parameters
//!
//! This module provides parameters for the control executable itself. The
//! per-module parameters (speed control, telemetry, actuator client) live in
//! their own files.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CtrlExecParams {
    /// Target period of one control cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Seconds until the executable exits on its own, 0 runs until the stop
    /// file appears.
    ///
    /// Units: seconds
    pub duration_s: f64,

    /// Path of the persisted safety status record, relative to the software
    /// root.
    pub status_path: String,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for CtrlExecParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.2,
            duration_s: 0.0,
            status_path: String::from("data/control_status.json"),
        }
    }
}
