//! # Telemetry records
//!
//! Records produced upstream by the telemetry collector and consumed once
//! per cycle by the control executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single telemetry sample.
///
/// Samples are immutable once produced. The optional next-limit fields are
/// populated when the collector itself has limit context, otherwise limit
/// tracking is driven purely by `LimitEvent`s.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemSample {
    /// Wall clock time the sample was taken at.
    ///
    /// Units: seconds (unix epoch)
    pub t_wall: f64,

    /// Total distance travelled.
    ///
    /// Units: meters
    pub odom_m: f64,

    /// Current speed.
    ///
    /// Units: kilometers/hour
    pub speed_kph: f64,

    /// Speed of the next known limit, if any.
    ///
    /// Units: kilometers/hour
    pub next_limit_kph: Option<f64>,

    /// Distance to the next known limit, if any.
    ///
    /// Units: meters
    pub dist_next_limit_m: Option<f64>,
}

/// An announcement that a new speed restriction becomes relevant at a future
/// distance.
///
/// Events arrive asynchronously on an append-only stream and anchor a
/// distance countdown in the control loop.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LimitEvent {
    /// Wall clock time of the announcement.
    ///
    /// Units: seconds (unix epoch)
    pub t_wall: f64,

    /// Target speed once the restriction is in force.
    ///
    /// Units: kilometers/hour
    pub limit_kph: f64,

    /// Distance to the restriction at the time of the announcement.
    ///
    /// Units: meters
    pub dist_m: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TelemSample {
    /// True if all mandatory fields of the sample are finite numbers.
    ///
    /// A sample failing this check shall be skipped by the control loop
    /// rather than processed.
    pub fn is_valid(&self) -> bool {
        self.t_wall.is_finite() && self.odom_m.is_finite() && self.speed_kph.is_finite()
    }
}
