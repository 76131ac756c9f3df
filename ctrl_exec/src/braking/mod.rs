//! Braking physics engine
//!
//! Pure computation of the maximum speed the vehicle may currently hold such
//! that the next speed limit can still be reached by the time the remaining
//! distance runs out, under an assumed deceleration profile.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod profile;
mod target;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use profile::*;
pub use target::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur while loading a deceleration profile.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Cannot read the deceleration curve file: {0}")]
    CsvError(csv::Error),

    #[error("The deceleration curve file contains no usable points")]
    EmptyCurve,
}
