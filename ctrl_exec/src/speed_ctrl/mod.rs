//! Speed control module
//!
//! Turns the latest telemetry sample and any pending limit events into a
//! throttle/brake command pair, applying the braking rule, the output
//! guards, the brake hysteresis, and the operating mode gate.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod guards;
mod hysteresis;
mod limit_tracker;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use guards::*;
pub use hysteresis::*;
pub use limit_tracker::*;
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during SpeedCtrl initialisation.
#[derive(Debug, thiserror::Error)]
pub enum SpeedCtrlInitError {
    #[error("Failed to load parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Failed to load the deceleration curve: {0}")]
    ProfileError(crate::braking::ProfileError),

    #[error("Failed to initialise an archiver: {0}")]
    ArchiverError(String),
}

/// Possible errors that can occur during SpeedCtrl processing.
#[derive(Debug, thiserror::Error)]
pub enum SpeedCtrlError {
    #[error("Telemetry sample contains missing or non-finite fields")]
    InvalidSample,
}
