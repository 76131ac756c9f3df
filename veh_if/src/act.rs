//! # Actuator boundary
//!
//! The explicit interface contract between the control executable and the
//! vehicle's actuators. Implementations are bound at construction time,
//! never discovered at runtime.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Description of a single controllable channel exposed by an actuator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    /// The channel's name as reported by the vehicle interface.
    pub name: String,

    /// Minimum value accepted by the channel.
    pub min_value: f64,

    /// Maximum value accepted by the channel.
    pub max_value: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised at the actuator boundary.
#[derive(thiserror::Error, Debug)]
pub enum ActError {
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Failed to write channel {0}: {1}")]
    WriteFailed(String, String),

    #[error("Failed to read channel {0}: {1}")]
    ReadFailed(String, String),
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Interface to the vehicle's actuators.
///
/// The contract is deliberately small: a one-time channel listing used to
/// resolve name aliases at startup, and per-channel write/read. A write
/// which returns `Ok` is not a guarantee the command took effect, callers
/// confirm by reading the channel back.
pub trait ActuatorInterface: Send {
    /// List all channels known to the vehicle.
    ///
    /// This shall be queried once at startup for channel resolution.
    fn list_channels(&self) -> Vec<ChannelInfo>;

    /// Write a value to the named channel.
    fn write(&mut self, channel: &str, value: f64) -> Result<(), ActError>;

    /// Read back the current value of the named channel.
    fn read(&self, channel: &str) -> Result<f64, ActError>;
}
