//! # Vehicle Interface
//!
//! This crate defines the data types and equipment boundaries shared between
//! the control executable and its collaborators: telemetry records, limit
//! events, control commands, and the actuator interface contract.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuator boundary - the explicit interface contract for the vehicle's controls
pub mod act;

/// Control command, mode, and status types
pub mod ctrl;

/// Telemetry sample and limit event records
pub mod telem;
