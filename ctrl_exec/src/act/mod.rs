//! Command delivery and actuator safety layer
//!
//! Commands leave the control loop through `ActClient::send`, which
//! resolves the channel, rate limits, clamps, writes, and confirms the
//! write by reading the channel back. Confirmation can run inline or on a
//! background watchdog. Exhausting the retry budget escalates to the
//! idempotent emergency stop.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod client;
mod emergency;
mod params;
mod watchdog;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use client::*;
pub use emergency::*;
pub use params::*;
pub use watchdog::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Canonical name of the throttle channel.
pub const THROTTLE_CHANNEL: &str = "throttle";

/// Canonical name of the brake channel.
pub const BRAKE_CHANNEL: &str = "brake";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// What happened to one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The actuator reflected the value within the ack timeout.
    Confirmed,

    /// The write went out, confirmation was handed to the ack watchdog.
    Pending,

    /// Dropped: sent too soon after the previous command on this channel.
    RateLimited,

    /// Dropped: the channel could not be resolved against the actuator.
    Unresolved,

    /// Rejected: the emergency stop is latched.
    Rejected,

    /// The retry budget was exhausted and the emergency stop has fired.
    Escalated,
}

/// Possible errors raised by the actuator client.
#[derive(Debug, thiserror::Error)]
pub enum ActClientError {
    #[error("A shared lock was poisoned by a panicking thread")]
    LockPoisoned,
}
