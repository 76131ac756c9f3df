//! Actuator client parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the actuator client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActClientParams {
    /// Minimum interval between commands on one channel, commands arriving
    /// sooner are dropped.
    ///
    /// Units: seconds
    pub min_send_interval_s: f64,

    /// How long to wait for the actuator to reflect a written value.
    ///
    /// Units: seconds
    pub ack_timeout_s: f64,

    /// Interval between read-backs while waiting for an ack.
    ///
    /// Units: seconds
    pub ack_poll_interval_s: f64,

    /// Tolerance within which a read-back counts as confirmation.
    pub ack_tolerance: f64,

    /// Retry budget per channel. Once a channel's retry count exceeds this
    /// the emergency stop fires.
    pub max_retries: u32,

    /// Pause between retry attempts.
    ///
    /// Units: seconds
    pub retry_pause_s: f64,

    /// Confirm acknowledgments on a background watchdog thread instead of
    /// inline.
    pub use_ack_watchdog: bool,

    /// Idle poll interval of the watchdog thread.
    ///
    /// Units: seconds
    pub watchdog_interval_s: f64,

    /// Canonical channel name to known vehicle control name aliases.
    ///
    /// Resolution takes the first alias the actuator actually reports, in
    /// order.
    pub aliases: HashMap<String, Vec<String>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ActClientParams {
    fn default() -> Self {
        Self {
            min_send_interval_s: 0.2,
            ack_timeout_s: 0.03,
            ack_poll_interval_s: 0.005,
            ack_tolerance: 1e-3,
            max_retries: 3,
            retry_pause_s: 0.02,
            use_ack_watchdog: false,
            watchdog_interval_s: 0.05,
            aliases: default_aliases(),
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// The control name aliases recognised across known vehicle profiles.
pub fn default_aliases() -> HashMap<String, Vec<String>> {
    let mut aliases = HashMap::new();

    aliases.insert(
        String::from(super::THROTTLE_CHANNEL),
        vec![
            String::from("Regulator"),
            String::from("Throttle"),
            String::from("CombinedThrottleBrake"),
        ],
    );
    aliases.insert(
        String::from(super::BRAKE_CHANNEL),
        vec![
            String::from("TrainBrakeControl"),
            String::from("TrainBrake"),
            String::from("VirtualBrake"),
            String::from("LocoBrakeControl"),
            String::from("EngineBrake"),
        ],
    );

    aliases
}
