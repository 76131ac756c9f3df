//! # Control command and status types

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A throttle/brake command pair.
///
/// Commands are recomputed every cycle and are never authoritative, only
/// the latest command matters. A `None` channel means "do not touch this
/// channel this cycle".
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct CtrlCmd {
    /// Throttle demand in [0, 1], or `None` to leave the throttle alone.
    pub throttle: Option<f64>,

    /// Brake demand in [0, 1], or `None` to leave the brake alone.
    pub brake: Option<f64>,
}

/// Safety status record persisted for external monitoring.
///
/// The record is rewritten atomically (write-temp-then-rename) so external
/// operators always see a complete, current view of the safety state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StatusRecord {
    /// The active control mode, or `"manual"` after an emergency stop.
    pub mode: String,

    /// True once the operator must take over (emergency stop latched).
    pub takeover: bool,

    /// Reason for the current state, empty when nominal.
    pub reason: String,

    /// Wall clock time of the last status update.
    ///
    /// Units: seconds (unix epoch)
    pub t_wall: f64,

    /// Wall clock time of the last command dispatched, if any.
    pub last_command_time: Option<f64>,

    /// Value of the last command dispatched, if any.
    pub last_command_value: Option<f64>,

    /// Wall clock time of the last confirmed acknowledgment, if any.
    pub last_ack_time: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Operating mode of the control executable.
///
/// The mode gates which computed commands are actually dispatched to the
/// actuators.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CtrlMode {
    /// Dispatch both throttle and brake commands.
    Full,

    /// Dispatch brake commands only, the throttle is never touched.
    BrakeOnly,

    /// Compute commands but dispatch nothing.
    Advisory,
}

/// The control phase the loop is currently in.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No braking required, hold or regain the cruise target.
    Cruise,

    /// Within the coast band of the target, neither accelerate nor brake.
    Coast,

    /// Actively braking towards an approaching limit.
    Brake,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CtrlMode {
    /// Apply the mode gate to a computed command.
    ///
    /// Returns the command that shall actually be dispatched:
    /// - `Full`: both channels pass.
    /// - `BrakeOnly`: throttle is stripped, brake passes.
    /// - `Advisory`: nothing passes.
    pub fn gate(&self, cmd: &CtrlCmd) -> CtrlCmd {
        match self {
            CtrlMode::Full => *cmd,
            CtrlMode::BrakeOnly => CtrlCmd {
                throttle: None,
                brake: cmd.brake,
            },
            CtrlMode::Advisory => CtrlCmd::default(),
        }
    }
}

impl Default for CtrlMode {
    fn default() -> Self {
        CtrlMode::Advisory
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Cruise
    }
}
