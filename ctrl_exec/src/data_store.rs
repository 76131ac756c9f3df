//! # Data Store

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use veh_if::telem::LimitEvent;

// Internal
use crate::speed_ctrl::{self, SpeedCtrl};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
///
/// All cyclic state lives here as explicit fields. The only process-wide
/// mutable item outside the store is the emergency latch, which is shared
/// with the ack watchdog thread.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    // SpeedCtrl
    pub speed_ctrl: SpeedCtrl,
    pub speed_ctrl_input: speed_ctrl::InputData,
    pub speed_ctrl_output: speed_ctrl::OutputData,
    pub speed_ctrl_report: speed_ctrl::StatusReport,

    /// Limit events drained from the stream but not yet fed to a processed
    /// cycle. Events survive skipped cycles here.
    pub pending_limit_events: Vec<LimitEvent>,

    // Monitoring counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Number of cycles skipped for lack of a fresh telemetry sample
    pub num_skipped_cycles: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and
    /// sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        if self.num_cycles % (cycle_frequency_hz as u128).max(1) == 0 {
            self.is_1_hz_cycle = true;
        } else {
            self.is_1_hz_cycle = false;
        }

        self.speed_ctrl_input = speed_ctrl::InputData::default();
        self.speed_ctrl_output = speed_ctrl::OutputData::default();
        self.speed_ctrl_report = speed_ctrl::StatusReport::default();
    }
}
