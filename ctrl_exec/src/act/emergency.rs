//! Emergency stop latch and escalation
//!
//! The latch is the only legitimately process-wide mutable item in the
//! executable. It is one-way: once latched it stays latched until an
//! external reset (a new run).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{error, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use veh_if::act::{ActuatorInterface, ChannelInfo};
use veh_if::ctrl::StatusRecord;

// Internal
use crate::status::StatusWriter;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Why and when the emergency stop fired.
#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyDetail {
    pub reason: String,

    /// Units: seconds (unix epoch)
    pub t_wall: f64,
}

/// Process-wide, one-way emergency flag.
///
/// Safe for concurrent use from the synchronous dispatch path and the ack
/// watchdog: the transition to active is a single atomic swap, so the
/// escalation side effects run exactly once no matter how many threads race
/// into `latch`.
#[derive(Debug, Default)]
pub struct EmergencyLatch {
    active: AtomicBool,
    detail: Mutex<Option<EmergencyDetail>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl EmergencyLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the emergency stop has fired.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Latch the emergency state.
    ///
    /// Returns true for the caller which performed the transition, false
    /// for every later (or concurrent) caller.
    pub fn latch(&self, reason: &str, t_wall: f64) -> bool {
        if self.active.swap(true, Ordering::SeqCst) {
            return false;
        }

        if let Ok(mut detail) = self.detail.lock() {
            *detail = Some(EmergencyDetail {
                reason: String::from(reason),
                t_wall,
            });
        }

        true
    }

    /// The reason and time of the latched emergency, if any.
    pub fn detail(&self) -> Option<EmergencyDetail> {
        self.detail.lock().ok().and_then(|d| d.clone())
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Perform the emergency stop.
///
/// Idempotent: only the first caller forces the brakes and persists the
/// takeover record, every other call returns immediately. Write failures on
/// individual brake channels are logged and skipped, the remaining channels
/// are still forced.
pub fn escalate(
    reason: &str,
    act: &Mutex<Box<dyn ActuatorInterface>>,
    brake_channels: &[ChannelInfo],
    latch: &EmergencyLatch,
    status: &StatusWriter,
) {
    let t_wall = now_wall_s();

    if !latch.latch(reason, t_wall) {
        return;
    }

    error!("EMERGENCY STOP: {}", reason);

    // Force every known braking channel to its maximum
    match act.lock() {
        Ok(mut act) => {
            for channel in brake_channels {
                if let Err(e) = act.write(&channel.name, channel.max_value) {
                    warn!("Could not force brake channel {}: {}", channel.name, e);
                }
            }
        }
        Err(_) => warn!("Actuator lock poisoned, cannot force brakes"),
    }

    // Persist the takeover record for the operator
    let record = StatusRecord {
        mode: String::from("manual"),
        takeover: true,
        reason: String::from(reason),
        t_wall,
        last_command_time: None,
        last_command_value: None,
        last_ack_time: None,
    };
    if let Err(e) = status.write(&record) {
        warn!("Could not persist emergency status: {}", e);
    }
}

/// Current wall clock time in seconds since the unix epoch.
pub fn now_wall_s() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
