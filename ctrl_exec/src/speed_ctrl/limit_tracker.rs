//! Active limit tracking
//!
//! Tracks the next announced speed limit as a distance countdown anchored on
//! the odometer, and promotes it to the limit in force once the countdown
//! runs out.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};
use veh_if::telem::LimitEvent;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Remaining distance at or below which an upcoming limit is considered in
/// force.
///
/// Units: meters
pub const LIMIT_ACTIVE_THRESHOLD_M: f64 = 2.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The limit announced but not yet reached.
#[derive(Debug, Clone, Copy)]
struct UpcomingLimit {
    /// Units: kilometers/hour
    limit_kph: f64,

    /// Distance to the restriction at the time of the announcement.
    ///
    /// Units: meters
    announced_dist_m: f64,

    /// Odometer reading at the first sample after the announcement. `None`
    /// until that sample arrives.
    ///
    /// Units: meters
    anchor_odom_m: Option<f64>,

    /// Last remaining distance reported, used for the monotonic clamp.
    ///
    /// Units: meters
    last_remaining_m: Option<f64>,
}

/// Distance-anchored limit state machine.
///
/// The remaining distance to the tracked limit is monotonically
/// non-increasing while that limit stays "next": raw increases are treated
/// as odometry noise and clamped to the previous value.
#[derive(Debug, Clone, Default)]
pub struct LimitTracker {
    upcoming: Option<UpcomingLimit>,

    /// The limit currently in force, if any.
    ///
    /// Units: kilometers/hour
    active_limit_kph: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The limit currently in force.
    pub fn active_limit_kph(&self) -> Option<f64> {
        self.active_limit_kph
    }

    /// The upcoming limit being counted down to, if any.
    pub fn next_limit_kph(&self) -> Option<f64> {
        self.upcoming.map(|u| u.limit_kph)
    }

    /// Record a new limit announcement.
    ///
    /// A new announcement replaces any limit currently counted down to. The
    /// odometer anchor is taken from the next telemetry sample.
    pub fn observe_event(&mut self, event: &LimitEvent) {
        if !event.limit_kph.is_finite() || !event.dist_m.is_finite() {
            debug!("Ignoring limit event with non-finite fields: {:?}", event);
            return;
        }

        info!(
            "New limit announced: {} kph in {} m",
            event.limit_kph, event.dist_m
        );

        self.upcoming = Some(UpcomingLimit {
            limit_kph: event.limit_kph,
            announced_dist_m: f64::max(0.0, event.dist_m),
            anchor_odom_m: None,
            last_remaining_m: None,
        });
    }

    /// Advance the countdown with the latest odometer reading.
    ///
    /// Returns the remaining distance to the upcoming limit, or `None` when
    /// no limit is being counted down to (including the cycle on which the
    /// limit is promoted to active).
    pub fn update(&mut self, odom_m: f64) -> Option<f64> {
        let mut upcoming = self.upcoming?;

        // Anchor on the first sample after the announcement
        let anchor_odom_m = match upcoming.anchor_odom_m {
            Some(a) => a,
            None => {
                upcoming.anchor_odom_m = Some(odom_m);
                self.upcoming = Some(upcoming);
                odom_m
            }
        };

        let travelled_m = f64::max(0.0, odom_m - anchor_odom_m);
        let raw_remaining_m = f64::max(0.0, upcoming.announced_dist_m - travelled_m);

        // Monotonic clamp: a raw increase while the same limit stays next is
        // odometry noise
        let remaining_m = match upcoming.last_remaining_m {
            Some(last) if raw_remaining_m > last => last,
            _ => raw_remaining_m,
        };

        if remaining_m <= LIMIT_ACTIVE_THRESHOLD_M {
            info!("Limit {} kph now in force", upcoming.limit_kph);
            self.active_limit_kph = Some(upcoming.limit_kph);
            self.upcoming = None;
            return None;
        }

        upcoming.last_remaining_m = Some(remaining_m);
        self.upcoming = Some(upcoming);

        Some(remaining_m)
    }
}
