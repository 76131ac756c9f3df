//! Implementations for the SpeedCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::Serialize;
use veh_if::ctrl::{CtrlCmd, Phase};
use veh_if::telem::{LimitEvent, TelemSample};

// Internal
use super::{
    overspeed_guard, BrakeHysteresis, JerkLimiter, LimitTracker, Params, RateLimiter,
    SpeedCtrlError, SpeedCtrlInitError,
};
use crate::braking::{self, DecelProfile};
use util::{
    archive::{Archived, Archiver},
    maths::clamp_unit,
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Step time assumed on the very first cycle, before a sample-to-sample
/// delta is available.
///
/// Units: seconds
const NOMINAL_DT_S: f64 = 0.1;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Speed control module state
pub struct SpeedCtrl {
    pub(crate) params: Params,

    profile: DecelProfile,
    tracker: LimitTracker,

    throttle_limiter: RateLimiter,
    brake_limiter: JerkLimiter,
    hysteresis: BrakeHysteresis,

    /// True while in the approach (braking-towards-a-limit) phase of the
    /// approach/cruise hysteresis.
    approach: bool,

    prev_phase: Phase,

    /// Wall time of the first processed sample.
    first_t_wall: Option<f64>,

    /// Wall time of the previously processed sample.
    last_t_wall: Option<f64>,

    pub(crate) report: StatusReport,
    arch_report: Archiver,

    pub(crate) output: Option<OutputData>,
    arch_output: Archiver,
}

/// Input data to speed control.
#[derive(Default, Debug, Clone)]
pub struct InputData {
    /// The latest telemetry sample.
    pub sample: TelemSample,

    /// Limit events drained from the event stream this cycle, oldest first.
    pub limit_events: Vec<LimitEvent>,
}

/// Output command pair from SpeedCtrl.
#[derive(Clone, Copy, Serialize, Debug, Default)]
pub struct OutputData {
    /// The command as computed, before the mode gate.
    pub plan: CtrlCmd,

    /// The command after the mode gate, what shall actually be dispatched.
    pub send: CtrlCmd,

    /// The target speed used this cycle.
    ///
    /// Units: kilometers/hour
    pub target_kph: f64,

    /// The control phase this cycle.
    pub phase: Phase,
}

/// Status report for SpeedCtrl processing.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct StatusReport {
    /// True if error-driven braking was suppressed by the startup gate.
    pub startup_suppressed: bool,

    /// The overspeed guard's brake floor this cycle.
    pub overspeed_floor: f64,

    /// True if the brake hysteresis is in the on state.
    pub brake_on: bool,

    /// The limit currently in force, if any.
    pub active_limit_kph: Option<f64>,

    /// Remaining distance to the upcoming limit, if one is tracked.
    pub remaining_m: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SpeedCtrl {
    fn default() -> Self {
        Self::with_params(Params::default())
    }
}

impl State for SpeedCtrl {
    type InitData = &'static str;
    type InitError = SpeedCtrlInitError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = SpeedCtrlError;

    /// Initialise the SpeedCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(
        &mut self,
        init_data: Self::InitData,
        session: &Session,
    ) -> Result<(), Self::InitError> {
        // Load the parameters
        let loaded: Params = match params::load(init_data) {
            Ok(p) => p,
            Err(e) => return Err(SpeedCtrlInitError::ParamLoadError(e)),
        };

        // Load the deceleration curve if one is configured
        let profile = match &loaded.decel_curve_csv {
            Some(rel_path) => {
                let mut path = util::host::get_sw_root()
                    .map_err(|_| SpeedCtrlInitError::ParamLoadError(params::LoadError::SwRootNotSet))?;
                path.push(rel_path);
                DecelProfile::from_curve_csv(path).map_err(SpeedCtrlInitError::ProfileError)?
            }
            None => DecelProfile::constant(loaded.braking.max_service_decel_mps2),
        };

        *self = Self::with_profile(loaded, profile);

        // Create the arch folder for speed_ctrl
        let mut arch_path = session.arch_root.clone();
        arch_path.push("speed_ctrl");
        std::fs::create_dir_all(arch_path)
            .map_err(|e| SpeedCtrlInitError::ArchiverError(e.to_string()))?;

        // Initialise the archivers
        self.arch_report = Archiver::from_path(session, "speed_ctrl/status_report.csv")
            .map_err(|e| SpeedCtrlInitError::ArchiverError(e.to_string()))?;
        self.arch_output = Archiver::from_path(session, "speed_ctrl/output.csv")
            .map_err(|e| SpeedCtrlInitError::ArchiverError(e.to_string()))?;

        Ok(())
    }

    /// Perform cyclic processing of speed control.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // Clear the status report
        self.report = StatusReport::default();

        let sample = &input_data.sample;
        if !sample.is_valid() {
            return Err(SpeedCtrlError::InvalidSample);
        }

        // Step time from the sample wall clock, clamped so pauses and
        // out-of-order samples cannot distort the limiters
        let dt_s = match self.last_t_wall {
            Some(t0) => (sample.t_wall - t0).clamp(1e-3, 0.5),
            None => NOMINAL_DT_S,
        };
        self.last_t_wall = Some(sample.t_wall);
        if self.first_t_wall.is_none() {
            self.first_t_wall = Some(sample.t_wall);
        }

        // Absorb pending limit events and advance the distance countdown
        for event in &input_data.limit_events {
            self.tracker.observe_event(event);
        }
        let remaining_m = self.tracker.update(sample.odom_m);

        self.report.active_limit_kph = self.tracker.active_limit_kph();
        self.report.remaining_m = remaining_m;

        // Limit context: the event-anchored countdown takes precedence, the
        // collector's own next-limit fields are a fallback when no event has
        // been seen yet
        let (next_limit_kph, dist_next_limit_m) = if self.tracker.next_limit_kph().is_some() {
            (self.tracker.next_limit_kph(), remaining_m)
        } else if self.tracker.active_limit_kph().is_none() {
            (sample.next_limit_kph, sample.dist_next_limit_m)
        } else {
            (None, None)
        };

        // Braking rule
        let demand = braking::compute_demand(
            sample.speed_kph,
            next_limit_kph,
            dist_next_limit_m,
            &self.profile,
            &self.params.braking,
        );

        // Approach/cruise hysteresis: enter approach as soon as the safe
        // speed bites, leave it only with clear headroom or once the limit
        // being approached has come into force
        if !self.approach {
            if demand.phase != Phase::Cruise {
                self.approach = true;
            }
        } else if next_limit_kph.is_none()
            || demand.v_safe_kph > sample.speed_kph + self.params.approach_exit_band_kph
        {
            self.approach = false;
        }

        // Target speed: approach tracks the safe speed, cruise tracks the
        // active limit (or holds the current speed with no limit in force)
        let cruise_target_kph = match self.tracker.active_limit_kph() {
            Some(limit) => f64::max(
                limit - self.params.braking.margin_kph,
                self.params.braking.min_target_kph,
            ),
            None => sample.speed_kph,
        };
        let target_kph = if self.approach {
            f64::min(demand.v_safe_kph, cruise_target_kph)
        } else {
            cruise_target_kph
        };

        // Startup gate: no error-driven braking until the run has settled
        // and some limit context exists. The guards below are never gated.
        let elapsed_s = sample.t_wall - self.first_t_wall.unwrap_or(sample.t_wall);
        let have_limit_context =
            next_limit_kph.is_some() || self.tracker.active_limit_kph().is_some();
        let suppressed = elapsed_s < self.params.startup_gate_s || !have_limit_context;
        self.report.startup_suppressed = suppressed;

        // Proportional split: positive error drives throttle, negative
        // drives brake, never both
        let error_kph = target_kph - sample.speed_kph;
        let (raw_throttle, raw_brake) = if error_kph >= 0.0 {
            (clamp_unit(self.params.kp_throttle * error_kph), 0.0)
        } else {
            (0.0, clamp_unit(self.params.kp_brake * -error_kph))
        };

        // Overspeed guard floor, always in effect
        let floor = overspeed_guard(
            sample.speed_kph,
            self.tracker.active_limit_kph(),
            self.params.overspeed_tolerance_kph,
        );
        self.report.overspeed_floor = floor;

        // Entering a braking phase zeroes the throttle and resets the
        // limiter state so the brake ramps from a known point
        let braking_phase = demand.phase == Phase::Brake;
        if braking_phase && self.prev_phase != Phase::Brake {
            self.brake_limiter.reset(self.hysteresis.output());
        }
        self.prev_phase = demand.phase;

        let throttle = if braking_phase || floor > 0.0 {
            self.throttle_limiter.reset(0.0);
            0.0
        } else {
            self.throttle_limiter.step(raw_throttle, dt_s)
        };

        // Brake: jerk-limited demand into the hysteresis ramp. When the
        // startup gate is active only the guard floor can drive the brake.
        let (desired_brake, overspeed_kph) = if suppressed {
            (0.0, 0.0)
        } else {
            (self.brake_limiter.step(raw_brake, dt_s), -error_kph)
        };
        let brake = self.hysteresis.step(overspeed_kph, floor, desired_brake, dt_s);
        self.report.brake_on = self.hysteresis.is_on();

        // A nonzero brake always wins over the throttle
        let throttle = if brake > 0.0 { 0.0 } else { throttle };

        let plan = CtrlCmd {
            throttle: Some(throttle),
            brake: Some(brake),
        };
        let send = self.params.mode.gate(&plan);

        let output = OutputData {
            plan,
            send,
            target_kph,
            phase: demand.phase,
        };

        trace!(
            "SpeedCtrl output:\n    target: {:.2} kph ({:?})\n    plan: {:?}\n    send: {:?}",
            target_kph,
            demand.phase,
            plan,
            send
        );

        // Update the output in self
        self.output = Some(output);

        Ok((output, self.report))
    }
}

impl Archived for SpeedCtrl {
    fn write(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.arch_report.serialise(self.report)?;
        self.arch_output.serialise(self.output)?;

        Ok(())
    }
}

impl SpeedCtrl {
    /// Build a SpeedCtrl with the given parameters and a constant
    /// deceleration profile derived from them.
    pub fn with_params(params: Params) -> Self {
        let profile = DecelProfile::constant(params.braking.max_service_decel_mps2);
        Self::with_profile(params, profile)
    }

    /// Build a SpeedCtrl with the given parameters and deceleration profile.
    pub fn with_profile(params: Params, profile: DecelProfile) -> Self {
        let throttle_limiter = RateLimiter::new(params.throttle_rate_per_s);
        let brake_limiter = JerkLimiter::new(params.brake_max_rate_per_s, params.brake_max_jerk_per_s2);
        let hysteresis = BrakeHysteresis::new(params.hysteresis.clone());

        Self {
            params,
            profile,
            tracker: LimitTracker::new(),
            throttle_limiter,
            brake_limiter,
            hysteresis,
            approach: false,
            prev_phase: Phase::Cruise,
            first_t_wall: None,
            last_t_wall: None,
            report: StatusReport::default(),
            arch_report: Archiver::default(),
            output: None,
            arch_output: Archiver::default(),
        }
    }

    /// The limit currently in force, if any.
    pub fn active_limit_kph(&self) -> Option<f64> {
        self.tracker.active_limit_kph()
    }

    /// The configured operating mode.
    pub fn mode(&self) -> veh_if::ctrl::CtrlMode {
        self.params.mode
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use veh_if::ctrl::CtrlMode;

    fn sample(t_wall: f64, odom_m: f64, speed_kph: f64) -> TelemSample {
        TelemSample {
            t_wall,
            odom_m,
            speed_kph,
            next_limit_kph: None,
            dist_next_limit_m: None,
        }
    }

    fn full_mode_params() -> Params {
        Params {
            mode: CtrlMode::Full,
            startup_gate_s: 0.0,
            ..Params::default()
        }
    }

    #[test]
    fn invalid_sample_is_rejected() {
        let mut ctrl = SpeedCtrl::with_params(full_mode_params());
        let input = InputData {
            sample: sample(std::f64::NAN, 0.0, 100.0),
            limit_events: vec![],
        };
        assert!(ctrl.proc(&input).is_err());
    }

    #[test]
    fn cruise_without_limit_commands_nothing() {
        let mut ctrl = SpeedCtrl::with_params(full_mode_params());
        let input = InputData {
            sample: sample(100.0, 0.0, 120.0),
            limit_events: vec![],
        };

        let (output, report) = ctrl.proc(&input).unwrap();
        assert_eq!(output.plan.throttle, Some(0.0));
        assert_eq!(output.plan.brake, Some(0.0));
        assert!(!report.brake_on);
    }

    #[test]
    fn close_limit_event_drives_braking() {
        let mut ctrl = SpeedCtrl::with_params(full_mode_params());

        let event = LimitEvent {
            t_wall: 100.0,
            limit_kph: 80.0,
            dist_m: 150.0,
        };

        let mut brake_seen = false;
        for i in 0..10 {
            let t = 100.0 + 0.2 * i as f64;
            let input = InputData {
                sample: sample(t, 6.0 * i as f64, 120.0),
                limit_events: if i == 0 { vec![event] } else { vec![] },
            };
            let (output, _) = ctrl.proc(&input).unwrap();
            assert_eq!(output.plan.throttle, Some(0.0));
            if output.plan.brake.unwrap_or(0.0) > 0.0 {
                brake_seen = true;
            }
        }

        assert!(brake_seen, "expected a brake command while approaching");
    }

    #[test]
    fn startup_gate_suppresses_error_braking_not_guards() {
        let params = Params {
            mode: CtrlMode::Full,
            startup_gate_s: 10.0,
            ..Params::default()
        };
        let mut ctrl = SpeedCtrl::with_params(params);

        // Announce a limit already in force by counting it down immediately
        let event = LimitEvent {
            t_wall: 100.0,
            limit_kph: 80.0,
            dist_m: 1.0,
        };

        let input = InputData {
            sample: sample(100.0, 0.0, 120.0),
            limit_events: vec![event],
        };
        let (_, report) = ctrl.proc(&input).unwrap();
        assert!(report.startup_suppressed);

        // 120 kph against an active 80 kph limit: the overspeed guard floor
        // applies even inside the startup gate
        let input = InputData {
            sample: sample(100.1, 1.0, 120.0),
            limit_events: vec![],
        };
        let (output, report) = ctrl.proc(&input).unwrap();
        assert!(report.startup_suppressed);
        assert!(report.overspeed_floor > 0.0);
        assert!(output.plan.brake.unwrap_or(0.0) > 0.0);
    }

    #[test]
    fn advisory_mode_dispatches_nothing() {
        let params = Params {
            mode: CtrlMode::Advisory,
            startup_gate_s: 0.0,
            ..Params::default()
        };
        let mut ctrl = SpeedCtrl::with_params(params);

        let event = LimitEvent {
            t_wall: 100.0,
            limit_kph: 80.0,
            dist_m: 100.0,
        };
        let input = InputData {
            sample: sample(100.0, 0.0, 120.0),
            limit_events: vec![event],
        };

        let (output, _) = ctrl.proc(&input).unwrap();
        assert_eq!(output.send, CtrlCmd::default());
    }

    #[test]
    fn throttle_and_brake_never_both_nonzero() {
        let mut ctrl = SpeedCtrl::with_params(full_mode_params());

        let event = LimitEvent {
            t_wall: 100.0,
            limit_kph: 80.0,
            dist_m: 400.0,
        };

        for i in 0..30 {
            let t = 100.0 + 0.2 * i as f64;
            let speed = 120.0 - i as f64;
            let input = InputData {
                sample: sample(t, 6.0 * i as f64, speed),
                limit_events: if i == 0 { vec![event] } else { vec![] },
            };
            let (output, _) = ctrl.proc(&input).unwrap();

            let th = output.plan.throttle.unwrap_or(0.0);
            let br = output.plan.brake.unwrap_or(0.0);
            assert!(
                th == 0.0 || br == 0.0,
                "throttle {} and brake {} both nonzero",
                th,
                br
            );
        }
    }
}
