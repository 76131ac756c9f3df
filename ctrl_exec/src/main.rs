//! Main control executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Limit event draining
//!         - Telemetry acquisition (with staleness detection and failover)
//!         - Speed control processing
//!         - Command dispatch through the actuator safety layer
//!         - Status record and archive output
//!
//! # Modules
//!
//! All cyclic modules (e.g. `speed_ctrl`) shall meet the following
//! requirements:
//!     1. Provide a public struct implementing the `util::module::State`
//!        trait.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use ctrl_lib::{
    act::{self, ActClient, ActClientParams, EmergencyLatch, SendOutcome},
    data_store::DataStore,
    params::CtrlExecParams,
    sim_actuator::SimActuator,
    status::StatusWriter,
    telem::{LimitEventStream, LogTelemSource, StoreTelemSource, TelemClient, TelemParams},
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use veh_if::ctrl::{CtrlMode, StatusRecord};

// Internal
use util::{
    archive::Archived,
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("ctrl_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Tarvos Speed Supervision Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: CtrlExecParams =
        util::params::load("ctrl_exec.toml").wrap_err("Could not load exec params")?;
    let telem_params: TelemParams =
        util::params::load("telem.toml").wrap_err("Could not load telemetry params")?;
    let act_params: ActClientParams =
        util::params::load("act_client.toml").wrap_err("Could not load actuator client params")?;

    info!("Exec parameters loaded");

    let root = util::host::get_sw_root()
        .map_err(|_| eyre!("The software root environment variable (TARVOS_SW_ROOT) is not set"))?;

    // ---- INITIALISE TELEMETRY ----

    let primary = StoreTelemSource::open(root.join(&telem_params.store_path))
        .wrap_err("Failed to open the primary telemetry store")?;
    let secondary = LogTelemSource::new(root.join(&telem_params.log_path));
    let mut telem_client = TelemClient::new(Box::new(primary), Box::new(secondary), &telem_params);

    let mut event_stream = LimitEventStream::new(
        root.join(&telem_params.events_path),
        telem_params.events_from_end,
    );

    info!("Telemetry sources initialised");

    // ---- INITIALISE ACTUATOR SAFETY LAYER ----

    let emergency = Arc::new(EmergencyLatch::new());
    let status = Arc::new(StatusWriter::new(root.join(&exec_params.status_path)));

    // The simulated vehicle backend. A hardware backend would be bound here
    // instead, behind the same ActuatorInterface contract.
    let actuator = SimActuator::new();
    let mut act_client = ActClient::new(
        Box::new(actuator),
        act_params,
        emergency.clone(),
        status.clone(),
    );

    info!("Actuator client initialised");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    ds.speed_ctrl
        .init("speed_ctrl.toml", &session)
        .wrap_err("Failed to initialise SpeedCtrl")?;
    info!("SpeedCtrl init complete");

    info!("Module initialisation complete\n");

    // A stop file in the session root requests a clean exit, checked once
    // per cycle
    let stop_file = session.session_root.join("stop");
    info!("Create {:?} to request a clean stop", stop_file);

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let cycle_frequency_hz = 1.0 / exec_params.cycle_period_s;
    let run_start = Instant::now();

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(cycle_frequency_hz);

        // ---- STOP CONDITIONS ----

        if stop_file.exists() {
            info!("Stop file found, stopping");
            break;
        }
        if exec_params.duration_s > 0.0
            && run_start.elapsed().as_secs_f64() >= exec_params.duration_s
        {
            info!("Run duration reached, stopping");
            break;
        }

        // ---- DATA INPUT ----

        // Absorb limit events. Events are held over skipped cycles so none
        // are lost while telemetry is unavailable.
        ds.pending_limit_events.extend(event_stream.poll());

        let sample = telem_client.read_latest(act::now_wall_s());

        // ---- CONTROL ALGORITHM PROCESSING ----

        match sample {
            Some(sample) => {
                ds.speed_ctrl_input.sample = sample;
                ds.speed_ctrl_input.limit_events = std::mem::take(&mut ds.pending_limit_events);

                // SpeedCtrl processing
                match ds.speed_ctrl.proc(&ds.speed_ctrl_input) {
                    Ok((o, r)) => {
                        ds.speed_ctrl_output = o;
                        ds.speed_ctrl_report = r;

                        // ---- COMMAND DISPATCH ----

                        let send = ds.speed_ctrl_output.send;
                        if let Some(throttle) = send.throttle {
                            dispatch(&mut act_client, act::THROTTLE_CHANNEL, throttle);
                        }
                        if let Some(brake) = send.brake {
                            dispatch(&mut act_client, act::BRAKE_CHANNEL, brake);
                        }
                    }
                    Err(e) => {
                        // SpeedCtrl errors mean the sample was unusable, so
                        // just issue the warning and continue
                        warn!("Error during SpeedCtrl processing: {}", e)
                    }
                };

                // ---- WRITE ARCHIVES ----

                if let Err(e) = ds.speed_ctrl.write() {
                    warn!("Could not write SpeedCtrl archives: {}", e);
                }
            }
            None => {
                ds.num_skipped_cycles += 1;
            }
        }

        // ---- STATUS OUTPUT ----

        // The emergency path owns the record once latched
        if ds.is_1_hz_cycle && !emergency.is_active() {
            let record = StatusRecord {
                mode: String::from(mode_str(ds.speed_ctrl.mode())),
                takeover: false,
                reason: String::new(),
                t_wall: act::now_wall_s(),
                last_command_time: act_client.last_command().map(|(t, _)| t),
                last_command_value: act_client.last_command().map(|(_, v)| v),
                last_ack_time: act_client.last_ack_time(),
            };
            if let Err(e) = status.write(&record) {
                warn!("Could not write the status record: {}", e);
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(exec_params.cycle_period_s).checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - exec_params.cycle_period_s
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    act_client.shutdown();

    info!(
        "End of execution ({} cycles, {} skipped)",
        ds.num_cycles, ds.num_skipped_cycles
    );

    Ok(())
}

/// Dispatch one channel's command, logging the outcome.
fn dispatch(act_client: &mut ActClient, channel: &str, value: f64) {
    match act_client.send(channel, value) {
        Ok(SendOutcome::Confirmed) | Ok(SendOutcome::Pending) => (),
        Ok(SendOutcome::RateLimited) => debug!("{} command rate limited", channel),
        Ok(SendOutcome::Unresolved) => debug!("{} command dropped, channel unresolved", channel),
        Ok(SendOutcome::Rejected) => debug!("{} command rejected, emergency active", channel),
        Ok(SendOutcome::Escalated) => warn!("{} command escalated to emergency stop", channel),
        Err(e) => warn!("{} command failed: {}", channel, e),
    }
}

/// The status record representation of an operating mode.
fn mode_str(mode: CtrlMode) -> &'static str {
    match mode {
        CtrlMode::Full => "full",
        CtrlMode::BrakeOnly => "brake_only",
        CtrlMode::Advisory => "advisory",
    }
}
