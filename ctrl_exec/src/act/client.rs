//! Implementation of the actuator client

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use veh_if::act::{ActuatorInterface, ChannelInfo};

// Internal
use super::{
    emergency, AckWatchdog, ActClientError, ActClientParams, EmergencyLatch, PendingAck,
    SendOutcome,
};
use crate::status::StatusWriter;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The actuator client.
///
/// Owns channel resolution, the per-channel rate limit and retry state, and
/// the escalation path to the emergency stop. The actuator itself sits
/// behind an `Arc<Mutex<..>>` because the optional ack watchdog confirms
/// commands from its own thread.
pub struct ActClient {
    act: Arc<Mutex<Box<dyn ActuatorInterface>>>,
    params: ActClientParams,

    /// Canonical channel name to the resolved vehicle channel.
    resolved: HashMap<String, ChannelInfo>,

    /// Every resolved braking channel, forced to maximum on escalation.
    brake_channels: Vec<ChannelInfo>,

    /// Per-channel time of the last accepted send.
    last_send: HashMap<String, Instant>,

    /// Per-channel retry counts, shared with the ack watchdog. Reset to
    /// zero only on a confirmed acknowledgment.
    retry_counts: Arc<Mutex<HashMap<String, u32>>>,

    emergency: Arc<EmergencyLatch>,
    status: Arc<StatusWriter>,

    /// Count of sends dropped because the channel did not resolve.
    unresolved_sends: u64,

    /// Wall time and value of the last command written.
    last_command: Option<(f64, f64)>,

    /// Wall time of the last confirmed acknowledgment.
    last_ack_time: Option<f64>,

    watchdog: Option<AckWatchdog>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ActClient {
    /// Create a client bound to the given actuator.
    ///
    /// The actuator's channel listing is queried once here and each
    /// canonical channel is resolved to the first alias the vehicle
    /// actually reports.
    pub fn new(
        act: Box<dyn ActuatorInterface>,
        params: ActClientParams,
        emergency: Arc<EmergencyLatch>,
        status: Arc<StatusWriter>,
    ) -> Self {
        let channels = act.list_channels();

        let mut resolved = HashMap::new();
        for (canonical, aliases) in &params.aliases {
            let hit = aliases
                .iter()
                .find_map(|alias| channels.iter().find(|c| &c.name == alias));
            match hit {
                Some(info) => {
                    info!("Channel {:?} resolved to {:?}", canonical, info.name);
                    resolved.insert(canonical.clone(), info.clone());
                }
                None => warn!("Channel {:?} did not resolve to any vehicle control", canonical),
            }
        }

        // Every braking alias present on the vehicle is forced on escalation
        let brake_channels: Vec<ChannelInfo> = params
            .aliases
            .get(super::BRAKE_CHANNEL)
            .map(|aliases| {
                aliases
                    .iter()
                    .filter_map(|alias| channels.iter().find(|c| &c.name == alias).cloned())
                    .collect()
            })
            .unwrap_or_default();

        let act = Arc::new(Mutex::new(act));
        let retry_counts = Arc::new(Mutex::new(HashMap::new()));

        let watchdog = if params.use_ack_watchdog {
            Some(AckWatchdog::new(
                act.clone(),
                retry_counts.clone(),
                emergency.clone(),
                status.clone(),
                brake_channels.clone(),
                params.clone(),
            ))
        } else {
            None
        };

        Self {
            act,
            params,
            resolved,
            brake_channels,
            last_send: HashMap::new(),
            retry_counts,
            emergency,
            status,
            unresolved_sends: 0,
            last_command: None,
            last_ack_time: None,
            watchdog,
        }
    }

    /// Send a value to a canonical channel.
    ///
    /// Applies, in order: the emergency latch, channel resolution, the
    /// per-channel rate limit, range clamping, the write itself, and
    /// acknowledgment confirmation with retries. Exceeding the retry budget
    /// escalates to the emergency stop and reports `Escalated`.
    pub fn send(&mut self, channel: &str, value: f64) -> Result<SendOutcome, ActClientError> {
        if self.emergency.is_active() {
            return Ok(SendOutcome::Rejected);
        }

        let info = match self.resolved.get(channel) {
            Some(info) => info.clone(),
            None => {
                self.unresolved_sends += 1;
                debug!("Dropping send to unresolved channel {:?}", channel);
                return Ok(SendOutcome::Unresolved);
            }
        };

        // Per-channel rate limit
        let now = Instant::now();
        if let Some(last) = self.last_send.get(channel) {
            if now.duration_since(*last).as_secs_f64() < self.params.min_send_interval_s {
                return Ok(SendOutcome::RateLimited);
            }
        }
        self.last_send.insert(String::from(channel), now);

        // Clamp into the channel's reported range
        let value = if value.is_nan() { 0.0 } else { value };
        let value = value.clamp(info.min_value, info.max_value);

        loop {
            // The write itself
            let write_result = self
                .act
                .lock()
                .map_err(|_| ActClientError::LockPoisoned)?
                .write(&info.name, value);

            if let Err(e) = write_result {
                warn!("Write to {} failed: {}", info.name, e);
                if self.record_retry(channel)? > self.params.max_retries {
                    self.escalate("actuator write error");
                    return Ok(SendOutcome::Escalated);
                }
                std::thread::sleep(Duration::from_secs_f64(self.params.retry_pause_s));
                continue;
            }

            self.last_command = Some((emergency::now_wall_s(), value));

            // Asynchronous confirmation: hand off to the watchdog
            if let Some(watchdog) = &self.watchdog {
                watchdog.enqueue(PendingAck {
                    channel: String::from(channel),
                    name: info.name.clone(),
                    expected: value,
                });
                return Ok(SendOutcome::Pending);
            }

            // Synchronous confirmation
            if wait_for_ack(
                &self.act,
                &info.name,
                value,
                self.params.ack_tolerance,
                self.params.ack_timeout_s,
                self.params.ack_poll_interval_s,
            )? {
                self.clear_retries(channel)?;
                self.last_ack_time = Some(emergency::now_wall_s());
                return Ok(SendOutcome::Confirmed);
            }

            if self.record_retry(channel)? > self.params.max_retries {
                self.escalate("missing acknowledgment");
                return Ok(SendOutcome::Escalated);
            }
            std::thread::sleep(Duration::from_secs_f64(self.params.retry_pause_s));
        }
    }

    /// Trigger the emergency stop.
    pub fn escalate(&self, reason: &str) {
        emergency::escalate(
            reason,
            &self.act,
            &self.brake_channels,
            &self.emergency,
            &self.status,
        );
    }

    /// The current retry count of a channel.
    pub fn retry_count(&self, channel: &str) -> u32 {
        self.retry_counts
            .lock()
            .map(|counts| counts.get(channel).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Count of sends dropped on unresolved channels.
    pub fn unresolved_sends(&self) -> u64 {
        self.unresolved_sends
    }

    /// Wall time and value of the last command written, if any.
    pub fn last_command(&self) -> Option<(f64, f64)> {
        self.last_command
    }

    /// Wall time of the last confirmed acknowledgment, if any.
    pub fn last_ack_time(&self) -> Option<f64> {
        self.last_ack_time
    }

    /// Stop the ack watchdog, if one is running, with a bounded join.
    pub fn shutdown(&mut self) {
        if let Some(mut watchdog) = self.watchdog.take() {
            watchdog.stop();
        }
    }

    fn record_retry(&self, channel: &str) -> Result<u32, ActClientError> {
        let mut counts = self
            .retry_counts
            .lock()
            .map_err(|_| ActClientError::LockPoisoned)?;
        let count = counts.entry(String::from(channel)).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    fn clear_retries(&self, channel: &str) -> Result<(), ActClientError> {
        let mut counts = self
            .retry_counts
            .lock()
            .map_err(|_| ActClientError::LockPoisoned)?;
        if let Some(count) = counts.get_mut(channel) {
            *count = 0;
        }
        Ok(())
    }
}

impl Drop for ActClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Poll the actuator until it reflects `expected` or the timeout elapses.
///
/// Transient read errors are ignored and retried until the timeout. The
/// actuator lock is taken per poll, never held across a sleep.
pub(crate) fn wait_for_ack(
    act: &Arc<Mutex<Box<dyn ActuatorInterface>>>,
    name: &str,
    expected: f64,
    tolerance: f64,
    timeout_s: f64,
    poll_interval_s: f64,
) -> Result<bool, ActClientError> {
    let deadline = Instant::now() + Duration::from_secs_f64(timeout_s.max(0.0));

    loop {
        let read = act
            .lock()
            .map_err(|_| ActClientError::LockPoisoned)?
            .read(name);

        if let Ok(value) = read {
            if (value - expected).abs() <= tolerance {
                return Ok(true);
            }
        }

        if Instant::now() >= deadline {
            return Ok(false);
        }
        std::thread::sleep(Duration::from_secs_f64(poll_interval_s));
    }
}
