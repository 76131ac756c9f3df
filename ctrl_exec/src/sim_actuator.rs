//! Simulated actuator backend
//!
//! An in-memory implementation of the actuator boundary for bench runs and
//! tests. The simulated vehicle distinguishes the value last *written* to a
//! channel from the value the channel *reflects* on read-back, so ack
//! timeouts and write failures can be injected.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use veh_if::act::{ActError, ActuatorInterface, ChannelInfo};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Simulated vehicle controls.
///
/// Clones share the same underlying state, so a test can keep a clone for
/// inspection and fault injection while the client owns the boxed original.
#[derive(Clone)]
pub struct SimActuator {
    channels: Vec<ChannelInfo>,

    /// Values the channels reflect on read-back.
    values: Arc<Mutex<HashMap<String, f64>>>,

    /// Values last accepted by a write, whether or not reflected.
    written: Arc<Mutex<HashMap<String, f64>>>,

    /// Writes left to fail before writes succeed again.
    fail_writes_remaining: Arc<AtomicU32>,

    /// When false, accepted writes are never reflected on read-back.
    acks_enabled: Arc<AtomicBool>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimActuator {
    /// Create a simulated vehicle with the usual control set.
    pub fn new() -> Self {
        Self::with_channels(vec![
            ChannelInfo {
                name: String::from("Regulator"),
                min_value: 0.0,
                max_value: 1.0,
            },
            ChannelInfo {
                name: String::from("TrainBrakeControl"),
                min_value: 0.0,
                max_value: 1.0,
            },
            ChannelInfo {
                name: String::from("VirtualBrake"),
                min_value: 0.0,
                max_value: 1.0,
            },
        ])
    }

    /// Create a simulated vehicle with an explicit channel set.
    pub fn with_channels(channels: Vec<ChannelInfo>) -> Self {
        let mut values = HashMap::new();
        for channel in &channels {
            values.insert(channel.name.clone(), 0.0);
        }

        Self {
            channels,
            values: Arc::new(Mutex::new(values)),
            written: Arc::new(Mutex::new(HashMap::new())),
            fail_writes_remaining: Arc::new(AtomicU32::new(0)),
            acks_enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Make the next `count` writes fail.
    pub fn set_fail_writes(&self, count: u32) {
        self.fail_writes_remaining.store(count, Ordering::SeqCst);
    }

    /// Enable or disable read-back reflection of accepted writes.
    pub fn set_acks_enabled(&self, enabled: bool) {
        self.acks_enabled.store(enabled, Ordering::SeqCst);
    }

    /// The value a channel currently reflects.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.lock().ok().and_then(|v| v.get(name).copied())
    }

    /// The value last accepted by a write on a channel.
    pub fn last_written(&self, name: &str) -> Option<f64> {
        self.written.lock().ok().and_then(|v| v.get(name).copied())
    }

    /// Directly set the reflected value, as if the vehicle applied it.
    pub fn force_value(&self, name: &str, value: f64) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(String::from(name), value);
        }
    }
}

impl Default for SimActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorInterface for SimActuator {
    fn list_channels(&self) -> Vec<ChannelInfo> {
        self.channels.clone()
    }

    fn write(&mut self, channel: &str, value: f64) -> Result<(), ActError> {
        if !self.channels.iter().any(|c| c.name == channel) {
            return Err(ActError::UnknownChannel(String::from(channel)));
        }

        // Injected transient failure
        let remaining = self.fail_writes_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_writes_remaining
                .store(remaining - 1, Ordering::SeqCst);
            return Err(ActError::WriteFailed(
                String::from(channel),
                String::from("injected failure"),
            ));
        }

        if let Ok(mut written) = self.written.lock() {
            written.insert(String::from(channel), value);
        }

        if self.acks_enabled.load(Ordering::SeqCst) {
            if let Ok(mut values) = self.values.lock() {
                values.insert(String::from(channel), value);
            }
        }

        Ok(())
    }

    fn read(&self, channel: &str) -> Result<f64, ActError> {
        self.value(channel)
            .ok_or_else(|| ActError::UnknownChannel(String::from(channel)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn write_reflects_on_read() {
        let mut act = SimActuator::new();
        act.write("Regulator", 0.4).unwrap();
        assert_eq!(act.read("Regulator").unwrap(), 0.4);
    }

    #[test]
    fn unknown_channel_errors() {
        let mut act = SimActuator::new();
        assert!(act.write("Pantograph", 1.0).is_err());
        assert!(act.read("Pantograph").is_err());
    }

    #[test]
    fn injected_failures_are_transient() {
        let mut act = SimActuator::new();
        act.set_fail_writes(2);

        assert!(act.write("Regulator", 0.1).is_err());
        assert!(act.write("Regulator", 0.1).is_err());
        assert!(act.write("Regulator", 0.1).is_ok());
    }

    #[test]
    fn disabled_acks_accept_but_do_not_reflect() {
        let mut act = SimActuator::new();
        act.set_acks_enabled(false);

        act.write("TrainBrakeControl", 0.7).unwrap();
        assert_eq!(act.read("TrainBrakeControl").unwrap(), 0.0);
        assert_eq!(act.last_written("TrainBrakeControl"), Some(0.7));
    }

    #[test]
    fn clones_share_state() {
        let mut act = SimActuator::new();
        let observer = act.clone();

        act.write("Regulator", 0.9).unwrap();
        assert_eq!(observer.value("Regulator"), Some(0.9));
    }
}
