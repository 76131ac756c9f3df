//! Background acknowledgment watchdog
//!
//! When enabled, `ActClient::send` returns optimistically after the write
//! and hands confirmation to this worker. The worker rechecks pending
//! commands on an interval, requeues those still unconfirmed, and shares
//! the retry counters and emergency latch with the synchronous path so the
//! escalation decision is the same on both.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use veh_if::act::{ActuatorInterface, ChannelInfo};

// Internal
use super::{client, emergency, ActClientParams, EmergencyLatch};
use crate::status::StatusWriter;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One command awaiting confirmation.
#[derive(Debug, Clone)]
pub struct PendingAck {
    /// Canonical channel name, the retry counter key.
    pub channel: String,

    /// Resolved vehicle channel name to read back.
    pub name: String,

    /// The value the actuator shall reflect.
    pub expected: f64,
}

/// Handle to the watchdog worker thread.
pub struct AckWatchdog {
    tx: Sender<PendingAck>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AckWatchdog {
    /// Spawn the worker thread.
    pub fn new(
        act: Arc<Mutex<Box<dyn ActuatorInterface>>>,
        retry_counts: Arc<Mutex<HashMap<String, u32>>>,
        latch: Arc<EmergencyLatch>,
        status: Arc<StatusWriter>,
        brake_channels: Vec<ChannelInfo>,
        params: ActClientParams,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let requeue_tx = tx.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();

        let handle = std::thread::spawn(move || {
            worker(
                rx,
                requeue_tx,
                act,
                retry_counts,
                latch,
                status,
                brake_channels,
                params,
                worker_stop,
            )
        });

        Self {
            tx,
            stop,
            handle: Some(handle),
        }
    }

    /// Queue a command for background confirmation.
    pub fn enqueue(&self, pending: PendingAck) {
        if self.tx.send(pending).is_err() {
            warn!("Ack watchdog queue is closed, confirmation dropped");
        }
    }

    /// Signal the worker to stop and join it.
    ///
    /// The join is bounded: the worker wakes at least every poll interval
    /// to check the stop flag.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Ack watchdog thread panicked");
            }
        }
    }
}

impl Drop for AckWatchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// The watchdog loop: FIFO over pending confirmations.
#[allow(clippy::too_many_arguments)]
fn worker(
    rx: Receiver<PendingAck>,
    requeue_tx: Sender<PendingAck>,
    act: Arc<Mutex<Box<dyn ActuatorInterface>>>,
    retry_counts: Arc<Mutex<HashMap<String, u32>>>,
    latch: Arc<EmergencyLatch>,
    status: Arc<StatusWriter>,
    brake_channels: Vec<ChannelInfo>,
    params: ActClientParams,
    stop: Arc<AtomicBool>,
) {
    let idle = Duration::from_secs_f64(params.watchdog_interval_s);

    while !stop.load(Ordering::SeqCst) {
        let pending = match rx.recv_timeout(idle) {
            Ok(p) => p,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        // Nothing left to confirm once the emergency stop has fired
        if latch.is_active() {
            continue;
        }

        let confirmed = client::wait_for_ack(
            &act,
            &pending.name,
            pending.expected,
            params.ack_tolerance,
            params.ack_timeout_s,
            params.ack_poll_interval_s,
        )
        .unwrap_or(false);

        if confirmed {
            if let Ok(mut counts) = retry_counts.lock() {
                if let Some(count) = counts.get_mut(&pending.channel) {
                    *count = 0;
                }
            }
            continue;
        }

        // Unconfirmed: count a retry, escalate past the budget, requeue
        // otherwise
        let count = match retry_counts.lock() {
            Ok(mut counts) => {
                let count = counts.entry(pending.channel.clone()).or_insert(0);
                *count += 1;
                *count
            }
            Err(_) => {
                warn!("Retry counter lock poisoned in ack watchdog");
                continue;
            }
        };

        if count > params.max_retries {
            emergency::escalate(
                "missing acknowledgment",
                &act,
                &brake_channels,
                &latch,
                &status,
            );
            continue;
        }

        std::thread::sleep(idle);
        if requeue_tx.send(pending).is_err() {
            break;
        }
    }
}
