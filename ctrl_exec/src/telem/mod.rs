//! Telemetry source abstraction
//!
//! Two interchangeable back-ends sit behind the `TelemSource` trait: the
//! primary structured store and a secondary flat log tail. The client wraps
//! both with staleness detection and a one-way failover after repeated
//! primary failures.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod events;
mod logfile;
mod store;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use serde::Deserialize;
use veh_if::telem::TelemSample;

// Internal
pub use events::*;
pub use logfile::*;
pub use store::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors raised by a telemetry source.
#[derive(Debug, thiserror::Error)]
pub enum TelemSourceError {
    #[error("Store error: {0}")]
    StoreError(rusqlite::Error),

    #[error("Log file error: {0}")]
    FileError(std::io::Error),
}

/// Which back-end the client is currently reading from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveSource {
    Primary,
    Secondary,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A non-blocking telemetry back-end.
///
/// `read_latest` shall return the newest sample past the source's internal
/// cursor, `None` when nothing new is available, and shall never block.
pub trait TelemSource {
    /// Human-readable name of the source for logging.
    fn name(&self) -> &'static str;

    /// Read the newest sample past the internal cursor.
    fn read_latest(&mut self) -> Result<Option<TelemSample>, TelemSourceError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the telemetry client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemParams {
    /// Path to the primary store database, relative to the software root.
    pub store_path: String,

    /// Path to the secondary flat log, relative to the software root.
    pub log_path: String,

    /// Path to the limit event stream, relative to the software root.
    pub events_path: String,

    /// Age beyond which a sample is considered stale.
    ///
    /// Units: seconds
    pub stale_threshold_s: f64,

    /// Number of consecutive stale or failed primary reads which trigger
    /// failover to the secondary source.
    pub failover_threshold: u32,

    /// Start reading the event stream from its current end rather than the
    /// beginning.
    pub events_from_end: bool,
}

/// Telemetry client wrapping the primary and secondary sources.
pub struct TelemClient {
    primary: Box<dyn TelemSource>,
    secondary: Box<dyn TelemSource>,

    active: ActiveSource,
    consec_bad_reads: u32,

    /// Wall time of the last sample handed out, for duplicate suppression.
    last_t_wall: Option<f64>,

    stale_threshold_s: f64,
    failover_threshold: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TelemParams {
    fn default() -> Self {
        Self {
            store_path: String::from("data/run.db"),
            log_path: String::from("data/run.csv"),
            events_path: String::from("data/events.jsonl"),
            stale_threshold_s: 2.0,
            failover_threshold: 5,
            events_from_end: false,
        }
    }
}

impl TelemClient {
    /// Create a client over the given primary and secondary sources.
    pub fn new(
        primary: Box<dyn TelemSource>,
        secondary: Box<dyn TelemSource>,
        params: &TelemParams,
    ) -> Self {
        Self {
            primary,
            secondary,
            active: ActiveSource::Primary,
            consec_bad_reads: 0,
            last_t_wall: None,
            stale_threshold_s: params.stale_threshold_s,
            failover_threshold: params.failover_threshold,
        }
    }

    /// Which back-end is currently active.
    pub fn active_source(&self) -> ActiveSource {
        self.active
    }

    /// Read the latest fresh sample, if there is one.
    ///
    /// `now_s` is the current wall time used for the staleness check.
    /// Returns `None` when there is no new sample, the sample is stale or
    /// invalid, or its timestamp duplicates the previous one. Repeated
    /// staleness or errors on the primary switch the client to the
    /// secondary source for the remainder of the run.
    pub fn read_latest(&mut self, now_s: f64) -> Option<TelemSample> {
        let source = match self.active {
            ActiveSource::Primary => &mut self.primary,
            ActiveSource::Secondary => &mut self.secondary,
        };

        let sample = match source.read_latest() {
            Ok(Some(s)) => s,
            Ok(None) => return None,
            Err(e) => {
                warn!("Telemetry read from {} failed: {}", source.name(), e);
                self.record_bad_read();
                return None;
            }
        };

        if !sample.is_valid() {
            self.record_bad_read();
            return None;
        }

        if now_s - sample.t_wall > self.stale_threshold_s {
            self.record_bad_read();
            return None;
        }

        // Duplicate timestamp: no new data this cycle, but the source is
        // healthy
        if let Some(last) = self.last_t_wall {
            if (sample.t_wall - last).abs() < 1e-6 {
                return None;
            }
        }

        self.consec_bad_reads = 0;
        self.last_t_wall = Some(sample.t_wall);
        Some(sample)
    }

    /// Count a stale or failed read and fail over if the threshold is hit.
    ///
    /// Failover is one-way: once on the secondary the client never returns
    /// to the primary within a run.
    fn record_bad_read(&mut self) {
        self.consec_bad_reads += 1;

        if self.active == ActiveSource::Primary && self.consec_bad_reads >= self.failover_threshold
        {
            warn!(
                "{} consecutive bad primary reads, failing over to {}",
                self.consec_bad_reads,
                self.secondary.name()
            );
            self.active = ActiveSource::Secondary;
            self.consec_bad_reads = 0;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Scripted telemetry source for client tests.
    struct ScriptedSource {
        name: &'static str,
        responses: Vec<Result<Option<TelemSample>, TelemSourceError>>,
    }

    impl ScriptedSource {
        fn new(
            name: &'static str,
            responses: Vec<Result<Option<TelemSample>, TelemSourceError>>,
        ) -> Self {
            // Stored reversed so pop() hands them out in order
            let mut responses = responses;
            responses.reverse();
            Self { name, responses }
        }
    }

    impl TelemSource for ScriptedSource {
        fn name(&self) -> &'static str {
            self.name
        }

        fn read_latest(&mut self) -> Result<Option<TelemSample>, TelemSourceError> {
            self.responses.pop().unwrap_or(Ok(None))
        }
    }

    fn fresh(t_wall: f64) -> TelemSample {
        TelemSample {
            t_wall,
            odom_m: 100.0,
            speed_kph: 80.0,
            next_limit_kph: None,
            dist_next_limit_m: None,
        }
    }

    fn params(threshold: u32) -> TelemParams {
        TelemParams {
            failover_threshold: threshold,
            stale_threshold_s: 2.0,
            ..TelemParams::default()
        }
    }

    #[test]
    fn fresh_sample_passes_through() {
        let primary = ScriptedSource::new("p", vec![Ok(Some(fresh(100.0)))]);
        let secondary = ScriptedSource::new("s", vec![]);
        let mut client = TelemClient::new(Box::new(primary), Box::new(secondary), &params(5));

        assert_eq!(client.read_latest(100.5), Some(fresh(100.0)));
        assert_eq!(client.active_source(), ActiveSource::Primary);
    }

    #[test]
    fn stale_sample_is_dropped() {
        let primary = ScriptedSource::new("p", vec![Ok(Some(fresh(10.0)))]);
        let secondary = ScriptedSource::new("s", vec![]);
        let mut client = TelemClient::new(Box::new(primary), Box::new(secondary), &params(5));

        // 90 s after the sample was taken
        assert_eq!(client.read_latest(100.0), None);
    }

    #[test]
    fn duplicate_timestamp_is_suppressed() {
        let primary =
            ScriptedSource::new("p", vec![Ok(Some(fresh(100.0))), Ok(Some(fresh(100.0)))]);
        let secondary = ScriptedSource::new("s", vec![]);
        let mut client = TelemClient::new(Box::new(primary), Box::new(secondary), &params(5));

        assert!(client.read_latest(100.1).is_some());
        assert!(client.read_latest(100.2).is_none());

        // A duplicate is not a failure
        assert_eq!(client.active_source(), ActiveSource::Primary);
    }

    #[test]
    fn consecutive_stale_reads_fail_over() {
        let stale: Vec<_> = (0..5).map(|_| Ok(Some(fresh(10.0)))).collect();
        let primary = ScriptedSource::new("p", stale);
        let secondary = ScriptedSource::new("s", vec![Ok(Some(fresh(100.0)))]);
        let mut client = TelemClient::new(Box::new(primary), Box::new(secondary), &params(5));

        for _ in 0..5 {
            assert!(client.read_latest(100.0).is_none());
        }
        assert_eq!(client.active_source(), ActiveSource::Secondary);

        // Subsequent reads come from the secondary for the rest of the run
        assert_eq!(client.read_latest(100.5), Some(fresh(100.0)));
    }

    #[test]
    fn fresh_read_resets_the_failure_count() {
        let mut responses: Vec<Result<Option<TelemSample>, TelemSourceError>> = Vec::new();
        for i in 0..12 {
            if i % 3 == 2 {
                responses.push(Ok(Some(fresh(100.0 + i as f64))));
            } else {
                responses.push(Ok(Some(fresh(10.0))));
            }
        }
        let primary = ScriptedSource::new("p", responses);
        let secondary = ScriptedSource::new("s", vec![]);
        let mut client = TelemClient::new(Box::new(primary), Box::new(secondary), &params(5));

        for i in 0..12 {
            client.read_latest(100.0 + i as f64);
        }

        // Two stale reads between every fresh one never hits the threshold
        assert_eq!(client.active_source(), ActiveSource::Primary);
    }

    #[test]
    fn secondary_errors_do_not_fail_further() {
        let primary: ScriptedSource = ScriptedSource::new(
            "p",
            (0..5)
                .map(|_| {
                    Err(TelemSourceError::FileError(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "gone",
                    )))
                })
                .collect(),
        );
        let secondary = ScriptedSource::new(
            "s",
            vec![
                Err(TelemSourceError::FileError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "also gone",
                ))),
                Ok(Some(fresh(100.0))),
            ],
        );
        let mut client = TelemClient::new(Box::new(primary), Box::new(secondary), &params(5));

        for _ in 0..5 {
            client.read_latest(100.0);
        }
        assert_eq!(client.active_source(), ActiveSource::Secondary);

        // An error on the secondary just skips the cycle
        assert!(client.read_latest(100.0).is_none());
        assert_eq!(client.active_source(), ActiveSource::Secondary);
        assert!(client.read_latest(100.5).is_some());
    }
}
