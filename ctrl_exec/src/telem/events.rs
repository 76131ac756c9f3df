//! Limit event stream
//!
//! Non-blocking tail of the append-only JSONL event stream. The stream is
//! polled from a remembered byte offset each cycle, only complete lines are
//! consumed, and malformed or unknown records are skipped.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use serde_json::Value;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use veh_if::telem::LimitEvent;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Event types recognised as a limit announcement.
const LIMIT_EVENT_TYPES: [&str; 2] = ["next_limit", "getdata_next_limit"];

/// Upper bound on events drained per poll, keeps one cycle bounded even if
/// the stream has a large backlog.
const MAX_EVENTS_PER_POLL: usize = 100;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tail reader over the limit event stream.
pub struct LimitEventStream {
    path: PathBuf,

    /// Byte offset of the first unconsumed byte.
    offset: u64,

    /// True until the first successful poll when starting from the end.
    start_from_end: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LimitEventStream {
    /// Create a stream over the given path.
    ///
    /// With `from_end` true the stream skips everything already in the file
    /// and only yields events appended after the first poll.
    pub fn new<P: AsRef<Path>>(path: P, from_end: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            offset: 0,
            start_from_end: from_end,
        }
    }

    /// Drain the events appended since the last poll, oldest first.
    ///
    /// Never blocks, never raises: a missing file or unreadable content is
    /// just "no events this cycle".
    pub fn poll(&mut self) -> Vec<LimitEvent> {
        let mut events = Vec::new();

        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return events,
        };

        if self.start_from_end {
            self.start_from_end = false;
            if let Ok(meta) = file.metadata() {
                self.offset = meta.len();
            }
            return events;
        }

        if file.seek(SeekFrom::Start(self.offset)).is_err() {
            return events;
        }

        let mut buf = String::new();
        if file.read_to_string(&mut buf).is_err() {
            return events;
        }

        let mut consumed = 0usize;
        for line in buf.split_inclusive('\n') {
            // A line without its newline is still being written, leave it
            // for the next poll, as is any backlog beyond the per-poll bound
            if !line.ends_with('\n') || events.len() >= MAX_EVENTS_PER_POLL {
                break;
            }
            consumed += line.len();

            if let Some(event) = parse_event(line.trim()) {
                events.push(event);
            }
        }

        self.offset += consumed as u64;
        events
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Parse one JSONL record into a limit event, `None` for anything else.
fn parse_event(line: &str) -> Option<LimitEvent> {
    if line.is_empty() {
        return None;
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(_) => {
            debug!("Skipping malformed event line");
            return None;
        }
    };

    let event_type = value.get("type").and_then(Value::as_str)?;
    if !LIMIT_EVENT_TYPES.contains(&event_type) {
        return None;
    }

    // Field name variants from older collector versions are accepted
    let limit_kph = ["limit_kph", "kph", "speed_kph"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_f64))?;
    let dist_m = ["dist_m", "dist"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_f64))?;
    let t_wall = value.get("t_wall").and_then(Value::as_f64).unwrap_or(0.0);

    Some(LimitEvent {
        t_wall,
        limit_kph,
        dist_m,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::TempDir;
    use std::io::Write;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.file(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_nothing() {
        let dir = TempDir::new("events_missing");
        let mut stream = LimitEventStream::new(dir.file("events.jsonl"), false);
        assert!(stream.poll().is_empty());
    }

    #[test]
    fn drains_events_in_order_once() {
        let dir = TempDir::new("events_order");
        let path = write_file(
            &dir,
            "events.jsonl",
            "{\"type\":\"next_limit\",\"t_wall\":100.0,\"limit_kph\":80.0,\"dist_m\":500.0}\n\
             {\"type\":\"next_limit\",\"t_wall\":101.0,\"limit_kph\":60.0,\"dist_m\":900.0}\n",
        );

        let mut stream = LimitEventStream::new(&path, false);
        let events = stream.poll();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].limit_kph, 80.0);
        assert_eq!(events[1].limit_kph, 60.0);

        // Already consumed
        assert!(stream.poll().is_empty());

        // New appends are picked up from the remembered offset
        {
            let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(
                b"{\"type\":\"next_limit\",\"t_wall\":102.0,\"limit_kph\":40.0,\"dist_m\":1200.0}\n",
            )
            .unwrap();
        }
        let events = stream.poll();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].limit_kph, 40.0);
    }

    #[test]
    fn malformed_and_unknown_lines_are_skipped() {
        let dir = TempDir::new("events_bad");
        let path = write_file(
            &dir,
            "events.jsonl",
            "not json at all\n\
             {\"type\":\"marker_pass\",\"marker\":\"K12\"}\n\
             {\"type\":\"next_limit\",\"kph\":80.0,\"dist\":500.0}\n",
        );

        let mut stream = LimitEventStream::new(path, false);
        let events = stream.poll();

        // Only the limit event survives, with legacy field names accepted
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].limit_kph, 80.0);
        assert_eq!(events[0].dist_m, 500.0);
    }

    #[test]
    fn incomplete_trailing_line_is_left_for_later() {
        let dir = TempDir::new("events_partial");
        let path = write_file(
            &dir,
            "events.jsonl",
            "{\"type\":\"next_limit\",\"limit_kph\":80.0,\"dist_m\":500.0}\n\
             {\"type\":\"next_limit\",\"limit_kph\":60.0",
        );

        let mut stream = LimitEventStream::new(&path, false);
        assert_eq!(stream.poll().len(), 1);

        // Writer finishes the line
        {
            let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(b",\"dist_m\":900.0}\n").unwrap();
        }
        let events = stream.poll();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].limit_kph, 60.0);
    }

    #[test]
    fn start_from_end_skips_backlog() {
        let dir = TempDir::new("events_from_end");
        let path = write_file(
            &dir,
            "events.jsonl",
            "{\"type\":\"next_limit\",\"limit_kph\":80.0,\"dist_m\":500.0}\n",
        );

        let mut stream = LimitEventStream::new(&path, true);
        assert!(stream.poll().is_empty());
        assert!(stream.poll().is_empty());

        {
            let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(b"{\"type\":\"next_limit\",\"limit_kph\":60.0,\"dist_m\":900.0}\n")
                .unwrap();
        }
        let events = stream.poll();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].limit_kph, 60.0);
    }
}
