//! Secondary telemetry back-end: flat log tail
//!
//! Tails the collector's append-only CSV run log. The file is written by
//! another process, so this source has to tolerate a partial trailing line,
//! either `;` or `,` as a delimiter, and rows whose fields fail to parse.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use veh_if::telem::TelemSample;

// Internal
use super::{TelemSource, TelemSourceError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// How much of the end of the file is scanned for the last complete row.
const TAIL_CHUNK_BYTES: u64 = 65536;

/// Accepted column names for each sample field, first match wins.
const T_WALL_COLS: [&str; 2] = ["t_wall", "time_wall_s"];
const ODOM_COLS: [&str; 2] = ["odom_m", "odometer_m"];
const SPEED_COLS: [&str; 3] = ["speed_kph", "v_kmh", "speed_kmh"];
const NEXT_LIMIT_COLS: [&str; 2] = ["next_limit_kph", "limit_next_kph"];
const DIST_LIMIT_COLS: [&str; 2] = ["dist_next_limit_m", "dist_limit_m"];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Telemetry source tailing a flat CSV run log.
pub struct LogTelemSource {
    path: PathBuf,

    /// Wall time of the last row handed out, so an unchanged file yields
    /// `None` rather than the same row again.
    last_t_wall: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LogTelemSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            last_t_wall: None,
        }
    }
}

impl TelemSource for LogTelemSource {
    fn name(&self) -> &'static str {
        "flat log"
    }

    fn read_latest(&mut self) -> Result<Option<TelemSample>, TelemSourceError> {
        // A missing file is "no data yet", not an error
        if !self.path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&self.path).map_err(TelemSourceError::FileError)?;

        // Header line first
        let mut head = String::new();
        let mut byte = [0u8; 1];
        loop {
            match file.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    if byte[0] == b'\n' {
                        break;
                    }
                    head.push(byte[0] as char);
                }
                Err(e) => return Err(TelemSourceError::FileError(e)),
            }
            if head.len() > 4096 {
                return Ok(None);
            }
        }

        let delim = detect_delimiter(&head);
        let header: Vec<String> = head
            .trim_end_matches('\r')
            .split(delim)
            .map(|h| h.trim().to_string())
            .collect();

        // Read a bounded tail chunk and look for the last complete row
        let size = file
            .metadata()
            .map_err(TelemSourceError::FileError)?
            .len();
        let tail_start = size.saturating_sub(TAIL_CHUNK_BYTES);
        file.seek(SeekFrom::Start(tail_start))
            .map_err(TelemSourceError::FileError)?;

        let mut tail_bytes = Vec::new();
        file.read_to_end(&mut tail_bytes)
            .map_err(TelemSourceError::FileError)?;
        let tail = String::from_utf8_lossy(&tail_bytes);

        let mut lines: Vec<&str> = tail.lines().collect();

        // Dropping the first line covers both starting mid-row and the
        // header itself when the file is small
        if !lines.is_empty() {
            lines.remove(0);
        }

        // Walk backwards until a row with the right column count parses
        for line in lines.iter().rev() {
            if line.trim().is_empty() {
                continue;
            }

            let values: Vec<&str> = line.split(delim).collect();
            if values.len() != header.len() {
                continue;
            }

            let sample = match parse_row(&header, &values) {
                Some(s) => s,
                None => continue,
            };

            // Same row as last time: nothing new
            if let Some(last) = self.last_t_wall {
                if (sample.t_wall - last).abs() < 1e-6 {
                    return Ok(None);
                }
            }

            self.last_t_wall = Some(sample.t_wall);
            return Ok(Some(sample));
        }

        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Pick `;` or `,` depending on which appears more often in the header.
fn detect_delimiter(header: &str) -> char {
    let semis = header.matches(';').count();
    let commas = header.matches(',').count();
    if semis >= commas {
        ';'
    } else {
        ','
    }
}

/// Parse a numeric field, tolerating a comma decimal separator.
fn parse_field(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => trimmed.replace(',', ".").parse::<f64>().ok(),
    }
}

/// Get the first matching column's parsed value.
fn column(header: &[String], values: &[&str], names: &[&str]) -> Option<f64> {
    for name in names {
        if let Some(idx) = header.iter().position(|h| h == name) {
            if let Some(v) = values.get(idx).and_then(|s| parse_field(s)) {
                return Some(v);
            }
        }
    }
    None
}

/// Build a sample from one row, `None` if the mandatory fields are missing.
fn parse_row(header: &[String], values: &[&str]) -> Option<TelemSample> {
    let t_wall = column(header, values, &T_WALL_COLS)?;
    let odom_m = column(header, values, &ODOM_COLS)?;
    let speed_kph = column(header, values, &SPEED_COLS)?;

    Some(TelemSample {
        t_wall,
        odom_m,
        speed_kph,
        next_limit_kph: column(header, values, &NEXT_LIMIT_COLS),
        dist_next_limit_m: column(header, values, &DIST_LIMIT_COLS),
    })
}
