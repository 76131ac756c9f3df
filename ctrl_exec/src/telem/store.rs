//! Primary telemetry back-end: structured SQLite store
//!
//! The collector writes one row per sample into a `telemetry` table. This
//! source reads the most recent row past the last-seen rowid, so each
//! sample is handed out at most once.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use veh_if::telem::TelemSample;

// Internal
use super::{TelemSource, TelemSourceError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Telemetry source reading from the live SQLite run store.
pub struct StoreTelemSource {
    conn: Connection,

    /// The rowid of the newest row already handed out.
    last_rowid: i64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StoreTelemSource {
    /// Open the store at the given path.
    ///
    /// The connection is read-side only: the schema is owned by the
    /// collector. A busy timeout keeps reads from erroring while the
    /// collector holds the write lock.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TelemSourceError> {
        let conn = Connection::open(path.as_ref()).map_err(TelemSourceError::StoreError)?;

        conn.pragma_update(None, "busy_timeout", 250)
            .map_err(TelemSourceError::StoreError)?;

        Ok(Self {
            conn,
            last_rowid: 0,
        })
    }
}

impl TelemSource for StoreTelemSource {
    fn name(&self) -> &'static str {
        "sqlite store"
    }

    fn read_latest(&mut self) -> Result<Option<TelemSample>, TelemSourceError> {
        let row = self
            .conn
            .query_row(
                "SELECT rowid, t_wall, odom_m, speed_kph, next_limit_kph, dist_next_limit_m \
                 FROM telemetry WHERE rowid > ?1 ORDER BY rowid DESC LIMIT 1",
                [self.last_rowid],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        TelemSample {
                            t_wall: row.get(1)?,
                            odom_m: row.get::<_, Option<f64>>(2)?.unwrap_or(std::f64::NAN),
                            speed_kph: row.get::<_, Option<f64>>(3)?.unwrap_or(std::f64::NAN),
                            next_limit_kph: row.get(4)?,
                            dist_next_limit_m: row.get(5)?,
                        },
                    ))
                },
            )
            .optional()
            .map_err(TelemSourceError::StoreError)?;

        match row {
            Some((rowid, sample)) => {
                self.last_rowid = rowid;
                Ok(Some(sample))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::TempDir;

    fn store_with_rows(rows: &[(f64, f64, f64)]) -> (TempDir, StoreTelemSource) {
        let dir = TempDir::new("store_telem");
        let path = dir.file("run.db");

        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "CREATE TABLE telemetry (
                t_wall REAL NOT NULL,
                odom_m REAL,
                speed_kph REAL,
                next_limit_kph REAL,
                dist_next_limit_m REAL
            )",
            [],
        )
        .unwrap();
        for (t, o, s) in rows {
            conn.execute(
                "INSERT INTO telemetry (t_wall, odom_m, speed_kph) VALUES (?1, ?2, ?3)",
                rusqlite::params![t, o, s],
            )
            .unwrap();
        }
        drop(conn);

        let source = StoreTelemSource::open(&path).unwrap();
        (dir, source)
    }

    #[test]
    fn reads_newest_row_once() {
        let (_dir, mut source) = store_with_rows(&[
            (100.0, 0.0, 80.0),
            (100.2, 5.0, 81.0),
            (100.4, 10.0, 82.0),
        ]);

        let sample = source.read_latest().unwrap().unwrap();
        assert_eq!(sample.t_wall, 100.4);
        assert_eq!(sample.odom_m, 10.0);

        // Cursor advanced past everything, nothing new
        assert!(source.read_latest().unwrap().is_none());
    }

    #[test]
    fn sees_rows_inserted_after_open() {
        let (dir, mut source) = store_with_rows(&[(100.0, 0.0, 80.0)]);
        assert!(source.read_latest().unwrap().is_some());

        let conn = Connection::open(dir.file("run.db")).unwrap();
        conn.execute(
            "INSERT INTO telemetry (t_wall, odom_m, speed_kph) VALUES (100.6, 15.0, 83.0)",
            [],
        )
        .unwrap();

        let sample = source.read_latest().unwrap().unwrap();
        assert_eq!(sample.t_wall, 100.6);
    }

    #[test]
    fn null_fields_become_nan_or_none() {
        let (dir, mut source) = store_with_rows(&[]);

        let conn = Connection::open(dir.file("run.db")).unwrap();
        conn.execute("INSERT INTO telemetry (t_wall) VALUES (100.0)", [])
            .unwrap();

        let sample = source.read_latest().unwrap().unwrap();
        assert!(sample.odom_m.is_nan());
        assert!(sample.speed_kph.is_nan());
        assert!(sample.next_limit_kph.is_none());

        // And such a sample fails validation downstream
        assert!(!sample.is_valid());
    }

    #[test]
    fn missing_table_is_an_error() {
        let dir = TempDir::new("store_notable");
        let path = dir.file("empty.db");
        Connection::open(&path).unwrap();

        let mut source = StoreTelemSource::open(&path).unwrap();
        assert!(source.read_latest().is_err());
    }
}
