//! Safety status record writer
//!
//! The status record is the one artefact external operators watch, so it is
//! always rewritten atomically: the new record is written to a temporary
//! file which is then renamed over the old one.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::path::{Path, PathBuf};
use veh_if::ctrl::StatusRecord;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Writer for the persisted safety status record.
pub struct StatusWriter {
    path: PathBuf,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StatusWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The path the record is written to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically rewrite the status record.
    pub fn write(&self, record: &StatusRecord) -> Result<(), std::io::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::TempDir;

    fn record(reason: &str) -> StatusRecord {
        StatusRecord {
            mode: String::from("full"),
            takeover: false,
            reason: String::from(reason),
            t_wall: 100.0,
            last_command_time: Some(99.5),
            last_command_value: Some(0.3),
            last_ack_time: Some(99.6),
        }
    }

    #[test]
    fn writes_and_overwrites_record() {
        let dir = TempDir::new("status");
        let writer = StatusWriter::new(dir.file("control_status.json"));

        writer.write(&record("first")).unwrap();
        let text = std::fs::read_to_string(writer.path()).unwrap();
        let read: StatusRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(read, record("first"));

        writer.write(&record("second")).unwrap();
        let text = std::fs::read_to_string(writer.path()).unwrap();
        let read: StatusRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(read.reason, "second");

        // No temporary file is left behind
        assert!(!dir.file("control_status.json.tmp").exists());
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = TempDir::new("status_nested");
        let writer = StatusWriter::new(dir.file("a/b/control_status.json"));
        writer.write(&record("nested")).unwrap();
        assert!(writer.path().exists());
    }
}
