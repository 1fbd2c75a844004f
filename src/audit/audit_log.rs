use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use colored::{ColoredString, Colorize};
use snafu::{ResultExt, Snafu};

use crate::audit::{ActionKind, ActionRecord};
use crate::ext::BestEffortPathExt;

/// Dual-sink audit logger: one persistent append-only file, one live console
/// stream, fed from a single formatted line per record.
#[derive(Debug)]
pub struct AuditLog {
    file: File,
    color: bool,
}

impl AuditLog {
    /// Opens the audit file in append mode, creating it if needed. Failure
    /// here is a startup error; the mirror must not run without its trail.
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context(OpenSnafu {
                path: path.to_path_buf(),
            })?;

        let color = supports_color::on(supports_color::Stream::Stdout).is_some();

        Ok(Self { file, color })
    }

    /// Appends the record to the file, flushes it, then mirrors the same
    /// line to stdout. The file write comes first so a crash can only lose
    /// console output, never the durable trail.
    pub fn record(&mut self, record: &ActionRecord) -> Result<(), AuditError> {
        let line = record.format_line();

        self.file
            .write_all(format!("{line}\n").as_bytes())
            .context(WriteSnafu)?;
        self.file.flush().context(WriteSnafu)?;

        println!("{}", self.colorize(record.kind(), &line));
        Ok(())
    }

    fn colorize(&self, kind: ActionKind, line: &str) -> ColoredString {
        if !self.color {
            return line.normal();
        }

        match kind {
            ActionKind::Created => line.green(),
            ActionKind::Updated => line.yellow(),
            ActionKind::Deleted => line.red(),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum AuditError {
    #[snafu(display("Failed to open audit log {}", path.best_effort_path_display()))]
    OpenError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to append to audit log"))]
    WriteError { source: std::io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .expect("Failed to read audit log")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_records_are_appended_in_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_path = temp_dir.path().join("sync.log");
        let mut audit = AuditLog::open(&log_path).expect("Failed to open audit log");

        audit
            .record(&ActionRecord::new(ActionKind::Created, PathBuf::from("a")))
            .expect("Failed to record");
        audit
            .record(&ActionRecord::new(ActionKind::Deleted, PathBuf::from("b")))
            .expect("Failed to record");

        let lines = read_lines(&log_path);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("CREATED file a"));
        assert!(lines[1].contains("DELETED file b"));
    }

    #[test]
    fn test_reopening_appends_instead_of_truncating() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_path = temp_dir.path().join("sync.log");

        {
            let mut audit = AuditLog::open(&log_path).expect("Failed to open audit log");
            audit
                .record(&ActionRecord::new(ActionKind::Created, PathBuf::from("a")))
                .expect("Failed to record");
        }
        {
            let mut audit = AuditLog::open(&log_path).expect("Failed to open audit log");
            audit
                .record(&ActionRecord::new(ActionKind::Updated, PathBuf::from("a")))
                .expect("Failed to record");
        }

        assert_eq!(read_lines(&log_path).len(), 2);
    }

    #[test]
    fn test_open_fails_for_unwritable_destination() {
        let result = AuditLog::open(Path::new("/no/such/directory/sync.log"));

        assert!(matches!(result.unwrap_err(), AuditError::OpenError { .. }));
    }
}
