use std::{
    fs::Metadata,
    hash::Hasher,
    path::{Path, PathBuf},
    time::SystemTime,
};

use metrohash::MetroHash64;
use snafu::{ResultExt, Snafu};

use crate::ext::BestEffortPathExt;

/// Cheap staleness proxy for one file.
///
/// Size plus modification time where the platform reports one, a content
/// hash otherwise. Two files are treated as identical when their
/// fingerprints compare equal; file bytes are never compared directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFingerprint {
    Stat {
        size: u64,
        modified_time: SystemTime,
    },
    Hash(u64),
}

impl FileFingerprint {
    /// Builds a fingerprint from metadata already obtained while walking a
    /// directory, so the walk does not stat each file twice.
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Result<Self, FingerprintError> {
        // Prefer the modified time; hashing is the fallback for platforms
        // that do not report one.
        if let Ok(modified_time) = metadata.modified() {
            return Ok(FileFingerprint::Stat {
                size: metadata.len(),
                modified_time,
            });
        }

        let bytes = std::fs::read(path).context(HashReadSnafu {
            path: path.to_path_buf(),
        })?;

        let mut hasher = MetroHash64::default();
        hasher.write(&bytes);

        Ok(FileFingerprint::Hash(hasher.finish()))
    }

    /// The modification time to carry over when this file is copied, if the
    /// fingerprint is time-based.
    pub fn modified_time(&self) -> Option<SystemTime> {
        match self {
            FileFingerprint::Stat { modified_time, .. } => Some(*modified_time),
            FileFingerprint::Hash(_) => None,
        }
    }
}

#[derive(Debug, Snafu)]
pub enum FingerprintError {
    #[snafu(display("Failed to read {} for hashing", path.best_effort_path_display()))]
    HashReadError {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fingerprint(path: &Path) -> FileFingerprint {
        let metadata = path.metadata().expect("Failed to stat");
        FileFingerprint::from_metadata(path, &metadata).expect("Failed to fingerprint")
    }

    #[test]
    fn test_fingerprint_of_regular_file_records_size() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        write!(temp_file, "some content").expect("Failed to write to temp file");

        match fingerprint(temp_file.path()) {
            FileFingerprint::Stat { size, .. } => assert_eq!(size, "some content".len() as u64),
            FileFingerprint::Hash(_) => {
                // Acceptable on platforms without modification times
            }
        }
    }

    #[test]
    fn test_unchanged_file_keeps_its_fingerprint() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "stable content").expect("Failed to write to temp file");
        temp_file.flush().expect("Failed to flush temp file");

        assert_eq!(fingerprint(temp_file.path()), fingerprint(temp_file.path()));
    }

    #[test]
    fn test_touched_file_changes_its_fingerprint() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "initial").expect("Failed to write to temp file");
        temp_file.flush().expect("Failed to flush temp file");

        let before = fingerprint(temp_file.path());

        // Pin a modification time well away from "now" instead of sleeping.
        filetime::set_file_mtime(temp_file.path(), filetime::FileTime::from_unix_time(1_000, 0))
            .expect("Failed to set mtime");

        assert_ne!(before, fingerprint(temp_file.path()));
    }
}
