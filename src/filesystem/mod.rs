//! Point-in-time filesystem tree snapshots.
//!
//! A snapshot is captured fresh at the start of every sync cycle and thrown
//! away at the end of it. Nothing is cached across cycles, so mutations made
//! to either tree between cycles are always observed.

mod fingerprint;
mod tree;

pub use fingerprint::{FileFingerprint, FingerprintError};
pub use tree::{DirectorySnapshot, FilesystemNode, SnapshotError};
