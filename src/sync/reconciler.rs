use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use compio::fs;
use filetime::FileTime;
use snafu::{ResultExt, Snafu};
use tracing::{debug, error, warn};

use crate::audit::{ActionKind, ActionRecord, AuditError, AuditLog};
use crate::ext::BestEffortPathExt;
use crate::filesystem::{DirectorySnapshot, FileFingerprint, FilesystemNode};

/// Suffix for in-flight copies. The finished file is renamed over the
/// destination, so an interrupted copy never masquerades as a synced file.
const PARTIAL_SUFFIX: &str = ".mirra-partial";

/// Counts of the actions one reconciliation pass performed.
///
/// `deleted` counts audited file deletions only; files removed as part of an
/// orphaned directory are not audited and therefore not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassSummary {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub errors: u64,
}

impl PassSummary {
    pub fn total_actions(&self) -> u64 {
        self.created + self.updated + self.deleted
    }

    fn count(&mut self, kind: ActionKind) {
        match kind {
            ActionKind::Created => self.created += 1,
            ActionKind::Updated => self.updated += 1,
            ActionKind::Deleted => self.deleted += 1,
        }
    }
}

/// One directory pair awaiting comparison, relative to both roots.
struct Frame<'t> {
    rel: PathBuf,
    source: &'t HashMap<String, FilesystemNode>,
    replica: &'t HashMap<String, FilesystemNode>,
}

/// The compare/copy/delete engine.
///
/// Walks a source snapshot against a replica snapshot with an explicit
/// work-list of directory pairs (depth-first, entry names in lexicographic
/// order, so the audit trail is stable across identical runs) and mutates
/// the replica filesystem until it mirrors the source.
///
/// Only file actions are audited. Directory removals are always silent, even
/// when a source file displaces a replica directory: that flip produces a
/// single Created record for the file, with no Deleted records for the tree
/// that made way. The reverse flip deletes a file, so it *is* audited.
pub struct Reconciler<'a> {
    audit: &'a mut AuditLog,
}

impl<'a> Reconciler<'a> {
    pub fn new(audit: &'a mut AuditLog) -> Self {
        Self { audit }
    }

    /// Runs one full pass. Per-entry copy and delete failures are logged,
    /// counted and skipped so one bad file never blocks the rest of the
    /// mirror; only an audit sink failure aborts the pass.
    pub async fn reconcile(
        &mut self,
        source: &DirectorySnapshot,
        replica: &DirectorySnapshot,
    ) -> Result<PassSummary, ReconcileError> {
        let empty = HashMap::new();
        let mut summary = PassSummary::default();
        let mut frames = vec![Frame {
            rel: PathBuf::new(),
            source: source.children(),
            replica: replica.children(),
        }];

        while let Some(frame) = frames.pop() {
            self.reconcile_directory(
                source.root(),
                replica.root(),
                frame,
                &empty,
                &mut frames,
                &mut summary,
            )
            .await?;
        }

        Ok(summary)
    }

    /// Compares one directory pair: the source-driven pass first (copies and
    /// updates, direct file entries before any descent), then the
    /// replica-driven pass (orphan deletions), then the subdirectory frames
    /// are queued in lexicographic order.
    async fn reconcile_directory<'t>(
        &mut self,
        source_root: &Path,
        replica_root: &Path,
        frame: Frame<'t>,
        empty: &'t HashMap<String, FilesystemNode>,
        frames: &mut Vec<Frame<'t>>,
        summary: &mut PassSummary,
    ) -> Result<(), ReconcileError> {
        let mut descents: Vec<Frame<'t>> = Vec::new();

        let mut source_names: Vec<&String> = frame.source.keys().collect();
        source_names.sort();

        for name in source_names {
            let rel = frame.rel.join(name);
            let source_path = source_root.join(&rel);
            let replica_path = replica_root.join(&rel);
            let replica_node = frame.replica.get(name);

            match &frame.source[name] {
                FilesystemNode::File { fingerprint } => {
                    self.reconcile_file(
                        fingerprint,
                        replica_node,
                        &rel,
                        &source_path,
                        &replica_path,
                        summary,
                    )
                    .await?;
                }
                FilesystemNode::Directory { children } => {
                    self.reconcile_subdirectory(
                        children,
                        replica_node,
                        rel,
                        &replica_path,
                        empty,
                        &mut descents,
                        summary,
                    )
                    .await?;
                }
                FilesystemNode::Unreadable => {
                    error!(
                        "Source subtree {} is unreadable, leaving its replica counterpart untouched",
                        source_path.best_effort_path_display()
                    );
                    summary.errors += 1;
                }
            }
        }

        let mut orphan_names: Vec<&String> = frame
            .replica
            .keys()
            .filter(|name| !frame.source.contains_key(*name))
            .collect();
        orphan_names.sort();

        for name in orphan_names {
            let rel = frame.rel.join(name);
            let replica_path = replica_root.join(&rel);

            match &frame.replica[name] {
                FilesystemNode::File { .. } => {
                    self.delete_file(&rel, &replica_path, summary).await?;
                }
                FilesystemNode::Directory { .. } | FilesystemNode::Unreadable => {
                    // Orphaned directories go down whole; the files below
                    // them are not individually audited.
                    Self::remove_directory(&replica_path, summary);
                }
            }
        }

        // The stack pops last-in first, so queue lexicographically last
        // first to descend in lexicographic order.
        descents.reverse();
        frames.append(&mut descents);

        Ok(())
    }

    /// Source has a file named `rel`; bring the replica in line.
    async fn reconcile_file(
        &mut self,
        source_fingerprint: &FileFingerprint,
        replica_node: Option<&FilesystemNode>,
        rel: &Path,
        source_path: &Path,
        replica_path: &Path,
        summary: &mut PassSummary,
    ) -> Result<(), ReconcileError> {
        match replica_node {
            None => {
                self.copy_file(
                    ActionKind::Created,
                    source_fingerprint,
                    rel,
                    source_path,
                    replica_path,
                    summary,
                )
                .await
            }
            Some(FilesystemNode::File { fingerprint }) if fingerprint == source_fingerprint => {
                debug!("{} is up to date", rel.display());
                Ok(())
            }
            Some(FilesystemNode::File { .. }) => {
                self.copy_file(
                    ActionKind::Updated,
                    source_fingerprint,
                    rel,
                    source_path,
                    replica_path,
                    summary,
                )
                .await
            }
            Some(FilesystemNode::Directory { .. }) | Some(FilesystemNode::Unreadable) => {
                // Type flip: the replica directory tree goes (folders are
                // not audited) and the file arrives as a creation.
                if Self::remove_directory(replica_path, summary) {
                    self.copy_file(
                        ActionKind::Created,
                        source_fingerprint,
                        rel,
                        source_path,
                        replica_path,
                        summary,
                    )
                    .await
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Source has a directory named `rel`; make sure the replica has one too
    /// and queue the pair for descent.
    #[allow(clippy::too_many_arguments)]
    async fn reconcile_subdirectory<'t>(
        &mut self,
        source_children: &'t HashMap<String, FilesystemNode>,
        replica_node: Option<&'t FilesystemNode>,
        rel: PathBuf,
        replica_path: &Path,
        empty: &'t HashMap<String, FilesystemNode>,
        descents: &mut Vec<Frame<'t>>,
        summary: &mut PassSummary,
    ) -> Result<(), ReconcileError> {
        match replica_node {
            Some(FilesystemNode::Directory { children }) => {
                descents.push(Frame {
                    rel,
                    source: source_children,
                    replica: children,
                });
            }
            Some(FilesystemNode::File { .. }) => {
                // Type flip: the stale replica file is audited as a
                // deletion, then the tree below syncs against nothing so
                // every file under it is audited as a creation.
                if self.delete_file(&rel, replica_path, summary).await?
                    && Self::create_directory(replica_path, summary).await
                {
                    descents.push(Frame {
                        rel,
                        source: source_children,
                        replica: empty,
                    });
                }
            }
            Some(FilesystemNode::Unreadable) => {
                warn!(
                    "Replica subtree {} was unreadable at snapshot time, syncing over it without orphan cleanup",
                    replica_path.best_effort_path_display()
                );
                descents.push(Frame {
                    rel,
                    source: source_children,
                    replica: empty,
                });
            }
            None => {
                if Self::create_directory(replica_path, summary).await {
                    descents.push(Frame {
                        rel,
                        source: source_children,
                        replica: empty,
                    });
                }
            }
        }

        Ok(())
    }

    /// Copies source to replica and audits the action. The copy failing is a
    /// per-entry error (logged, counted, skipped); the audit sink failing
    /// aborts the pass.
    async fn copy_file(
        &mut self,
        kind: ActionKind,
        fingerprint: &FileFingerprint,
        rel: &Path,
        source_path: &Path,
        replica_path: &Path,
        summary: &mut PassSummary,
    ) -> Result<(), ReconcileError> {
        match Self::transfer(fingerprint, source_path, replica_path).await {
            Ok(()) => {
                summary.count(kind);
                self.audit
                    .record(&ActionRecord::new(kind, rel.to_path_buf()))
                    .context(AuditFailureSnafu)?;
                Ok(())
            }
            Err(error) => {
                error!(
                    "Failed to copy {} -> {}: {}",
                    source_path.best_effort_path_display(),
                    replica_path.best_effort_path_display(),
                    error
                );
                summary.errors += 1;
                Ok(())
            }
        }
    }

    /// Writes the source bytes to a temporary sibling, carries the source
    /// modification time over so the next pass sees matching fingerprints,
    /// and renames the result into place.
    async fn transfer(
        fingerprint: &FileFingerprint,
        source_path: &Path,
        replica_path: &Path,
    ) -> std::io::Result<()> {
        let bytes = fs::read(source_path).await?;
        let partial_path = Self::partial_path(replica_path);

        let result = Self::write_into_place(fingerprint, &partial_path, replica_path, bytes).await;
        if result.is_err() {
            let _ = std::fs::remove_file(&partial_path);
        }
        result
    }

    async fn write_into_place(
        fingerprint: &FileFingerprint,
        partial_path: &Path,
        replica_path: &Path,
        bytes: Vec<u8>,
    ) -> std::io::Result<()> {
        let written = fs::write(partial_path, bytes).await;
        written.0?;

        if let Some(modified_time) = fingerprint.modified_time() {
            filetime::set_file_mtime(partial_path, FileTime::from_system_time(modified_time))?;
        }

        fs::rename(partial_path, replica_path).await?;
        Ok(())
    }

    fn partial_path(replica_path: &Path) -> PathBuf {
        let mut name = replica_path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(PARTIAL_SUFFIX);
        replica_path.with_file_name(name)
    }

    /// Deletes one replica file and audits the deletion. Returns whether the
    /// file is actually gone.
    async fn delete_file(
        &mut self,
        rel: &Path,
        replica_path: &Path,
        summary: &mut PassSummary,
    ) -> Result<bool, ReconcileError> {
        match fs::remove_file(replica_path).await {
            Ok(()) => {
                summary.count(ActionKind::Deleted);
                self.audit
                    .record(&ActionRecord::new(ActionKind::Deleted, rel.to_path_buf()))
                    .context(AuditFailureSnafu)?;
                Ok(true)
            }
            Err(error) => {
                error!(
                    "Failed to delete {}: {}",
                    replica_path.best_effort_path_display(),
                    error
                );
                summary.errors += 1;
                Ok(false)
            }
        }
    }

    /// Removes a replica directory tree without auditing, per the files-only
    /// audit scope. Returns whether the tree is actually gone.
    fn remove_directory(replica_path: &Path, summary: &mut PassSummary) -> bool {
        match std::fs::remove_dir_all(replica_path) {
            Ok(()) => true,
            Err(error) => {
                error!(
                    "Failed to remove directory {}: {}",
                    replica_path.best_effort_path_display(),
                    error
                );
                summary.errors += 1;
                false
            }
        }
    }

    /// Creates a replica directory without auditing. Returns whether it
    /// exists afterwards.
    async fn create_directory(replica_path: &Path, summary: &mut PassSummary) -> bool {
        match fs::create_dir_all(replica_path).await {
            Ok(()) => true,
            Err(error) => {
                error!(
                    "Failed to create directory {}: {}",
                    replica_path.best_effort_path_display(),
                    error
                );
                summary.errors += 1;
                false
            }
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ReconcileError {
    #[snafu(display("Audit log write failed, aborting the pass"))]
    AuditFailure { source: AuditError },
}
