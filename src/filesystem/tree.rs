use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use snafu::{ResultExt, Snafu, ensure};
use tracing::warn;

use crate::ext::BestEffortPathExt;
use crate::filesystem::FileFingerprint;

/// One node of a captured tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilesystemNode {
    File { fingerprint: FileFingerprint },
    Directory {
        children: HashMap<String, FilesystemNode>,
    },
    /// A subtree the walk could not enter. Kept in the snapshot so the
    /// reconciler can leave the counterpart alone instead of mirroring a
    /// hole.
    Unreadable,
}

/// Immutable snapshot of a directory tree as observed at capture time.
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    root: PathBuf,
    children: HashMap<String, FilesystemNode>,
}

impl DirectorySnapshot {
    /// Walks `root` recursively and records every file and subdirectory
    /// reachable from it. Read-only; the walk never mutates the tree.
    ///
    /// The root itself must exist and be listable. Below the root,
    /// unreadable subdirectories degrade to [`FilesystemNode::Unreadable`]
    /// and entries that fail to stat are skipped, both with a warning.
    pub fn capture(root: &Path) -> Result<Self, SnapshotError> {
        let metadata = fs::metadata(root).context(RootSnafu {
            path: root.to_path_buf(),
        })?;
        ensure!(
            metadata.is_dir(),
            NotADirectorySnafu {
                path: root.to_path_buf(),
            }
        );

        let children = read_children(root).context(RootSnafu {
            path: root.to_path_buf(),
        })?;

        Ok(Self {
            root: root.to_path_buf(),
            children,
        })
    }

    /// Snapshot of a directory known to be empty, e.g. a replica root that
    /// was created a moment ago.
    pub fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            children: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn children(&self) -> &HashMap<String, FilesystemNode> {
        &self.children
    }

    /// Assembles a snapshot from pre-built nodes, for exercising states the
    /// walk only produces under filesystem faults (e.g. [`FilesystemNode::Unreadable`]).
    #[cfg(test)]
    pub(crate) fn from_parts(root: &Path, children: HashMap<String, FilesystemNode>) -> Self {
        Self {
            root: root.to_path_buf(),
            children,
        }
    }
}

fn read_children(dir: &Path) -> std::io::Result<HashMap<String, FilesystemNode>> {
    let mut children = HashMap::new();

    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!(
                    "Skipping unreadable entry in {}: {}",
                    dir.best_effort_path_display(),
                    error
                );
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(error) => {
                warn!(
                    "Skipping {}: failed to stat: {}",
                    path.best_effort_path_display(),
                    error
                );
                continue;
            }
        };

        let node = if metadata.is_dir() {
            match read_children(&path) {
                Ok(children) => FilesystemNode::Directory { children },
                Err(error) => {
                    warn!(
                        "Subtree {} is unreadable: {}",
                        path.best_effort_path_display(),
                        error
                    );
                    FilesystemNode::Unreadable
                }
            }
        } else {
            match FileFingerprint::from_metadata(&path, &metadata) {
                Ok(fingerprint) => FilesystemNode::File { fingerprint },
                Err(error) => {
                    warn!("Skipping {error}");
                    continue;
                }
            }
        };

        children.insert(name, node);
    }

    Ok(children)
}

#[derive(Debug, Snafu)]
pub enum SnapshotError {
    #[snafu(display("Cannot walk {}", path.best_effort_path_display()))]
    RootError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("{} is not a directory", path.best_effort_path_display()))]
    NotADirectory { path: PathBuf },
}
