use compio::fs;
use snafu::{ResultExt, Snafu};
use tracing::{error, info};

use crate::application::RuntimeConfig;
use crate::audit::AuditLog;
use crate::ext::BestEffortPathExt;
use crate::filesystem::DirectorySnapshot;
use crate::sync::{ReconcileError, Reconciler};

/// Drives reconciliation passes forever, strictly one at a time: snapshot
/// both roots, reconcile, sleep, repeat. The interval is measured from the
/// end of one pass to the start of the next.
pub struct CycleDriver {
    config: RuntimeConfig,
    audit: AuditLog,
}

impl CycleDriver {
    pub fn new(config: RuntimeConfig, audit: AuditLog) -> Self {
        Self { config, audit }
    }

    /// Loops until the process is terminated externally. The first cycle
    /// doubles as the initial full sync.
    pub async fn run(mut self) -> Result<(), CycleError> {
        loop {
            self.run_cycle().await?;
            compio::time::sleep(self.config.interval).await;
        }
    }

    /// One snapshot-and-reconcile pass. A root that fails to snapshot skips
    /// the cycle instead of killing the daemon; only an audit sink failure
    /// is fatal.
    pub async fn run_cycle(&mut self) -> Result<(), CycleError> {
        info!(
            "Syncing {} -> {}",
            self.config.source_root.best_effort_path_display(),
            self.config.replica_root.best_effort_path_display()
        );

        let source = match DirectorySnapshot::capture(&self.config.source_root) {
            Ok(snapshot) => snapshot,
            Err(snapshot_error) => {
                error!("Skipping cycle, source snapshot failed: {snapshot_error}");
                return Ok(());
            }
        };

        let Some(replica) = self.replica_snapshot().await else {
            return Ok(());
        };

        let summary = Reconciler::new(&mut self.audit)
            .reconcile(&source, &replica)
            .await
            .context(ReconcileSnafu)?;

        info!(
            "Files created: {}, updated: {}, deleted: {} ({} errors)",
            summary.created, summary.updated, summary.deleted, summary.errors
        );
        Ok(())
    }

    /// Snapshots the replica root, creating it on the first run. `None`
    /// means the cycle should be skipped; the cause is already logged.
    async fn replica_snapshot(&self) -> Option<DirectorySnapshot> {
        if self.config.replica_root.exists() {
            return match DirectorySnapshot::capture(&self.config.replica_root) {
                Ok(snapshot) => Some(snapshot),
                Err(snapshot_error) => {
                    error!("Skipping cycle, replica snapshot failed: {snapshot_error}");
                    None
                }
            };
        }

        match fs::create_dir_all(&self.config.replica_root).await {
            Ok(()) => Some(DirectorySnapshot::empty(&self.config.replica_root)),
            Err(io_error) => {
                error!(
                    "Skipping cycle, cannot create replica root {}: {io_error}",
                    self.config.replica_root.best_effort_path_display()
                );
                None
            }
        }
    }
}

#[derive(Debug, Snafu)]
pub enum CycleError {
    #[snafu(display("Reconciliation pass aborted"))]
    ReconcileError { source: ReconcileError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn driver(source: &TempDir, replica_root: std::path::PathBuf, log: std::path::PathBuf) -> CycleDriver {
        let config = RuntimeConfig {
            source_root: source.path().to_path_buf(),
            replica_root,
            log_file: log.clone(),
            interval: Duration::from_secs(1),
        };
        let audit = AuditLog::open(&log).expect("Failed to open audit log");
        CycleDriver::new(config, audit)
    }

    #[compio::test]
    async fn test_first_cycle_creates_replica_root_and_mirrors() {
        let source = TempDir::new().expect("Failed to create source");
        let scratch = TempDir::new().expect("Failed to create scratch");
        let replica_root = scratch.path().join("replica");
        let log = scratch.path().join("sync.log");
        stdfs::write(source.path().join("a.txt"), "alpha").expect("Failed to write source file");

        let mut driver = driver(&source, replica_root.clone(), log.clone());
        driver.run_cycle().await.expect("Cycle failed");

        assert_eq!(
            stdfs::read_to_string(replica_root.join("a.txt")).expect("Missing replica file"),
            "alpha"
        );
        assert!(
            stdfs::read_to_string(&log)
                .expect("Missing audit log")
                .contains("CREATED file a.txt")
        );
    }

    #[compio::test]
    async fn test_vanished_source_skips_the_cycle() {
        let source = TempDir::new().expect("Failed to create source");
        let scratch = TempDir::new().expect("Failed to create scratch");
        let replica_root = scratch.path().join("replica");
        let log = scratch.path().join("sync.log");

        let mut driver = driver(&source, replica_root.clone(), log.clone());
        let source_path = source.path().to_path_buf();
        drop(source);
        assert!(!source_path.exists());

        // No panic, no replica mutation, no audit lines.
        driver.run_cycle().await.expect("Cycle should be skipped, not fail");
        assert!(!replica_root.exists());
        assert!(stdfs::read_to_string(&log).expect("Missing audit log").is_empty());
    }
}
