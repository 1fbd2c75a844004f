use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use snafu::{Snafu, ensure};

use crate::cli::Cli;
use crate::ext::BestEffortPathExt;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub source_root: PathBuf,
    pub replica_root: PathBuf,
    pub log_file: PathBuf,
    pub interval: Duration,
}

impl RuntimeConfig {
    /// Startup precondition checks. Violations are fatal before the first
    /// cycle; nothing here is re-checked while the loop runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.interval.is_zero(), NonPositiveIntervalSnafu);
        ensure!(
            self.source_root.is_dir(),
            MissingSourceSnafu {
                path: self.source_root.clone(),
            }
        );

        // Compare normalized forms; the replica may not exist yet.
        let source = self.source_root.best_effort_path_display();
        let replica = self.replica_root.best_effort_path_display();
        ensure!(source != replica, SamePathSnafu { path: source });
        ensure!(
            !Path::new(&replica).starts_with(&source) && !Path::new(&source).starts_with(&replica),
            NestedRootsSnafu { source, replica }
        );

        Ok(())
    }
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            source_root: cli.source,
            replica_root: cli.replica,
            log_file: cli.log_file,
            interval: Duration::from_secs(cli.interval),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("Sync interval must be a positive number of seconds"))]
    NonPositiveInterval,
    #[snafu(display("Source root {} does not exist or is not a directory", path.best_effort_path_display()))]
    MissingSource { path: PathBuf },
    #[snafu(display("Source and replica are the same directory: {path}"))]
    SamePath { path: String },
    #[snafu(display("Source and replica roots overlap: {source} vs {replica}"))]
    NestedRoots {
        #[snafu(source(false))]
        source: String,
        replica: String,
    },
}
