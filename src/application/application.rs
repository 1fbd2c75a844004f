use snafu::Snafu;
use snafu::prelude::*;
use tracing::debug;

use crate::application::{ConfigError, RuntimeConfig};
use crate::audit::{AuditError, AuditLog};
use crate::sync::{CycleDriver, CycleError};

pub struct Application;

impl Application {
    /// Core entry point: validates the configuration, opens the audit log
    /// and hands off to the sync loop. Returns only on a fatal error; the
    /// loop itself runs until the process is terminated.
    pub async fn run(config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let config: RuntimeConfig = config.into();
        config.validate().context(ConfigSnafu)?;
        debug!("Validated runtime config: {config:?}");

        let audit = AuditLog::open(&config.log_file).context(AuditOpenSnafu)?;

        CycleDriver::new(config, audit)
            .run()
            .await
            .context(SyncLoopSnafu)?;

        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered during configuration validation"))]
    ConfigError { source: ConfigError },
    #[snafu(display("Critical failure encountered while opening the audit log"))]
    AuditOpenError { source: AuditError },
    #[snafu(display("Critical failure encountered during the sync loop"))]
    SyncLoopError { source: CycleError },
}
