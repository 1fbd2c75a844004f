use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;

/// One-way folder mirroring: makes `replica` an exact copy of `source` on a
/// fixed interval, recording every file action in an audit log.
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// Directory to mirror from
    pub source: PathBuf,
    /// Directory to mirror into (mutated in place)
    pub replica: PathBuf,
    /// Seconds to wait between reconciliation passes
    #[clap(long, short, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,
    /// Audit log file, appended to across runs
    #[clap(long, default_value = "sync.log")]
    pub log_file: PathBuf,
    #[clap(long, short, default_value = "info", value_enum)]
    pub log_level: LogLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["mirra", "/src", "/dst"]);

        assert_eq!(cli.source, PathBuf::from("/src"));
        assert_eq!(cli.replica, PathBuf::from("/dst"));
        assert_eq!(cli.interval, 10);
        assert_eq!(cli.log_file, PathBuf::from("sync.log"));
    }

    #[test]
    fn test_zero_interval_is_rejected_at_parse_time() {
        let result = Cli::try_parse_from(["mirra", "/src", "/dst", "--interval", "0"]);

        assert!(result.is_err());
    }
}
