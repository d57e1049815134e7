//! Engine configuration.
//!
//! Ambient values the engine would otherwise read from the environment (the
//! home directory in particular) are resolved once by the front end and
//! injected here, so the engine can be driven in isolation by tests.

use std::path::PathBuf;
use std::time::Duration;

use crate::paths::home_dir;

/// Per-task timeout for parallel batches.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the batch status reporter prints a snapshot.
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline applied to each task of a `runparallel` batch.
    pub task_timeout: Duration,

    /// Interval between status snapshots while a batch runs.
    pub status_interval: Duration,

    /// Directory `cd ~` resolves to.
    pub home: PathBuf,

    /// When true, a single-stage pipeline shares the terminal's streams
    /// instead of capturing them, so full-screen and streaming programs work.
    ///
    /// Set by the REPL. Left off for embedders that need the output captured.
    pub interactive: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            task_timeout: DEFAULT_TASK_TIMEOUT,
            status_interval: DEFAULT_STATUS_INTERVAL,
            home: home_dir(),
            interactive: false,
        }
    }
}

impl EngineConfig {
    /// Config for a human-operated REPL: standalone commands use the terminal.
    pub fn repl() -> Self {
        Self::default().with_interactive(true)
    }

    /// Set the per-task timeout.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Set the status reporter interval.
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    /// Set the home directory used by `cd ~`.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    /// Toggle terminal passthrough for single-stage commands.
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_batch_contract() {
        let config = EngineConfig::default();
        assert_eq!(config.task_timeout, Duration::from_secs(10));
        assert_eq!(config.status_interval, Duration::from_secs(1));
        assert!(!config.interactive);
    }

    #[test]
    fn repl_is_interactive() {
        assert!(EngineConfig::repl().interactive);
    }

    #[test]
    fn builders_override_fields() {
        let config = EngineConfig::default()
            .with_task_timeout(Duration::from_millis(250))
            .with_status_interval(Duration::from_millis(50))
            .with_home("/home/test");
        assert_eq!(config.task_timeout, Duration::from_millis(250));
        assert_eq!(config.status_interval, Duration::from_millis(50));
        assert_eq!(config.home, PathBuf::from("/home/test"));
    }
}
