//! Engine errors.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by the execution engine.
///
/// Most variants describe the failure of a single unit (one stage, one task)
/// and are reported to the user without failing the enclosing call. Only
/// [`EngineError::is_infrastructure`] errors make a pipeline call return `Err`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The program could not be started (not found, not executable).
    #[error("error starting command {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// A stage's stdout could not be handed to the next stage.
    #[error("error getting stdout pipe for command {command}: {source}")]
    Pipe {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Waiting on a started process failed.
    #[error("error waiting for command {command}: {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The process outlived its deadline and was killed.
    #[error("command {command} timed out after {limit:?}")]
    TimedOut { command: String, limit: Duration },

    /// A worker task panicked or was cancelled before reporting.
    #[error("worker for {command} did not finish: {reason}")]
    Worker { command: String, reason: String },

    /// `runparallel` without any command.
    #[error("runparallel: no commands given (usage: runparallel <cmd1>;<cmd2>;...)")]
    EmptyBatch,

    /// `cd` without an argument.
    #[error("cd: path required")]
    NoPath,

    /// `cd` to a directory that cannot be entered.
    #[error("cd: {}: {source}", path.display())]
    ChangeDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl EngineError {
    /// True for failures of the engine's own plumbing rather than of a
    /// user command. These are the only errors a pipeline call returns.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, EngineError::Pipe { .. })
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
