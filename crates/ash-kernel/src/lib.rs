//! ash-kernel: the process-execution engine of the ash shell.
//!
//! This crate provides:
//!
//! - **Process**: the spawner every unit of work goes through, with terminal,
//!   pipeline-stage and combined-capture stream wirings
//! - **Scheduler**: OS-pipe pipelines and supervised parallel batches
//! - **Dispatch**: line classification, `cd`/`exit`, and the [`Engine`] entry point
//! - **Sink**: where user-visible output goes
//! - **Paths**: home-directory helpers

pub mod config;
pub mod dispatch;
pub mod error;
pub mod paths;
pub mod process;
pub mod scheduler;
pub mod sink;

pub use config::{DEFAULT_STATUS_INTERVAL, DEFAULT_TASK_TIMEOUT, EngineConfig};
pub use dispatch::{Dispatch, Engine, Flow};
pub use error::{EngineError, EngineResult};
pub use scheduler::{
    BatchReport, PipelineReport, PipelineRunner, StageReport, Supervisor, TaskTable,
};
pub use sink::{MemorySink, OutputSink, Terminal};

// Data types, re-exported so embedders need only this crate.
pub use ash_types::{ExitOutcome, Stage, TaskId, TaskRecord, TaskStatus};
