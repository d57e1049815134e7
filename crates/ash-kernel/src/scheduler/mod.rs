//! Scheduler module for ash: pipelines and parallel batches.
//!
//! This module provides:
//! - **Pipeline execution**: Run commands connected by OS pipes, where stdout
//!   of one process is the stdin of the next.
//! - **Parallel batches**: Run independent commands at once, each with its own
//!   timeout, with live status snapshots and a final report.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PipelineRunner                          │
//! │  ┌─────────┐  OS pipe   ┌─────────┐  OS pipe   ┌─────────┐ │
//! │  │ stage 0 │───────────▶│ stage 1 │───────────▶│ stage 2 │ │
//! │  │ (task)  │   stdout   │ (task)  │   stdout   │ (task)  │ │
//! │  └─────────┘            └─────────┘            └─────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Supervisor                            │
//! │  table: TaskTable (BTreeMap<TaskId, TaskRecord> + mutex)    │
//! │  - one worker per command, each with a deadline             │
//! │  - reporter: snapshot every interval until all terminal     │
//! │  - completion channel → BatchReport in completion order     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod pipeline;
mod supervisor;
mod table;

pub use pipeline::{PipelineReport, PipelineRunner, StageReport};
pub use supervisor::{BatchReport, Supervisor, render_status};
pub use table::TaskTable;
